//! One tunnel session: parse → authenticate → resolve → connect → relay.
//!
//! A session starts once the WebSocket is open and the first data frame has
//! arrived. It owns the client leg for its whole life and takes exclusive
//! ownership of the upstream socket once connected; both are closed through
//! [`Teardown`] whatever the outcome. Failures never send anything back to
//! the client.
//!
//! While the target is being resolved and dialed the client leg is still
//! watched: if it closes or errors, the pending lookup or connect is dropped
//! and no upstream is opened. Bytes the client sends meanwhile are held and
//! written upstream right after the header payload.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};
use veil_auth::AuthBackend;
use veil_core::io::{RelayEnd, Teardown, relay_bidirectional};
use veil_dns::Resolver;
use veil_metrics::{record_auth_failure, record_auth_success, record_session};
use veil_proto::{Header, ProtocolVariant, parse_header};

use crate::connector::Connect;
use crate::error::SessionError;
use crate::resolve::{resolve_address, resolve_target};

/// Sent to Vless clients once the upstream is connected.
pub const VLESS_ACK: [u8; 2] = [0x00, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    ParsingHeader,
    HeaderInvalid,
    AuthFailed,
    Authenticated,
    Resolving,
    ResolveFailed,
    Connecting,
    ConnectFailed,
    Relaying,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::ParsingHeader => "parsing_header",
            SessionState::HeaderInvalid => "header_invalid",
            SessionState::AuthFailed => "auth_failed",
            SessionState::Authenticated => "authenticated",
            SessionState::Resolving => "resolving",
            SessionState::ResolveFailed => "resolve_failed",
            SessionState::Connecting => "connecting",
            SessionState::ConnectFailed => "connect_failed",
            SessionState::Relaying => "relaying",
            SessionState::Closed => "closed",
        }
    }

    /// Whether `next` may follow `self`.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Init, ParsingHeader)
                | (ParsingHeader, HeaderInvalid | AuthFailed | Authenticated)
                | (Authenticated, Resolving)
                | (Resolving, ResolveFailed | Connecting)
                | (Connecting, ConnectFailed | Relaying)
                | (_, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared collaborators a session borrows for its lifetime.
pub struct SessionEnv<'a, C> {
    pub auth: &'a dyn AuthBackend,
    pub resolver: &'a dyn Resolver,
    pub connector: &'a C,
    /// `host:port` every Trojan session is relayed to.
    pub trojan_target: &'a str,
    pub idle_timeout: Duration,
    pub relay_buffer_size: usize,
}

pub struct Session {
    id: u64,
    peer: SocketAddr,
    state: SessionState,
    protocol: Option<ProtocolVariant>,
}

impl Session {
    pub fn new(id: u64, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            state: SessionState::Init,
            protocol: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Known once the first frame has been classified.
    pub fn protocol(&self) -> Option<ProtocolVariant> {
        self.protocol
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid session transition {} -> {}",
            self.state,
            next
        );
        trace!(session = self.id, from = %self.state, to = %next, "session state");
        self.state = next;
    }

    /// Drive the session to completion over `client`, starting from the
    /// already received `first_frame`. Both legs are closed before this
    /// returns.
    pub async fn run<S, C>(
        &mut self,
        env: &SessionEnv<'_, C>,
        client: S,
        first_frame: &[u8],
    ) -> Result<RelayEnd, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        C: Connect,
    {
        let mut legs: Teardown<S, C::Stream> = Teardown::new(client);
        let result = self.drive(env, &mut legs, first_frame).await;
        let report = legs.close_all().await;
        trace!(
            session = self.id,
            client_closed = report.client_closed,
            upstream_closed = report.upstream_closed,
            "session torn down"
        );
        self.advance(SessionState::Closed);
        result
    }

    async fn drive<S, C>(
        &mut self,
        env: &SessionEnv<'_, C>,
        legs: &mut Teardown<S, C::Stream>,
        frame: &[u8],
    ) -> Result<RelayEnd, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        C: Connect,
    {
        self.advance(SessionState::ParsingHeader);
        let header = match parse_header(frame) {
            Ok(header) => header,
            Err(err) => {
                self.advance(SessionState::HeaderInvalid);
                debug!(session = self.id, peer = %self.peer, error = %err, "malformed header");
                return Err(err.into());
            }
        };
        let protocol = header.protocol();
        self.protocol = Some(protocol);

        let verified = match &header {
            Header::Vless(h) => env.auth.verify_vless(h.uuid).await,
            Header::Trojan(h) => env.auth.verify_trojan(h.hash).await,
        };
        if verified.is_err() {
            record_auth_failure();
            self.advance(SessionState::AuthFailed);
            debug!(session = self.id, peer = %self.peer, protocol = %protocol, "authentication failed");
            return Err(SessionError::AuthMismatch);
        }
        record_auth_success();
        record_session(protocol.as_str());
        self.advance(SessionState::Authenticated);

        self.advance(SessionState::Resolving);
        let mut early = BytesMut::new();
        let early_limit = env.relay_buffer_size.max(1);
        let id = self.id;
        let lookup = async {
            match &header {
                Header::Vless(h) => {
                    trace!(session = id, version = h.version, command = h.command, "vless header");
                    resolve_address(&h.address, env.resolver).await
                }
                Header::Trojan(_) => resolve_target(env.trojan_target, env.resolver).await,
            }
        };
        let resolved = watch_client(legs.client_mut(), &mut early, early_limit, lookup)
            .await
            .inspect_err(|err| {
                debug!(session = self.id, peer = %self.peer, error = %err, "client gone while resolving");
            })?;
        let target = match resolved {
            Ok(target) => target,
            Err(err) => {
                self.advance(SessionState::ResolveFailed);
                debug!(session = self.id, peer = %self.peer, error = %err, "resolve failed");
                return Err(err.into());
            }
        };

        self.advance(SessionState::Connecting);
        let dialed = watch_client(
            legs.client_mut(),
            &mut early,
            early_limit,
            env.connector.connect(target),
        )
        .await
        .inspect_err(|err| {
            debug!(session = self.id, peer = %self.peer, target = %target, error = %err, "client gone while connecting");
        })?;
        let upstream = match dialed {
            Ok(upstream) => upstream,
            Err(err) => {
                self.advance(SessionState::ConnectFailed);
                debug!(session = self.id, peer = %self.peer, target = %target, error = %err, "connect failed");
                return Err(SessionError::ConnectFailure(err));
            }
        };
        legs.attach_upstream(upstream);
        let (client, upstream) = legs
            .legs_mut()
            .ok_or_else(|| SessionError::Relay(std::io::Error::other("upstream leg missing")))?;

        if let Header::Vless(h) = &header {
            client.write_all(&VLESS_ACK).await.map_err(SessionError::Relay)?;
            client.flush().await.map_err(SessionError::Relay)?;
            if !h.payload.is_empty() {
                upstream.write_all(h.payload).await.map_err(SessionError::Relay)?;
            }
        }
        if !early.is_empty() {
            upstream.write_all(&early).await.map_err(SessionError::Relay)?;
        }

        self.advance(SessionState::Relaying);
        info!(session = self.id, peer = %self.peer, protocol = %protocol, target = %target, "session established");
        let end = relay_bidirectional(client, upstream, env.idle_timeout, env.relay_buffer_size)
            .await
            .map_err(SessionError::Relay)?;
        debug!(session = self.id, peer = %self.peer, end = ?end, "relay finished");
        Ok(end)
    }
}

/// Drive `work` to completion unless the client leg closes or errors first.
///
/// Client bytes read in the meantime are appended to `early`; once it holds
/// `limit` bytes the client is no longer read and `work` runs alone.
async fn watch_client<S, F>(
    client: &mut S,
    early: &mut BytesMut,
    limit: usize,
    work: F,
) -> Result<F::Output, SessionError>
where
    S: AsyncRead + Unpin,
    F: Future,
{
    tokio::pin!(work);
    loop {
        if early.len() >= limit {
            return Ok(work.await);
        }
        tokio::select! {
            biased;
            out = &mut work => return Ok(out),
            read = client.read_buf(&mut *early) => match read {
                Ok(0) => return Err(SessionError::ClientClosed),
                Ok(_) => {}
                Err(err) => return Err(SessionError::Relay(err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, DuplexStream, duplex};
    use veil_auth::{MemoryAuth, sha224_hex};
    use veil_dns::DnsError;
    use veil_proto::{AddressRef, HostRef, write_trojan_request, write_vless_request};

    const UUID: &str = "6cf627de-1a2b-4c3d-9e8f-706152433425";

    /// Hands out one end of a fresh duplex per connect and keeps the other.
    #[derive(Default)]
    struct DuplexConnector {
        targets: Mutex<Vec<SocketAddr>>,
        remotes: Mutex<Vec<DuplexStream>>,
        fail: bool,
    }

    #[async_trait]
    impl Connect for DuplexConnector {
        type Stream = DuplexStream;

        async fn connect(&self, target: SocketAddr) -> std::io::Result<DuplexStream> {
            self.targets.lock().unwrap().push(target);
            if self.fail {
                return Err(std::io::ErrorKind::ConnectionRefused.into());
            }
            let (local, remote) = duplex(4096);
            self.remotes.lock().unwrap().push(remote);
            Ok(local)
        }
    }

    impl DuplexConnector {
        fn take_remote(&self) -> DuplexStream {
            self.remotes.lock().unwrap().remove(0)
        }
    }

    struct StaticResolver {
        answer: Result<Ipv4Addr, ()>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StaticResolver {
        fn ok(ip: Ipv4Addr) -> Self {
            Self {
                answer: Ok(ip),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                answer: Err(()),
                ..Self::ok(Ipv4Addr::UNSPECIFIED)
            }
        }

        fn slow(ip: Ipv4Addr, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::ok(ip)
            }
        }
    }

    #[async_trait]
    impl Resolver for StaticResolver {
        async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, DnsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer.map_err(|_| DnsError::NoRecord(host.to_string()))
        }
    }

    fn env<'a>(
        auth: &'a MemoryAuth,
        resolver: &'a StaticResolver,
        connector: &'a DuplexConnector,
    ) -> SessionEnv<'a, DuplexConnector> {
        SessionEnv {
            auth,
            resolver,
            connector,
            trojan_target: "127.0.0.1:8080",
            idle_timeout: Duration::from_secs(5),
            relay_buffer_size: 4096,
        }
    }

    fn peer() -> SocketAddr {
        "198.51.100.7:50000".parse().unwrap()
    }

    fn vless_frame(uuid: &[u8; 16], host: HostRef<'_>, port: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = bytes::BytesMut::new();
        write_vless_request(&mut buf, uuid, &AddressRef { host, port }, payload).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn vless_acks_after_connect_and_relays() {
        let auth = MemoryAuth::from_uuid(UUID).unwrap();
        let resolver = StaticResolver::ok(Ipv4Addr::LOCALHOST);
        let connector = DuplexConnector::default();
        let frame = vless_frame(
            auth.credential().uuid_bytes(),
            HostRef::Ipv4([127, 0, 0, 1]),
            9000,
            b"PING",
        );

        let (client, mut client_peer) = duplex(4096);
        let env = env(&auth, &resolver, &connector);
        let mut session = Session::new(1, peer());

        let driver = async {
            let mut ack = [0u8; 2];
            client_peer.read_exact(&mut ack).await.unwrap();
            assert_eq!(ack, VLESS_ACK);

            let mut remote = connector.take_remote();
            let mut payload = [0u8; 4];
            remote.read_exact(&mut payload).await.unwrap();
            assert_eq!(&payload, b"PING");
            remote.write_all(b"PONG").await.unwrap();
            drop(remote);

            let mut resp = Vec::new();
            client_peer.read_to_end(&mut resp).await.unwrap();
            assert_eq!(resp, b"PONG");
        };

        let (result, ()) = tokio::join!(session.run(&env, client, &frame), driver);
        assert_eq!(result.unwrap(), RelayEnd::UpstreamClosed);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.protocol(), Some(ProtocolVariant::Vless));
        assert_eq!(
            connector.targets.lock().unwrap().as_slice(),
            &["127.0.0.1:9000".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flipped_credential_sends_nothing_and_never_connects() {
        let auth = MemoryAuth::from_uuid(UUID).unwrap();
        let resolver = StaticResolver::ok(Ipv4Addr::LOCALHOST);
        let connector = DuplexConnector::default();
        let mut uuid = *auth.credential().uuid_bytes();
        uuid[15] ^= 0x01;
        let frame = vless_frame(&uuid, HostRef::Ipv4([127, 0, 0, 1]), 80, b"");

        let (client, mut client_peer) = duplex(4096);
        let mut session = Session::new(2, peer());
        let err = session
            .run(&env(&auth, &resolver, &connector), client, &frame)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AuthMismatch));

        let mut rest = Vec::new();
        client_peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        assert!(connector.targets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn trojan_goes_to_default_target_without_forwarding_rest() {
        let auth = MemoryAuth::from_uuid(UUID).unwrap();
        let resolver = StaticResolver::ok(Ipv4Addr::LOCALHOST);
        let connector = DuplexConnector::default();
        let hash = sha224_hex(UUID);
        let mut buf = bytes::BytesMut::new();
        write_trojan_request(&mut buf, hash.as_bytes(), b"\r\n\x01\x01arbitrary").unwrap();

        let (client, mut client_peer) = duplex(4096);
        let env = env(&auth, &resolver, &connector);
        let mut session = Session::new(3, peer());

        let driver = async {
            client_peer.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
            client_peer.shutdown().await.unwrap();
            let mut remote = connector.take_remote();
            let mut got = Vec::new();
            remote.read_to_end(&mut got).await.unwrap();
            assert_eq!(got, b"GET / HTTP/1.0\r\n\r\n");
        };

        let (result, ()) = tokio::join!(session.run(&env, client, &buf), driver);
        assert_eq!(result.unwrap(), RelayEnd::ClientClosed);
        assert_eq!(session.protocol(), Some(ProtocolVariant::Trojan));
        assert_eq!(
            connector.targets.lock().unwrap().as_slice(),
            &["127.0.0.1:8080".parse::<SocketAddr>().unwrap()]
        );
    }

    #[tokio::test]
    async fn resolve_failure_ends_before_connect() {
        let auth = MemoryAuth::from_uuid(UUID).unwrap();
        let resolver = StaticResolver::failing();
        let connector = DuplexConnector::default();
        let frame = vless_frame(
            auth.credential().uuid_bytes(),
            HostRef::Domain("nowhere.example"),
            443,
            b"data",
        );

        let (client, mut client_peer) = duplex(4096);
        let mut session = Session::new(4, peer());
        let err = session
            .run(&env(&auth, &resolver, &connector), client, &frame)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ResolveFailure(_)));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert!(connector.targets.lock().unwrap().is_empty());

        let mut rest = Vec::new();
        client_peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty(), "no ack before connect");
    }

    #[tokio::test]
    async fn connect_failure_sends_no_ack() {
        let auth = MemoryAuth::from_uuid(UUID).unwrap();
        let resolver = StaticResolver::ok(Ipv4Addr::LOCALHOST);
        let connector = DuplexConnector {
            fail: true,
            ..Default::default()
        };
        let frame = vless_frame(
            auth.credential().uuid_bytes(),
            HostRef::Domain("svc.example"),
            80,
            b"",
        );

        let (client, mut client_peer) = duplex(4096);
        let mut session = Session::new(5, peer());
        let err = session
            .run(&env(&auth, &resolver, &connector), client, &frame)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ConnectFailure(_)));
        assert_eq!(
            connector.targets.lock().unwrap().as_slice(),
            &["127.0.0.1:80".parse::<SocketAddr>().unwrap()]
        );

        let mut rest = Vec::new();
        client_peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn malformed_header_is_rejected_silently() {
        let auth = MemoryAuth::from_uuid(UUID).unwrap();
        let resolver = StaticResolver::ok(Ipv4Addr::LOCALHOST);
        let connector = DuplexConnector::default();
        let mut frame = vless_frame(
            auth.credential().uuid_bytes(),
            HostRef::Ipv4([1, 2, 3, 4]),
            80,
            b"",
        );
        // address type byte sits right before the 4 address bytes
        let atyp = frame.len() - 5;
        frame[atyp] = 9;

        let (client, mut client_peer) = duplex(4096);
        let mut session = Session::new(6, peer());
        let err = session
            .run(&env(&auth, &resolver, &connector), client, &frame)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::HeaderMalformed(_)));
        assert_eq!(session.protocol(), None);

        let mut rest = Vec::new();
        client_peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn client_gone_during_lookup_never_connects() {
        let auth = MemoryAuth::from_uuid(UUID).unwrap();
        let resolver = StaticResolver::slow(Ipv4Addr::LOCALHOST, Duration::from_millis(300));
        let connector = DuplexConnector::default();
        let frame = vless_frame(
            auth.credential().uuid_bytes(),
            HostRef::Domain("slow.example"),
            80,
            b"payload",
        );

        let (client, client_peer) = duplex(4096);
        drop(client_peer);
        let mut session = Session::new(7, peer());
        let err = session
            .run(&env(&auth, &resolver, &connector), client, &frame)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ClientClosed));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(connector.targets.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn bytes_sent_during_lookup_follow_the_payload() {
        let auth = MemoryAuth::from_uuid(UUID).unwrap();
        let resolver = StaticResolver::slow(Ipv4Addr::LOCALHOST, Duration::from_millis(300));
        let connector = DuplexConnector::default();
        let frame = vless_frame(
            auth.credential().uuid_bytes(),
            HostRef::Domain("slow.example"),
            80,
            b"HEAD",
        );

        let (client, mut client_peer) = duplex(4096);
        let env = env(&auth, &resolver, &connector);
        let mut session = Session::new(8, peer());

        let driver = async {
            client_peer.write_all(b"TAIL").await.unwrap();
            let mut ack = [0u8; 2];
            client_peer.read_exact(&mut ack).await.unwrap();
            assert_eq!(ack, VLESS_ACK);

            let mut remote = connector.take_remote();
            let mut got = [0u8; 8];
            remote.read_exact(&mut got).await.unwrap();
            assert_eq!(&got, b"HEADTAIL");
            drop(remote);
        };

        let (result, ()) = tokio::join!(session.run(&env, client, &frame), driver);
        assert_eq!(result.unwrap(), RelayEnd::UpstreamClosed);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn state_machine_allows_only_forward_edges() {
        use SessionState::*;
        assert!(Init.can_advance_to(ParsingHeader));
        assert!(ParsingHeader.can_advance_to(AuthFailed));
        assert!(Connecting.can_advance_to(Relaying));
        assert!(Relaying.can_advance_to(Closed));
        assert!(AuthFailed.can_advance_to(Closed));
        assert!(!Init.can_advance_to(Relaying));
        assert!(!AuthFailed.can_advance_to(Resolving));
        assert!(!Resolving.can_advance_to(Relaying));
    }
}
