//! Main server loop and connection handling.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use veil_auth::AuthBackend;
use veil_config::Config;
use veil_dns::DohResolver;
use veil_metrics::{
    ERROR_PANIC, ERROR_TLS_HANDSHAKE, record_connection_accepted, record_connection_closed,
    record_connection_rejected, record_error, record_tls_handshake_duration,
};

use crate::error::ServerError;
use crate::handler::handle_conn;
use crate::site::lookup_isp;
use crate::state::ServerState;
use crate::tls::load_tls_config;
use crate::util::{ConnectionTracker, create_listener};

/// Run the server until `shutdown` is cancelled, then drain live sessions.
pub async fn run_with_shutdown(
    config: Config,
    auth: impl AuthBackend + 'static,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let acceptor = match &config.tls {
        Some(tls) => Some(TlsAcceptor::from(Arc::new(load_tls_config(tls)?))),
        None => None,
    };
    let tls_timeout = Duration::from_secs(
        config
            .tls
            .as_ref()
            .map_or(veil_core::DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS, |t| {
                t.handshake_timeout_secs
            }),
    );

    let listen: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|_| ServerError::Config(format!("invalid listen address: {}", config.server.listen)))?;

    let resolver = DohResolver::new(&config.dns)?;
    info!(doh_url = %config.dns.doh_url, timeout_ms = config.dns.timeout_ms, "resolver configured");

    let isp = if config.site.geoip_enabled {
        lookup_isp(
            &config.site.geoip_url,
            Duration::from_millis(config.site.geoip_timeout_ms),
        )
        .await
    } else {
        veil_core::DEFAULT_ISP_LABEL.to_string()
    };
    info!(isp = %isp, "node label resolved");

    let state = Arc::new(ServerState::new(
        &config,
        Arc::new(auth),
        Arc::new(resolver),
        isp,
    ));

    let listener = create_listener(listen, config.server.connection_backlog)?;
    info!(
        address = %listen,
        backlog = config.server.connection_backlog,
        tls = acceptor.is_some(),
        ws_path = %state.routes.ws_path,
        "listening"
    );

    let conn_limit: Option<Arc<Semaphore>> = config.server.connection_limit().map(|n| {
        info!("max_connections set to {}", n);
        Arc::new(Semaphore::new(n))
    });
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);

    serve(listener, state, acceptor, tls_timeout, conn_limit, shutdown, shutdown_timeout).await
}

async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
    acceptor: Option<TlsAcceptor>,
    tls_timeout: Duration,
    conn_limit: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
) -> Result<(), ServerError> {
    let tracker = ConnectionTracker::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            result = listener.accept() => {
                let (tcp, peer) = match result {
                    Ok(v) => v,
                    Err(err) => {
                        // EMFILE and friends; back off briefly.
                        warn!(error = %err, "accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                };

                let permit: Option<OwnedSemaphorePermit> = match &conn_limit {
                    Some(sem) => match sem.clone().try_acquire_owned() {
                        Ok(p) => Some(p),
                        Err(_) => {
                            debug!(peer = %peer, reason = "max_connections", "connection rejected");
                            record_connection_rejected("max_connections");
                            drop(tcp);
                            continue;
                        }
                    },
                    None => None,
                };

                let session_id = state.next_session_id();
                debug!(peer = %peer, session = session_id, "new connection");

                let acceptor = acceptor.clone();
                let state = state.clone();
                let guard = tracker.track();

                tokio::spawn(async move {
                    let _guard = guard;
                    let _permit = permit;
                    record_connection_accepted();
                    let start = Instant::now();

                    let work = async {
                        match acceptor {
                            Some(acceptor) => {
                                let tls_start = Instant::now();
                                match tokio::time::timeout(tls_timeout, acceptor.accept(tcp)).await {
                                    Ok(Ok(tls)) => {
                                        let tls_duration = tls_start.elapsed().as_secs_f64();
                                        record_tls_handshake_duration(tls_duration);
                                        debug!(peer = %peer, duration_ms = tls_duration * 1000.0, "TLS handshake completed");
                                        handle_conn(tls, state, peer, session_id).await
                                    }
                                    Ok(Err(err)) => {
                                        record_error(ERROR_TLS_HANDSHAKE);
                                        debug!(peer = %peer, error = %err, "TLS handshake failed");
                                        Ok(())
                                    }
                                    Err(_) => {
                                        record_error(ERROR_TLS_HANDSHAKE);
                                        debug!(peer = %peer, timeout_secs = tls_timeout.as_secs(), "TLS handshake timed out");
                                        Ok(())
                                    }
                                }
                            }
                            None => handle_conn(tcp, state, peer, session_id).await,
                        }
                    };

                    let outcome = AssertUnwindSafe(work).catch_unwind().await;
                    let duration_secs = start.elapsed().as_secs_f64();
                    record_connection_closed(duration_secs);

                    match outcome {
                        Ok(Ok(())) => debug!(peer = %peer, session = session_id, duration_secs, "connection closed"),
                        Ok(Err(err)) => {
                            record_error(err.error_type());
                            debug!(peer = %peer, session = session_id, duration_secs, error = %err, "session ended with error");
                        }
                        Err(_) => {
                            record_error(ERROR_PANIC);
                            error!(peer = %peer, session = session_id, "session task panicked");
                        }
                    }
                });
            }
        }
    }

    drop(listener);

    let active = tracker.count();
    if active > 0 {
        info!("waiting for {} active connections to drain", active);
        if tracker.wait_for_zero(shutdown_timeout).await {
            info!("all connections drained");
        } else {
            warn!(
                "shutdown timeout, {} connections still active",
                tracker.count()
            );
        }
    }

    info!("server stopped");
    Ok(())
}

/// Run the server without external shutdown control.
pub async fn run(config: Config, auth: impl AuthBackend + 'static) -> Result<(), ServerError> {
    run_with_shutdown(config, auth, CancellationToken::new()).await
}
