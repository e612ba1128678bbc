//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `veil_core::defaults`.

use veil_core::defaults;

/// Generate default value functions that forward to veil_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_tcp_timeout_secs        => DEFAULT_TCP_TIMEOUT_SECS: u64,
    default_handshake_timeout_secs  => DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64,
    default_connect_timeout_secs    => DEFAULT_CONNECT_TIMEOUT_SECS: u64,
    default_shutdown_timeout_secs   => DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64,
    default_max_header_bytes        => DEFAULT_MAX_HEADER_BYTES: usize,
    min_header_bytes                => MIN_HEADER_BYTES: usize,
    default_relay_buffer_size       => DEFAULT_RELAY_BUFFER_SIZE: usize,
    default_connection_backlog      => DEFAULT_CONNECTION_BACKLOG: u32,
    default_tls_handshake_timeout_secs => DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64,
    default_ws_max_frame_bytes      => DEFAULT_WS_MAX_FRAME_BYTES: usize,
    ws_path_uuid_chars              => DEFAULT_WS_PATH_UUID_CHARS: usize,
    default_public_port             => DEFAULT_PUBLIC_PORT: u16,
    default_geoip_timeout_ms        => DEFAULT_GEOIP_TIMEOUT_MS: u64,
    // TCP socket options
    default_tcp_no_delay            => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_send_buffer         => DEFAULT_TCP_SEND_BUFFER: usize,
    default_tcp_recv_buffer         => DEFAULT_TCP_RECV_BUFFER: usize,
}

default_string_fns! {
    default_listen          => DEFAULT_LISTEN,
    default_min_tls_version => DEFAULT_TLS_MIN_VERSION,
    default_max_tls_version => DEFAULT_TLS_MAX_VERSION,
    default_trojan_target   => DEFAULT_TROJAN_TARGET,
    default_sub_path        => DEFAULT_SUB_PATH,
    default_node_name       => DEFAULT_NODE_NAME,
    default_geoip_url       => DEFAULT_GEOIP_URL,
}

pub(crate) fn default_true() -> bool {
    true
}
