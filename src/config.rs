use std::net::SocketAddr;

const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration, assembled once at startup and immutable
/// thereafter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Address the exporter listens on for scrapes.
    pub listen_address: SocketAddr,
    /// Path under which metrics are exposed.
    pub telemetry_path: String,
    /// Base URL of the Mirth Connect management API, without a trailing
    /// slash, e.g. `https://mirth.example.org:8443`.
    pub mirth_endpoint: String,
    pub mirth_username: String,
    pub mirth_password: String,
    /// The management API usually sits behind a self-signed certificate;
    /// keep both timeouts so a stalled engine cannot stall scrapes forever.
    pub http_connect_timeout_secs: u64,
    pub http_request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: ([0, 0, 0, 0], 9141).into(),
            telemetry_path: "/metrics".to_string(),
            mirth_endpoint: String::default(),
            mirth_username: String::default(),
            mirth_password: String::default(),
            http_connect_timeout_secs: DEFAULT_HTTP_CONNECT_TIMEOUT_SECS,
            http_request_timeout_secs: DEFAULT_HTTP_REQUEST_TIMEOUT_SECS,
        }
    }
}
