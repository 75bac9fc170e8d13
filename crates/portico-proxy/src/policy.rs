use std::time::Duration;

/// Construction-time settings for the shared HTTP client. The pool is
/// process-wide; per-call timeouts come from the capability endpoint.
#[derive(Clone, Debug)]
pub struct PoolPolicy {
    pub max_idle_per_host: usize,
    pub connect_timeout: Duration,
    pub tcp_keepalive: Duration,
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self {
            max_idle_per_host: 32,
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: Duration::from_secs(30),
        }
    }
}
