//! Runtime configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default authority port.
pub const DEFAULT_PORT: u16 = 27185;

/// Default per-turn budget.
pub const DEFAULT_BYTECODE_LIMIT: i64 = 20_000;

/// Settings for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Authority host.
    pub host: IpAddr,
    /// Authority port.
    pub port: u16,
    /// Budget granted at spawn and at the start of every turn.
    pub bytecode_limit: i64,
    /// Delay between refused connection attempts.
    pub retry_interval: Duration,
    /// Call depth limit inside programs.
    pub max_depth: usize,
    /// Stack size of each worker thread (bytes).
    pub stack_size: usize,
    /// Log every event and per-instance failure.
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            bytecode_limit: DEFAULT_BYTECODE_LIMIT,
            retry_interval: Duration::from_millis(100),
            max_depth: 200,
            stack_size: 32 * 1024 * 1024, // 32 MiB
            debug: false,
        }
    }
}

impl RuntimeConfig {
    /// Address of the authority.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.addr().to_string(), "127.0.0.1:27185");
        assert_eq!(config.bytecode_limit, 20_000);
        assert_eq!(config.retry_interval, Duration::from_millis(100));
    }
}
