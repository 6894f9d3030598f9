//! Session configuration.

use std::time::Duration;

use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default bound on socket connect plus handshake reply.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on receiving the remainder of a partially read frame.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound on socket establishment and on the handshake reply.
    pub connect_timeout: Duration,
    /// Bound on completing a frame once its first bytes have arrived.
    ///
    /// An idle connection is not subject to this timeout; it only applies
    /// mid-frame, where a stall means the peer died or the stream broke.
    pub read_timeout: Duration,
    /// Maximum accepted payload size for a single inbound frame.
    pub max_payload_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl SessionConfig {
    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the mid-frame read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the maximum inbound payload size.
    pub fn max_payload_size(mut self, bytes: u32) -> Self {
        self.max_payload_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_config_builders() {
        let config = SessionConfig::default()
            .connect_timeout(Duration::from_secs(1))
            .read_timeout(Duration::from_secs(2))
            .max_payload_size(4096);

        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_timeout, Duration::from_secs(2));
        assert_eq!(config.max_payload_size, 4096);
    }
}
