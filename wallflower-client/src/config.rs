//! Client configuration.

use std::time::Duration;

/// Default retry budget for the leader-avoidance loop.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default base delay for the exponential reconnect backoff.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Default cap on the reconnect backoff.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_millis(15_000);

/// Default upper bound on the random initial-connect delay.
pub const DEFAULT_INITIAL_DELAY_MAX: Duration = Duration::from_millis(1000);

/// Adapter configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Log protocol frames at debug level.
    pub debug: bool,
    /// Discriminator tag of the application's to-backend constructor.
    pub variant_tag: u8,
    /// How many self-elections to tolerate before giving up.
    pub max_retries: u32,
    /// Base delay of the reconnect backoff.
    pub retry_base_delay: Duration,
    /// Cap on the reconnect backoff (jitter included).
    pub retry_max_delay: Duration,
    /// The very first connect is delayed by a uniform random amount up to
    /// this bound, so simultaneously-started clients do not all arrive at
    /// the host in the same instant (which would make each of them likely
    /// to be elected leader of its session).
    pub initial_delay_max: Duration,
    /// Use this session id instead of generating one.
    pub session_id: Option<String>,
    /// Send this cookie string verbatim on the first upgrade request. The
    /// session id is extracted from its `sid` attribute when present.
    pub cookie: Option<String>,
    /// WebSocket subprotocols offered on the upgrade request.
    pub protocols: Vec<String>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_variant_tag(mut self, tag: u8) -> Self {
        self.variant_tag = tag;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = delay;
        self
    }

    pub fn with_initial_delay_max(mut self, delay: Duration) -> Self {
        self.initial_delay_max = delay;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            variant_tag: wallflower_protocol::DEFAULT_TAG,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            retry_max_delay: DEFAULT_RETRY_MAX_DELAY,
            initial_delay_max: DEFAULT_INITIAL_DELAY_MAX,
            session_id: None,
            cookie: None,
            protocols: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new();
        assert!(!config.debug);
        assert_eq!(config.variant_tag, 0);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.retry_base_delay, Duration::from_millis(2000));
        assert_eq!(config.retry_max_delay, Duration::from_millis(15_000));
        assert_eq!(config.initial_delay_max, Duration::from_millis(1000));
        assert!(config.session_id.is_none());
        assert!(config.cookie.is_none());
        assert!(config.protocols.is_empty());
    }

    #[test]
    fn test_config_builders_chain() {
        let config = ClientConfig::new()
            .with_debug(true)
            .with_variant_tag(2)
            .with_max_retries(3)
            .with_retry_base_delay(Duration::from_millis(10))
            .with_retry_max_delay(Duration::from_millis(50))
            .with_initial_delay_max(Duration::ZERO)
            .with_session_id("fixed-session")
            .with_cookie("sid=fixed-session")
            .with_protocols(["wire3"]);
        assert!(config.debug);
        assert_eq!(config.variant_tag, 2);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(10));
        assert_eq!(config.retry_max_delay, Duration::from_millis(50));
        assert_eq!(config.initial_delay_max, Duration::ZERO);
        assert_eq!(config.session_id.as_deref(), Some("fixed-session"));
        assert_eq!(config.cookie.as_deref(), Some("sid=fixed-session"));
        assert_eq!(config.protocols, ["wire3"]);
    }
}
