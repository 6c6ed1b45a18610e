//! Broker configuration.

use tokex_rpc::TransportConfig;
use tokex_session::SessionConfig;

/// Everything tunable about a broker instance.
///
/// Defaults: 5 s call timeout, 300 ms proposal time fudge, 24 h bound on
/// acceptance deadlines.
#[derive(Debug, Clone, Default)]
pub struct BrokerConfig {
    pub transport: TransportConfig,
    pub session: SessionConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.transport.call_timeout.as_millis(), 5_000);
        assert_eq!(config.session.fudge_ms, 300);
        assert_eq!(config.session.max_acceptance_window_ms, 86_400_000);
    }
}
