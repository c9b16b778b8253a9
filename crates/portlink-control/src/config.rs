//! Broker configuration
//!
//! All environment-sourced settings collapsed into one struct handed to the
//! broker at startup.

/// Runtime configuration for the broker core.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Lowest port managed by the pool (inclusive)
    pub port_range_min: u16,
    /// Highest port managed by the pool (inclusive)
    pub port_range_max: u16,
    /// This broker's externally reachable address, stored on each connection
    pub server_url: String,
    /// Kafka bootstrap address for lifecycle events
    pub kafka_url: String,
}

impl BrokerConfig {
    /// Number of ports the pool manages.
    pub fn pool_size(&self) -> usize {
        usize::from(self.port_range_max - self.port_range_min) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_is_inclusive() {
        let config = BrokerConfig {
            port_range_min: 6000,
            port_range_max: 7000,
            server_url: "broker.example.com".to_string(),
            kafka_url: "kafka:9092".to_string(),
        };
        assert_eq!(config.pool_size(), 1001);
    }
}
