//! Node tuning knobs.
//!
//! Defaults mirror the constants the protocol was designed around; the binary
//! overrides individual fields from the command line.

use std::time::Duration;

/// Seconds-to-live of a cached response under the periodic sweep.
pub const DEFAULT_CACHE_TTL: u8 = 4;
/// Wait hint sent with overload responses.
pub const OVERLOAD_WAIT_TIME_MS: i32 = 5000;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Interval between gossip rounds.
    pub gossip_interval_ms: u64,
    /// Deadline of a synchronous exchange (gossip pull, liveness probe).
    pub exchange_timeout_ms: u64,
    pub cache_ttl: u8,
    pub sweep_interval_ms: u64,
    /// Act on SON_DIED / GRANDSON_DIED by pushing replicas two hops away.
    /// Off by default: those notices are accepted and ignored.
    pub second_order_repair: bool,
    /// Largest single allocation the memory budget admits; `None` is unlimited.
    pub max_allocation_bytes: Option<usize>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            gossip_interval_ms: 1000,
            exchange_timeout_ms: 100,
            cache_ttl: DEFAULT_CACHE_TTL,
            sweep_interval_ms: 1000,
            second_order_repair: false,
            max_allocation_bytes: None,
        }
    }
}

impl NodeConfig {
    pub fn gossip_interval(&self) -> Duration {
        Duration::from_millis(self.gossip_interval_ms)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
