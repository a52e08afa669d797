//! Cumulative network byte counters

use sysinfo::Networks;
use tracing::debug;

use crate::error::CounterError;

/// Bytes sent and received by all interfaces since the network stack started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterReading {
    pub sent_bytes: u64,
    pub recv_bytes: u64,
}

/// Anything that can report cumulative sent/received byte totals
pub trait CounterSource {
    fn read(&mut self) -> Result<CounterReading, CounterError>;
}

/// Counters aggregated over every interface `sysinfo` can see
pub struct SysinfoCounters {
    networks: Networks,
}

impl SysinfoCounters {
    pub fn new() -> Result<Self, CounterError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(CounterError::Unavailable(
                "network statistics are not supported on this platform".to_string(),
            ));
        }

        let networks = Networks::new_with_refreshed_list();
        debug!(interfaces = networks.list().len(), "Network interfaces discovered");
        Ok(Self { networks })
    }
}

impl CounterSource for SysinfoCounters {
    fn read(&mut self) -> Result<CounterReading, CounterError> {
        self.networks.refresh(true);

        let interfaces = self.networks.list();
        if interfaces.is_empty() {
            return Err(CounterError::Unavailable(
                "no network interfaces reported".to_string(),
            ));
        }

        Ok(interfaces
            .values()
            .fold(CounterReading::default(), |acc, data| CounterReading {
                sent_bytes: acc.sent_bytes.saturating_add(data.total_transmitted()),
                recv_bytes: acc.recv_bytes.saturating_add(data.total_received()),
            }))
    }
}
