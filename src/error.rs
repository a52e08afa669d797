//! Error types for sampling, configuration and startup

use thiserror::Error;

use crate::platform::PlatformError;

/// The OS could not report network byte counters
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("network counters unavailable: {0}")]
    Unavailable(String),
}

/// Why a sampling tick produced no rate
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read network counters")]
    Counter(#[from] CounterError),

    /// A cumulative counter went backwards (interface reset or wrap).
    /// The sampler has already re-baselined on the new reading.
    #[error(
        "network counters went backwards (sent {previous_sent} -> {current_sent}, \
         received {previous_recv} -> {current_recv})"
    )]
    CounterReset {
        previous_sent: u64,
        current_sent: u64,
        previous_recv: u64,
        current_recv: u64,
    },
}

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Fatal startup errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create overlay window")]
    Platform(#[from] PlatformError),

    #[error("failed to take the initial counter reading")]
    Counter(#[from] CounterError),

    #[error("failed to start event loop")]
    Runtime(#[source] std::io::Error),
}
