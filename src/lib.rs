//! Network speed overlay
//!
//! Samples the OS network byte counters once a second and shows upload and
//! download rates in a small always-on-top panel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    runtime                          │
//! │   select! loop: sample / topmost / event timers     │
//! ├──────────────────────────┬──────────────────────────┤
//! │  counters -> sampler     │   topmost                │
//! │  (OS totals -> rates)    │   (re-raise the window)  │
//! ├──────────────────────────┴──────────────────────────┤
//! │                    overlays/                        │
//! │      NetSpeedOverlay (display state + painting)     │
//! ├─────────────────────────────────────────────────────┤
//! │                    manager                          │
//! │       OverlayWindow (platform + back buffer)        │
//! ├─────────────────────────────────────────────────────┤
//! │                    renderer                         │
//! │             tiny-skia + cosmic-text                 │
//! ├─────────────────────────────────────────────────────┤
//! │                    platform/                        │
//! │               x11, windows, macos                   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod counters;
pub mod error;
pub mod logging;
pub mod manager;
pub mod overlays;
pub mod platform;
pub mod renderer;
pub mod runtime;
pub mod sampler;
pub mod topmost;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::OverlaySettings;
pub use counters::{CounterReading, CounterSource, SysinfoCounters};
pub use error::{AppError, ConfigError, CounterError, SampleError};
pub use overlays::{DisplayState, NetSpeedOverlay};
pub use platform::{NativeOverlay, OverlayConfig, OverlayPlatform, PlatformError};
pub use sampler::{RateSample, RateSampler};
pub use topmost::TopmostEnforcer;
pub use utils::format_rate;
