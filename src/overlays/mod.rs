//! Overlay content
//!
//! An overlay owns its `OverlayWindow`, keeps the state it displays and
//! knows how to paint that state into the window's back buffer.

mod net_speed;

pub use net_speed::{DisplayState, NetSpeedOverlay};
