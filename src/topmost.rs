//! Keeps the overlay above other windows
//!
//! Some windowing systems let fullscreen or freshly activated windows cover a
//! topmost surface. Re-issuing the stacking request on a short period puts the
//! overlay back on top. A failed request is logged and retried next tick.

use tracing::{debug, info, warn};

use crate::platform::OverlayPlatform;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnforcerStats {
    pub attempts: u64,
    pub failures: u64,
    /// Consecutive failures up to the latest attempt
    pub streak: u64,
}

#[derive(Debug, Default)]
pub struct TopmostEnforcer {
    stats: EnforcerStats,
}

impl TopmostEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue one raise request. Returns whether the platform accepted it.
    pub fn tick<P: OverlayPlatform>(&mut self, platform: &P) -> bool {
        self.stats.attempts += 1;

        match platform.raise_topmost() {
            Ok(()) => {
                if self.stats.streak > 0 {
                    info!(failed_attempts = self.stats.streak, "Topmost raise recovered");
                    self.stats.streak = 0;
                }
                true
            }
            Err(e) => {
                self.stats.failures += 1;
                self.stats.streak += 1;
                // Warn once per failure run
                if self.stats.streak == 1 {
                    warn!(error = %e, "Failed to raise overlay to topmost");
                } else {
                    debug!(error = %e, streak = self.stats.streak, "Topmost raise still failing");
                }
                false
            }
        }
    }

    pub fn stats(&self) -> EnforcerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OverlayConfig;
    use crate::testing::HeadlessOverlay;

    fn window() -> HeadlessOverlay {
        HeadlessOverlay::new(OverlayConfig::default()).unwrap()
    }

    #[test]
    fn test_raises_every_tick() {
        let window = window();
        let mut enforcer = TopmostEnforcer::new();

        for _ in 0..5 {
            assert!(enforcer.tick(&window));
        }
        assert_eq!(window.raises(), 5);
        assert_eq!(
            enforcer.stats(),
            EnforcerStats {
                attempts: 5,
                failures: 0,
                streak: 0,
            }
        );
    }

    #[test]
    fn test_failures_do_not_stop_later_attempts() {
        let window = window();
        window.fail_next_raises(3);
        let mut enforcer = TopmostEnforcer::new();

        let results: Vec<bool> = (0..5).map(|_| enforcer.tick(&window)).collect();

        assert_eq!(results, vec![false, false, false, true, true]);
        assert_eq!(window.raises(), 5);
        assert_eq!(enforcer.stats().failures, 3);
        assert_eq!(enforcer.stats().streak, 0);
    }

    #[test]
    fn test_streak_tracks_current_failure_run() {
        let window = window();
        let mut enforcer = TopmostEnforcer::new();

        window.fail_next_raises(2);
        enforcer.tick(&window);
        enforcer.tick(&window);
        assert_eq!(enforcer.stats().streak, 2);

        enforcer.tick(&window);
        window.fail_next_raises(1);
        enforcer.tick(&window);
        assert_eq!(enforcer.stats().streak, 1);
        assert_eq!(enforcer.stats().failures, 3);
        assert_eq!(enforcer.stats().attempts, 4);
    }
}
