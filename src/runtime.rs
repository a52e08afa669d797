//! Main event loop
//!
//! One `select!` loop on the current thread drives three timers: sampling,
//! topmost enforcement and platform event polling. Callbacks never overlap, so
//! the overlay is handed to each one by plain borrow. Whatever a callback
//! changes is painted before the next timer is serviced.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::config::OverlaySettings;
use crate::counters::CounterSource;
use crate::error::SampleError;
use crate::overlays::NetSpeedOverlay;
use crate::platform::OverlayPlatform;
use crate::sampler::RateSampler;
use crate::topmost::TopmostEnforcer;

/// Platform event polling period (~60 Hz)
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub sample: Duration,
    pub topmost: Duration,
    pub event_poll: Duration,
}

impl Schedule {
    pub fn from_settings(settings: &OverlaySettings) -> Self {
        Self {
            sample: settings.sample_interval(),
            topmost: settings.topmost_interval(),
            event_poll: EVENT_POLL_INTERVAL,
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from_settings(&OverlaySettings::default())
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    WindowClosed,
    Shutdown,
}

/// Run until the window closes or `shutdown` resolves.
///
/// The first frame is painted immediately. Every timer first fires one full
/// period after start.
pub async fn run<P, C, F>(
    overlay: &mut NetSpeedOverlay<P>,
    sampler: &mut RateSampler<C>,
    enforcer: &mut TopmostEnforcer,
    schedule: Schedule,
    shutdown: F,
) -> ExitReason
where
    P: OverlayPlatform,
    C: CounterSource,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let start = Instant::now();
    let mut sample_timer = interval_at(start + schedule.sample, schedule.sample);
    let mut topmost_timer = interval_at(start + schedule.topmost, schedule.topmost);
    let mut event_timer = interval_at(start + schedule.event_poll, schedule.event_poll);
    for timer in [&mut sample_timer, &mut topmost_timer, &mut event_timer] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    info!(
        sample_ms = schedule.sample.as_millis() as u64,
        topmost_ms = schedule.topmost.as_millis() as u64,
        "Overlay loop started"
    );
    overlay.render();

    let reason = loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested");
                break ExitReason::Shutdown;
            }
            _ = event_timer.tick() => {
                if !overlay.poll_events() {
                    info!("Overlay window closed");
                    break ExitReason::WindowClosed;
                }
            }
            _ = topmost_timer.tick() => {
                enforcer.tick(overlay.platform());
            }
            _ = sample_timer.tick() => {
                match sampler.tick() {
                    Ok(sample) => {
                        overlay.on_sample(&sample);
                        debug!(
                            upload = %overlay.display().upload_line,
                            download = %overlay.display().download_line,
                            "Sample"
                        );
                    }
                    Err(e @ SampleError::CounterReset { .. }) => {
                        info!(error = %e, "Counters reset, keeping previous rates on screen");
                    }
                    Err(SampleError::Counter(e)) => {
                        warn!(error = %e, "Skipped network sample");
                    }
                }
            }
        }

        overlay.render_if_needed();
    };

    let sampler_stats = sampler.stats();
    let enforcer_stats = enforcer.stats();
    info!(
        ?reason,
        samples = sampler_stats.samples,
        skipped = sampler_stats.skipped,
        resets = sampler_stats.resets,
        raises = enforcer_stats.attempts,
        raise_failures = enforcer_stats.failures,
        "Overlay loop stopped"
    );
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CounterError;
    use crate::overlays::DisplayState;
    use crate::platform::MonitorInfo;
    use crate::testing::{HeadlessOverlay, ScriptedCounters, SteadyCounters, reading};

    fn overlay() -> NetSpeedOverlay<HeadlessOverlay> {
        let monitors = [MonitorInfo {
            id: "primary".to_string(),
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
            is_primary: true,
        }];
        NetSpeedOverlay::new(OverlaySettings::default(), &monitors).unwrap()
    }

    fn after(ms: u64) -> tokio::time::Sleep {
        tokio::time::sleep(Duration::from_millis(ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sample_shows_steady_rates() {
        let mut overlay = overlay();
        let mut sampler = RateSampler::new(SteadyCounters::new(2048, 512), Duration::from_secs(1))
            .unwrap();
        let mut enforcer = TopmostEnforcer::new();

        let reason = run(
            &mut overlay,
            &mut sampler,
            &mut enforcer,
            Schedule::default(),
            after(1010),
        )
        .await;

        assert_eq!(reason, ExitReason::Shutdown);
        assert_eq!(
            overlay.display(),
            &DisplayState {
                upload_line: "U: 2.00 KB/S".to_string(),
                download_line: "D: 512.00 B/S".to_string(),
            }
        );
        assert_eq!(sampler.stats().samples, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_topmost_runs_on_its_own_cadence() {
        let mut overlay = overlay();
        let mut sampler = RateSampler::new(SteadyCounters::new(1, 1), Duration::from_secs(1))
            .unwrap();
        let mut enforcer = TopmostEnforcer::new();

        run(
            &mut overlay,
            &mut sampler,
            &mut enforcer,
            Schedule::default(),
            after(1010),
        )
        .await;

        assert_eq!(overlay.platform().raises(), 20);
        assert_eq!(enforcer.stats().attempts, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_raise_failures_do_not_stop_enforcement() {
        let mut overlay = overlay();
        overlay.platform().fail_next_raises(5);
        let mut sampler = RateSampler::new(SteadyCounters::new(1, 1), Duration::from_secs(1))
            .unwrap();
        let mut enforcer = TopmostEnforcer::new();

        run(
            &mut overlay,
            &mut sampler,
            &mut enforcer,
            Schedule::default(),
            after(510),
        )
        .await;

        assert_eq!(overlay.platform().raises(), 10);
        assert_eq!(enforcer.stats().failures, 5);
        assert_eq!(enforcer.stats().streak, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sample_keeps_display_and_next_covers_gap() {
        let mut overlay = overlay();
        let source = ScriptedCounters::new([
            Ok(reading(0, 0)),
            Ok(reading(1024, 2048)),
            Err(CounterError::Unavailable("interface down".into())),
            Ok(reading(4096, 2048 + 3 * 1024 * 1024)),
        ]);
        let mut sampler = RateSampler::new(source, Duration::from_secs(1)).unwrap();
        let mut enforcer = TopmostEnforcer::new();

        run(
            &mut overlay,
            &mut sampler,
            &mut enforcer,
            Schedule::default(),
            after(2010),
        )
        .await;
        assert_eq!(overlay.display().upload_line, "U: 1.00 KB/S");
        assert_eq!(overlay.display().download_line, "D: 2.00 KB/S");

        run(
            &mut overlay,
            &mut sampler,
            &mut enforcer,
            Schedule::default(),
            after(1010),
        )
        .await;
        assert_eq!(overlay.display().upload_line, "U: 3.00 KB/S");
        assert_eq!(overlay.display().download_line, "D: 3.00 MB/S");
        assert_eq!(sampler.stats().skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_reset_leaves_display_unchanged() {
        let mut overlay = overlay();
        let source = ScriptedCounters::new([
            Ok(reading(10_000, 10_000)),
            Ok(reading(12_048, 10_512)),
            Ok(reading(5, 5)),
        ]);
        let mut sampler = RateSampler::new(source, Duration::from_secs(1)).unwrap();
        let mut enforcer = TopmostEnforcer::new();

        run(
            &mut overlay,
            &mut sampler,
            &mut enforcer,
            Schedule::default(),
            after(2010),
        )
        .await;

        assert_eq!(overlay.display().upload_line, "U: 2.00 KB/S");
        assert_eq!(overlay.display().download_line, "D: 512.00 B/S");
        assert_eq!(sampler.stats().resets, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_close_ends_loop() {
        let mut overlay = overlay();
        overlay.platform().close_after_polls(3);
        let mut sampler = RateSampler::new(SteadyCounters::new(1, 1), Duration::from_secs(1))
            .unwrap();
        let mut enforcer = TopmostEnforcer::new();

        let reason = run(
            &mut overlay,
            &mut sampler,
            &mut enforcer,
            Schedule::default(),
            std::future::pending(),
        )
        .await;

        assert_eq!(reason, ExitReason::WindowClosed);
        // Closed at 48ms, before the first raise or sample
        assert_eq!(overlay.platform().raises(), 0);
        assert_eq!(sampler.stats().samples, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renders_once_per_sample_when_idle() {
        let mut overlay = overlay();
        let mut sampler = RateSampler::new(SteadyCounters::new(100, 100), Duration::from_secs(1))
            .unwrap();
        let mut enforcer = TopmostEnforcer::new();

        run(
            &mut overlay,
            &mut sampler,
            &mut enforcer,
            Schedule::default(),
            after(3010),
        )
        .await;

        // Initial frame plus one per sample
        assert_eq!(overlay.platform().commits(), 4);
    }
}
