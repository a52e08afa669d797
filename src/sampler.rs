//! Turns cumulative counters into per-second rates
//!
//! The sampler keeps the last good reading as its baseline. Every tick reads
//! the counters again and reports the difference. A failed read leaves the
//! baseline untouched, so the next successful tick covers the whole gap and
//! no bytes go unaccounted.

use std::time::Duration;

use crate::counters::{CounterReading, CounterSource};
use crate::error::{CounterError, SampleError};

/// Upload and download throughput over one sampling interval
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSample {
    pub upload_bytes_per_sec: f64,
    pub download_bytes_per_sec: f64,
}

/// Running totals, logged on shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub samples: u64,
    pub skipped: u64,
    pub resets: u64,
}

pub struct RateSampler<C> {
    source: C,
    previous: CounterReading,
    interval: Duration,
    stats: SamplerStats,
}

impl<C: CounterSource> RateSampler<C> {
    /// Take the baseline reading. The baseline itself is never reported.
    ///
    /// `interval` is the nominal tick period; deltas are divided by it so the
    /// sample is always in bytes per second.
    pub fn new(mut source: C, interval: Duration) -> Result<Self, CounterError> {
        let previous = source.read()?;
        Ok(Self {
            source,
            previous,
            interval,
            stats: SamplerStats::default(),
        })
    }

    pub fn tick(&mut self) -> Result<RateSample, SampleError> {
        let current = match self.source.read() {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.skipped += 1;
                return Err(e.into());
            }
        };

        let previous = self.previous;
        if current.sent_bytes < previous.sent_bytes || current.recv_bytes < previous.recv_bytes {
            self.previous = current;
            self.stats.resets += 1;
            return Err(SampleError::CounterReset {
                previous_sent: previous.sent_bytes,
                current_sent: current.sent_bytes,
                previous_recv: previous.recv_bytes,
                current_recv: current.recv_bytes,
            });
        }

        let secs = self.interval.as_secs_f64();
        let per_second = |delta: u64| {
            if secs > 0.0 {
                delta as f64 / secs
            } else {
                delta as f64
            }
        };

        let sample = RateSample {
            upload_bytes_per_sec: per_second(current.sent_bytes - previous.sent_bytes),
            download_bytes_per_sec: per_second(current.recv_bytes - previous.recv_bytes),
        };

        self.previous = current;
        self.stats.samples += 1;
        Ok(sample)
    }

    /// Endless sequence of ticks; each item is one sampling attempt
    pub fn samples(&mut self) -> impl Iterator<Item = Result<RateSample, SampleError>> + '_ {
        std::iter::repeat_with(move || self.tick())
    }

    pub fn previous(&self) -> CounterReading {
        self.previous
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }
}
