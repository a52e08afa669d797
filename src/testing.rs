//! Test doubles for the platform window and the OS counters

use std::cell::Cell;
use std::collections::VecDeque;

use crate::counters::{CounterReading, CounterSource};
use crate::error::CounterError;
use crate::platform::{OverlayConfig, OverlayPlatform, PlatformError};

pub fn reading(sent_bytes: u64, recv_bytes: u64) -> CounterReading {
    CounterReading {
        sent_bytes,
        recv_bytes,
    }
}

/// In-memory window that records what the overlay asks of it
pub struct HeadlessOverlay {
    config: OverlayConfig,
    frames: Vec<Vec<u8>>,
    raises: Cell<u64>,
    failing_raises: Cell<u64>,
    redraw_requested: Cell<bool>,
    polls: Cell<u64>,
    close_after_polls: Cell<Option<u64>>,
}

impl HeadlessOverlay {
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn commits(&self) -> usize {
        self.frames.len()
    }

    pub fn last_frame(&self) -> &[u8] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Raise attempts, including failed ones
    pub fn raises(&self) -> u64 {
        self.raises.get()
    }

    /// Make the next `count` raise attempts fail
    pub fn fail_next_raises(&self, count: u64) {
        self.failing_raises.set(count);
    }

    pub fn request_redraw(&self) {
        self.redraw_requested.set(true);
    }

    /// Report the window as closed on the `polls`-th event poll
    pub fn close_after_polls(&self, polls: u64) {
        self.close_after_polls.set(Some(polls));
    }
}

impl OverlayPlatform for HeadlessOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        Ok(Self {
            config,
            frames: Vec::new(),
            raises: Cell::new(0),
            failing_raises: Cell::new(0),
            redraw_requested: Cell::new(false),
            polls: Cell::new(0),
            close_after_polls: Cell::new(None),
        })
    }

    fn width(&self) -> u32 {
        self.config.width
    }

    fn height(&self) -> u32 {
        self.config.height
    }

    fn x(&self) -> i32 {
        self.config.x
    }

    fn y(&self) -> i32 {
        self.config.y
    }

    fn commit(&mut self, rgba: &[u8]) {
        self.frames.push(rgba.to_vec());
    }

    fn raise_topmost(&self) -> Result<(), PlatformError> {
        self.raises.set(self.raises.get() + 1);
        let failing = self.failing_raises.get();
        if failing > 0 {
            self.failing_raises.set(failing - 1);
            return Err(PlatformError::Other("stacking request rejected".into()));
        }
        Ok(())
    }

    fn poll_events(&mut self) -> bool {
        let polls = self.polls.get() + 1;
        self.polls.set(polls);
        self.close_after_polls.get().is_none_or(|limit| polls < limit)
    }

    fn take_redraw_requested(&mut self) -> bool {
        self.redraw_requested.replace(false)
    }
}

/// Replays a fixed script of readings and failures, then reports unavailable
pub struct ScriptedCounters {
    script: VecDeque<Result<CounterReading, CounterError>>,
}

impl ScriptedCounters {
    pub fn new(script: impl IntoIterator<Item = Result<CounterReading, CounterError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl CounterSource for ScriptedCounters {
    fn read(&mut self) -> Result<CounterReading, CounterError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(CounterError::Unavailable("script exhausted".into())))
    }
}

/// Counters that grow by a fixed step on every read
pub struct SteadyCounters {
    current: CounterReading,
    step: CounterReading,
}

impl SteadyCounters {
    pub fn new(sent_step: u64, recv_step: u64) -> Self {
        Self {
            current: CounterReading::default(),
            step: reading(sent_step, recv_step),
        }
    }
}

impl CounterSource for SteadyCounters {
    fn read(&mut self) -> Result<CounterReading, CounterError> {
        self.current.sent_bytes += self.step.sent_bytes;
        self.current.recv_bytes += self.step.recv_bytes;
        Ok(self.current)
    }
}
