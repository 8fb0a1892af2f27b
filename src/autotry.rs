//! "Try all": steps through every item of a category, capturing a look for each.
//!
//! Polled once per frame; never sleeps. Each delay is measured from the
//! moment the previous event was emitted.

use std::time::{Duration, Instant};

use image::RgbImage;
use tracing::info;

use crate::config::CaptureConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoTryEvent {
    /// Wear item `n` of the category.
    Select(usize),
    /// Take a snapshot of item `n` and hand it to `record`.
    Capture(usize),
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Select,
    Capture,
    Done,
    Stopped,
}

pub struct AutoTry {
    len: usize,
    settle: Duration,
    step: Duration,
    index: usize,
    phase: Phase,
    due: Instant,
    captures: Vec<RgbImage>,
}

impl AutoTry {
    /// `None` for an empty category.
    pub fn start(len: usize, settle: Duration, step: Duration, now: Instant) -> Option<Self> {
        if len == 0 {
            return None;
        }
        info!("Try-all started over {} items", len);
        Some(Self {
            len,
            settle,
            step,
            index: 0,
            phase: Phase::Select,
            due: now,
            captures: Vec::with_capacity(len),
        })
    }

    pub fn from_config(len: usize, config: &CaptureConfig, now: Instant) -> Option<Self> {
        Self::start(
            len,
            Duration::from_millis(config.settle_ms),
            Duration::from_millis(config.step_ms),
            now,
        )
    }

    pub fn tick(&mut self, now: Instant) -> Option<AutoTryEvent> {
        match self.phase {
            Phase::Stopped => None,
            Phase::Done => {
                self.phase = Phase::Stopped;
                info!("Try-all finished with {} looks", self.captures.len());
                Some(AutoTryEvent::Finished)
            }
            _ if now < self.due => None,
            Phase::Select => {
                self.phase = Phase::Capture;
                self.due = now + self.settle;
                Some(AutoTryEvent::Select(self.index))
            }
            Phase::Capture => {
                let captured = self.index;
                self.index += 1;
                if self.index >= self.len {
                    self.phase = Phase::Done;
                } else {
                    self.phase = Phase::Select;
                    self.due = now + self.step;
                }
                Some(AutoTryEvent::Capture(captured))
            }
        }
    }

    /// Stores the snapshot for the last `Capture`. `None` (no face) is skipped.
    pub fn record(&mut self, snapshot: Option<RgbImage>) {
        if let Some(image) = snapshot {
            self.captures.push(image);
        }
    }

    /// Ends the run; captures so far are kept.
    pub fn stop(&mut self) {
        if self.phase != Phase::Stopped {
            info!("Try-all stopped after {} looks", self.captures.len());
        }
        self.phase = Phase::Stopped;
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Stopped
    }

    pub fn captures(&self) -> &[RgbImage] {
        &self.captures
    }

    pub fn into_captures(self) -> Vec<RgbImage> {
        self.captures
    }
}
