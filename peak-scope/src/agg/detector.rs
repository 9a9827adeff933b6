//! Peak lifecycle over one device's read rate.
//!
//! A peak opens when the rate reaches the threshold after a zero baseline and
//! closes only when the rate is exactly zero again. A rate that settles
//! between zero and the threshold keeps the peak open.

use time::OffsetDateTime;
use tracing::debug;

use crate::model::{
    peak::{DetectorState, PeakEvent, PeakWindow},
    sample::DeviceSample,
};

#[derive(Debug, Clone)]
pub struct PeakDetector {
    threshold: f64,
    state: DetectorState,
}

impl PeakDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            state: DetectorState::AwaitingBaseline,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn observe(&mut self, sample: &DeviceSample) -> Option<PeakEvent> {
        let rate = sample.read_rate;
        let now = sample.ts;

        let (next, event) = match self.state {
            DetectorState::AwaitingBaseline if rate == 0.0 => (
                DetectorState::Idle { baseline: now },
                Some(PeakEvent::Baseline { at: now }),
            ),
            DetectorState::AwaitingBaseline => (self.state, None),

            DetectorState::Idle { baseline } if rate >= self.threshold => (
                DetectorState::InPeak {
                    baseline,
                    peak_start: now,
                },
                Some(PeakEvent::Started(PeakWindow {
                    baseline,
                    start: now,
                    end: None,
                })),
            ),
            DetectorState::Idle { .. } => (self.state, None),

            DetectorState::InPeak {
                baseline,
                peak_start,
            } if rate == 0.0 => (
                DetectorState::Idle { baseline: now },
                Some(PeakEvent::Ended(PeakWindow {
                    baseline,
                    start: peak_start,
                    end: Some(now),
                })),
            ),
            DetectorState::InPeak { .. } => (self.state, None),
        };

        if next != self.state {
            debug!(
                device = %sample.device,
                from = self.state.label(),
                to = next.label(),
                rate,
                "detector transition"
            );
        }
        self.state = next;
        event
    }

    /// Close a peak that will never see its zero (input ended, operator
    /// interrupt). Returns the window if one was open.
    pub fn abandon(&mut self, at: OffsetDateTime) -> Option<PeakWindow> {
        let DetectorState::InPeak {
            baseline,
            peak_start,
        } = self.state
        else {
            return None;
        };
        self.state = DetectorState::AwaitingBaseline;
        Some(PeakWindow {
            baseline,
            start: peak_start,
            end: Some(at),
        })
    }
}
