use time::{Duration, OffsetDateTime};

use crate::model::agg::ResolvedFile;

/// Lifecycle position of the peak detector.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DetectorState {
    /// No zero sample seen yet.
    AwaitingBaseline,
    /// Baseline established, rate below threshold.
    Idle { baseline: OffsetDateTime },
    /// Rate crossed the threshold and has not returned to zero.
    InPeak {
        baseline: OffsetDateTime,
        peak_start: OffsetDateTime,
    },
}

impl DetectorState {
    pub fn label(self) -> &'static str {
        match self {
            DetectorState::AwaitingBaseline => "awaiting-baseline",
            DetectorState::Idle { .. } => "idle",
            DetectorState::InPeak { .. } => "in-peak",
        }
    }

    pub fn in_peak(self) -> bool {
        matches!(self, DetectorState::InPeak { .. })
    }
}

/// Timing of a single peak.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PeakWindow {
    pub baseline: OffsetDateTime,
    pub start: OffsetDateTime,
    pub end: Option<OffsetDateTime>,
}

impl PeakWindow {
    pub fn time_to_peak(&self) -> Duration {
        self.start - self.baseline
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }
}

/// Transition emitted by the detector.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PeakEvent {
    Baseline { at: OffsetDateTime },
    Started(PeakWindow),
    Ended(PeakWindow),
}

/// Why a peak window was closed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CloseReason {
    /// Rate returned to zero.
    ReturnedToZero,
    /// Device stream ended mid-peak.
    InputClosed,
    /// Operator interrupt mid-peak.
    Interrupted,
}

impl CloseReason {
    pub fn label(self) -> &'static str {
        match self {
            CloseReason::ReturnedToZero => "returned to zero",
            CloseReason::InputClosed => "input closed",
            CloseReason::Interrupted => "interrupted",
        }
    }
}

/// Everything reported when a peak closes.
#[derive(Debug, Clone)]
pub struct PeakReport {
    pub window: PeakWindow,
    pub reason: CloseReason,
    pub files: Vec<ResolvedFile>,
    /// Files seen in the window, ranked or not.
    pub files_seen: usize,
    /// Whether the sampler was alive when the window closed.
    pub sampler_alive: bool,
}
