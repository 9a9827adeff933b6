//! Peak-gated pipeline: device lines in, lifecycle events and peak reports out.

use std::sync::mpsc::Receiver;

use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

use crate::{
    agg::{correlate::Correlator, detector::PeakDetector},
    model::peak::{CloseReason, PeakEvent, PeakReport, PeakWindow},
    resolve::PathResolver,
    trace::{SamplerLauncher, device::DeviceInput, parse::DeviceLineParser},
};

/// Source of sample timestamps.
pub trait Clock {
    fn now(&mut self) -> OffsetDateTime;
}

/// Wall clock in the local zone.
///
/// The offset is captured once: it cannot be queried reliably after other
/// threads exist.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: UtcOffset,
}

impl LocalClock {
    pub fn detect() -> Self {
        let offset = UtcOffset::current_local_offset().unwrap_or_else(|e| {
            debug!(error = %e, "local offset unavailable, using UTC");
            UtcOffset::UTC
        });
        Self { offset }
    }
}

impl Clock for LocalClock {
    fn now(&mut self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// What the reporting side gets to see.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Baseline { at: OffsetDateTime },
    PeakStarted(PeakWindow),
    PeakEnded(PeakReport),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Exit {
    InputClosed,
    Interrupted,
}

pub struct Monitor<L: SamplerLauncher, R: PathResolver> {
    parser: DeviceLineParser,
    detector: PeakDetector,
    correlator: Correlator<L>,
    resolver: R,
}

impl<L: SamplerLauncher, R: PathResolver> Monitor<L, R> {
    pub fn new(
        parser: DeviceLineParser,
        detector: PeakDetector,
        correlator: Correlator<L>,
        resolver: R,
    ) -> Self {
        Self {
            parser,
            detector,
            correlator,
            resolver,
        }
    }

    #[cfg(test)]
    pub fn detector(&self) -> &PeakDetector {
        &self.detector
    }

    #[cfg(test)]
    pub fn correlator(&self) -> &Correlator<L> {
        &self.correlator
    }

    /// Handle one line of the device stream.
    ///
    /// Lines for other devices still count as a polling cycle for the
    /// per-file sampler while a peak is open.
    pub fn on_line(&mut self, line: &str, now: OffsetDateTime) -> Option<MonitorEvent> {
        let event = self
            .parser
            .parse(line, now)
            .and_then(|sample| self.detector.observe(&sample))
            .map(|event| self.apply(event));

        if self.detector.state().in_peak() {
            self.correlator.poll();
        }
        event
    }

    fn apply(&mut self, event: PeakEvent) -> MonitorEvent {
        match event {
            PeakEvent::Baseline { at } => {
                info!(device = self.parser.device(), "baseline established");
                MonitorEvent::Baseline { at }
            }
            PeakEvent::Started(window) => {
                info!(
                    device = self.parser.device(),
                    threshold = self.detector.threshold(),
                    "peak started"
                );
                self.correlator.on_peak_start();
                MonitorEvent::PeakStarted(window)
            }
            PeakEvent::Ended(window) => {
                let report =
                    self.correlator
                        .on_peak_end(window, CloseReason::ReturnedToZero, &self.resolver);
                info!(files = report.files_seen, "peak ended");
                MonitorEvent::PeakEnded(report)
            }
        }
    }

    /// Stop for good. Flushes a partial report if a peak was open and
    /// always stops the sampler.
    pub fn shutdown(&mut self, now: OffsetDateTime, reason: CloseReason) -> Option<MonitorEvent> {
        let report = self
            .detector
            .abandon(now)
            .map(|window| self.correlator.on_peak_end(window, reason, &self.resolver));
        self.correlator.retire(reason.label());
        report.map(MonitorEvent::PeakEnded)
    }

    /// Drive the monitor from `inputs` until end-of-input or interrupt.
    pub fn run<C, F>(&mut self, inputs: &Receiver<DeviceInput>, clock: &mut C, mut emit: F) -> Exit
    where
        C: Clock,
        F: FnMut(&MonitorEvent),
    {
        let (exit, reason) = loop {
            match inputs.recv() {
                Ok(DeviceInput::Line(line)) => {
                    if let Some(event) = self.on_line(&line, clock.now()) {
                        emit(&event);
                    }
                }
                Ok(DeviceInput::Interrupted) => break (Exit::Interrupted, CloseReason::Interrupted),
                // every sender gone counts as end-of-input too
                Ok(DeviceInput::Closed) | Err(_) => break (Exit::InputClosed, CloseReason::InputClosed),
            }
        };

        if let Some(event) = self.shutdown(clock.now(), reason) {
            emit(&event);
        }
        exit
    }
}
