use tracing::{debug, trace};

use crate::{
    model::sample::FileIoSample,
    trace::{
        LineStatus, SampleSource,
        parse::{SampleFilter, parse_file_sample},
    },
};

pub mod correlate;
pub mod detector;
pub mod live;
pub mod table;

/// Consumer of parsed per-file samples.
pub trait Aggregator {
    /// Start of an observation window; discards previous totals.
    fn on_start(&mut self);
    fn on_sample(&mut self, sample: &FileIoSample);
    fn on_end(&mut self) {}
}

/// What one bounded drain of a sampler produced.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Drain {
    pub accepted: usize,
    pub dropped: usize,
    /// The source reported end of output.
    pub closed: bool,
}

impl Drain {
    pub fn lines(&self) -> usize {
        self.accepted + self.dropped
    }
}

/// Pull at most `limit` ready lines from `source` into `agg` without
/// blocking. Stops early when nothing is buffered.
pub fn drain_into<S, A>(source: &mut S, filter: &SampleFilter, limit: usize, agg: &mut A) -> Drain
where
    S: SampleSource + ?Sized,
    A: Aggregator + ?Sized,
{
    let mut out = Drain::default();
    while out.lines() < limit {
        match source.try_next_line() {
            LineStatus::Line(line) => match parse_file_sample(&line, filter) {
                Some(sample) => {
                    trace!(
                        id = %sample.id,
                        process = %sample.process,
                        file = %sample.filename,
                        "file sample"
                    );
                    agg.on_sample(&sample);
                    out.accepted += 1;
                }
                None => {
                    debug!(line = %line, "dropped sampler line");
                    out.dropped += 1;
                }
            },
            LineStatus::Pending => break,
            LineStatus::Closed => {
                out.closed = true;
                break;
            }
        }
    }
    out
}
