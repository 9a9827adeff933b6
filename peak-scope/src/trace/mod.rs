pub mod device;
#[cfg(test)]
pub mod fake;
pub mod parse;
pub mod sampler;

use crate::trace::sampler::SamplerError;

/// Result of a non-blocking read from a running sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStatus {
    Line(String),
    /// Nothing buffered right now.
    Pending,
    /// The sampler's output is gone for good.
    Closed,
}

/// A running per-file sampler.
pub trait SampleSource {
    /// Never blocks.
    fn try_next_line(&mut self) -> LineStatus;

    /// Stop the sampler. Idempotent.
    fn terminate(&mut self) -> Result<(), SamplerError>;

    fn pid(&self) -> Option<u32> {
        None
    }
}

/// Starts per-file samplers on demand.
pub trait SamplerLauncher {
    type Source: SampleSource;

    fn launch(&mut self) -> Result<Self::Source, SamplerError>;
}
