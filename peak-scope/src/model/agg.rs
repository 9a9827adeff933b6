use std::{collections::BTreeSet, ops::Add};

use clap::ValueEnum;

use crate::model::sample::FileIoSample;

/// Kilobytes held in hundredths, so sums are exact and independent of the
/// order samples arrive in.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Kb(u64);

impl Kb {
    pub const ZERO: Kb = Kb(0);

    /// Rounds to the nearest hundredth; negative and non-finite input is zero.
    pub fn from_f64(kb: f64) -> Self {
        if kb.is_finite() && kb > 0.0 {
            Kb((kb * 100.0).round() as u64)
        } else {
            Kb::ZERO
        }
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Add for Kb {
    type Output = Kb;

    fn add(self, rhs: Kb) -> Kb {
        Kb(self.0.saturating_add(rhs.0))
    }
}

/// Cumulative counters for one filename over the current window.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FileAggregate {
    pub reads: u64,
    pub writes: u64,
    pub read_kb: Kb,
    pub write_kb: Kb,
    pub processes: BTreeSet<String>,
}

impl FileAggregate {
    pub fn add(&mut self, sample: &FileIoSample) {
        self.reads = self.reads.saturating_add(sample.reads);
        self.writes = self.writes.saturating_add(sample.writes);
        self.read_kb = self.read_kb + Kb::from_f64(sample.read_kb);
        self.write_kb = self.write_kb + Kb::from_f64(sample.write_kb);
        self.processes.insert(sample.process.clone());
    }

    pub fn total_kb(&self) -> Kb {
        self.read_kb + self.write_kb
    }
}

/// Ranking policy for top-N snapshots.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum)]
pub enum RankKey {
    /// read KB + write KB
    #[default]
    Combined,
    /// read KB only
    Read,
}

impl RankKey {
    pub fn score(self, agg: &FileAggregate) -> Kb {
        match self {
            RankKey::Combined => agg.total_kb(),
            RankKey::Read => agg.read_kb,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RankKey::Combined => "read+write KB",
            RankKey::Read => "read KB",
        }
    }
}

/// One row of a ranked snapshot.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RankedFile {
    pub filename: String,
    pub stats: FileAggregate,
}

/// A ranked row together with where the file lives on disk.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResolvedFile {
    pub filename: String,
    pub paths: Vec<std::path::PathBuf>,
    pub stats: FileAggregate,
}

/// What the live view draws. Rebuilt by the live aggregator after every
/// accepted sample.
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub rows: Vec<ResolvedFile>,
    pub files_seen: usize,
    pub samples: u64,
    pub rank: RankKey,
    /// Set once the sampler stops producing output.
    pub sampler_closed: bool,
}
