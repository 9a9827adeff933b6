use crate::{
    agg::{Aggregator, table::AggregationTable},
    model::{
        agg::{LiveState, RankKey, ResolvedFile},
        sample::FileIoSample,
    },
    resolve::PathResolver,
};

/// Continuous ranking for the live view. Totals run from `on_start` until the
/// operator quits; peaks play no part.
pub struct LiveAggregator<R> {
    table: AggregationTable,
    resolver: R,
    rank: RankKey,
    top: usize,
    state: LiveState,
    dirty: bool,
}

impl<R: PathResolver> LiveAggregator<R> {
    pub fn new(resolver: R, rank: RankKey, top: usize) -> Self {
        Self {
            table: AggregationTable::new(),
            resolver,
            rank,
            top,
            state: LiveState {
                rank,
                ..LiveState::default()
            },
            dirty: false,
        }
    }

    pub fn state(&self) -> &LiveState {
        &self.state
    }

    pub fn mark_sampler_closed(&mut self) {
        self.state.sampler_closed = true;
        self.dirty = true;
    }

    /// Rebuild the ranked rows if anything arrived since the last call.
    /// Returns whether the view changed.
    pub fn refresh(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;

        self.state.rows = self
            .table
            .top_n(self.top, self.rank)
            .into_iter()
            .map(|ranked| ResolvedFile {
                paths: self.resolver.resolve(&ranked.filename),
                filename: ranked.filename,
                stats: ranked.stats,
            })
            .collect();
        self.state.files_seen = self.table.len();
        true
    }
}

impl<R: PathResolver> Aggregator for LiveAggregator<R> {
    fn on_start(&mut self) {
        self.table.on_start();
        self.state = LiveState {
            rank: self.rank,
            ..LiveState::default()
        };
        self.dirty = true;
    }

    fn on_sample(&mut self, sample: &FileIoSample) {
        self.table.on_sample(sample);
        self.state.samples += 1;
        self.dirty = true;
    }
}
