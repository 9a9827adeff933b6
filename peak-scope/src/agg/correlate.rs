use tracing::{info, warn};

use crate::{
    agg::{Aggregator, Drain, drain_into, table::AggregationTable},
    model::{
        agg::{RankKey, ResolvedFile},
        peak::{CloseReason, PeakReport, PeakWindow},
    },
    resolve::PathResolver,
    trace::{SampleSource, SamplerLauncher, parse::SampleFilter},
};

/// Files listed per peak report.
pub const REPORT_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    pub filter: SampleFilter,
    /// Lines consumed per poll at most.
    pub drain_limit: usize,
    pub rank: RankKey,
}

/// Runs a per-file sampler for exactly the duration of each peak and turns
/// what it saw into a ranked report.
pub struct Correlator<L: SamplerLauncher> {
    launcher: L,
    active: Option<L::Source>,
    table: AggregationTable,
    cfg: CorrelatorConfig,
}

impl<L: SamplerLauncher> Correlator<L> {
    pub fn new(launcher: L, cfg: CorrelatorConfig) -> Self {
        Self {
            launcher,
            active: None,
            table: AggregationTable::new(),
            cfg,
        }
    }

    #[cfg(test)]
    pub fn table(&self) -> &AggregationTable {
        &self.table
    }

    #[cfg(test)]
    pub fn sampler_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn on_peak_start(&mut self) {
        // never two samplers at once
        self.retire("new peak started");
        self.table.on_start();

        match self.launcher.launch() {
            Ok(source) => {
                info!(pid = source.pid(), "per-file sampler started");
                self.active = Some(source);
            }
            Err(e) => warn!(error = %e, "per-file sampler failed to start, peak will have no file data"),
        }
    }

    /// Consume whatever the sampler has ready, up to the drain limit.
    pub fn poll(&mut self) -> Drain {
        let Some(source) = self.active.as_mut() else {
            return Drain::default();
        };

        let drain = drain_into(source, &self.cfg.filter, self.cfg.drain_limit, &mut self.table);
        if drain.closed {
            warn!(
                files = self.table.len(),
                "per-file sampler exited mid-peak, keeping partial totals"
            );
            self.retire("sampler output closed");
        }
        drain
    }

    pub fn on_peak_end<R: PathResolver>(
        &mut self,
        window: PeakWindow,
        reason: CloseReason,
        resolver: &R,
    ) -> PeakReport {
        let sampler_alive = self.active.is_some();
        self.retire(reason.label());
        self.table.on_end();
        if self.table.is_empty() {
            info!("no file samples matched during the peak");
        }

        let files = self
            .table
            .top_n(REPORT_SIZE, self.cfg.rank)
            .into_iter()
            .map(|ranked| ResolvedFile {
                paths: resolver.resolve(&ranked.filename),
                filename: ranked.filename,
                stats: ranked.stats,
            })
            .collect();

        PeakReport {
            window,
            reason,
            files,
            files_seen: self.table.len(),
            sampler_alive,
        }
    }

    /// Stop the sampler if one is running. Every exit path ends up here;
    /// dropping the source also discards anything it still had buffered.
    pub fn retire(&mut self, why: &str) {
        let Some(mut source) = self.active.take() else {
            return;
        };
        let pid = source.pid();
        match source.terminate() {
            Ok(()) => info!(pid, why, "per-file sampler stopped"),
            Err(e) => warn!(pid, why, error = %e, "per-file sampler did not stop cleanly"),
        }
    }
}

impl<L: SamplerLauncher> Drop for Correlator<L> {
    fn drop(&mut self) {
        self.retire("shutting down");
    }
}
