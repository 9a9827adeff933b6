use std::collections::HashMap;

use crate::{
    agg::Aggregator,
    model::{
        agg::{FileAggregate, RankKey, RankedFile},
        sample::FileIoSample,
    },
};

/// Per-filename totals for the current window, in first-seen order.
#[derive(Debug, Default)]
pub struct AggregationTable {
    entries: Vec<(String, FileAggregate)>,
    index: HashMap<String, usize>,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, sample: &FileIoSample) {
        let idx = match self.index.get(&sample.filename) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.entries
                    .push((sample.filename.clone(), FileAggregate::default()));
                self.index.insert(sample.filename.clone(), idx);
                idx
            }
        };
        self.entries[idx].1.add(sample);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, filename: &str) -> Option<&FileAggregate> {
        self.index.get(filename).map(|&idx| &self.entries[idx].1)
    }

    /// The `n` largest entries by `key`, descending. Equal scores keep
    /// first-seen order.
    pub fn top_n(&self, n: usize, key: RankKey) -> Vec<RankedFile> {
        let mut rows: Vec<&(String, FileAggregate)> = self.entries.iter().collect();
        // sort_by is stable
        rows.sort_by(|(_, a), (_, b)| key.score(b).cmp(&key.score(a)));

        rows.into_iter()
            .take(n)
            .map(|(filename, stats)| RankedFile {
                filename: filename.clone(),
                stats: stats.clone(),
            })
            .collect()
    }
}

impl Aggregator for AggregationTable {
    fn on_start(&mut self) {
        self.clear();
    }

    fn on_sample(&mut self, sample: &FileIoSample) {
        self.accumulate(sample);
    }
}
