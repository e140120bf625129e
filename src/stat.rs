use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub expanded_nodes: usize,
    pub generated_nodes: usize,
    pub pruned_by_segments: usize,
    pub max_open_size: usize,
    pub time_us: u128,
}

impl Stats {
    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.time_us = elapsed.as_micros();
    }

    pub(crate) fn print(&self) {
        info!(
            "Time(microseconds) {:?} Expanded nodes: {:?} Generated nodes: {:?} Pruned by segment budget: {:?} Max open size: {:?}",
            self.time_us,
            self.expanded_nodes,
            self.generated_nodes,
            self.pruned_by_segments,
            self.max_open_size
        );
    }
}
