#![allow(dead_code)]

use postfix_exporter::metrics::{Metric, MetricSink};
use postfix_exporter::LogLineEngine;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// In-memory sink that records every write the engine makes.
#[derive(Default)]
pub struct RecordingSink {
    counters: Mutex<BTreeMap<(Metric, Vec<String>), u64>>,
    observations: Mutex<Vec<(Metric, Vec<String>, f64)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Value of one counter cell; `labels` empty for plain counters.
    pub fn counter(&self, metric: Metric, labels: &[&str]) -> u64 {
        let key = (metric, labels.iter().map(|l| l.to_string()).collect());
        self.counters.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    /// Sum over every cell of a counter.
    pub fn counter_total(&self, metric: Metric) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .filter(|((m, _), _)| *m == metric)
            .map(|(_, v)| *v)
            .sum()
    }

    /// Number of distinct label sets a counter has.
    pub fn cells(&self, metric: Metric) -> usize {
        self.counters
            .lock()
            .unwrap()
            .keys()
            .filter(|(m, _)| *m == metric)
            .count()
    }

    pub fn observations(&self, metric: Metric) -> Vec<(Vec<String>, f64)> {
        self.observations
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _, _)| *m == metric)
            .map(|(_, labels, value)| (labels.clone(), *value))
            .collect()
    }

    /// Every metric written at least once.
    pub fn touched(&self) -> Vec<Metric> {
        let mut touched: Vec<Metric> = self
            .counters
            .lock()
            .unwrap()
            .keys()
            .map(|(m, _)| *m)
            .chain(self.observations.lock().unwrap().iter().map(|(m, _, _)| *m))
            .collect();
        touched.sort();
        touched.dedup();
        touched
    }

    pub fn counter_snapshot(&self) -> BTreeMap<(Metric, Vec<String>), u64> {
        self.counters.lock().unwrap().clone()
    }

    fn bump(&self, metric: Metric, labels: &[String]) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry((metric, labels.to_vec()))
            .or_insert(0) += 1;
    }

    fn record(&self, metric: Metric, labels: &[String], value: f64) {
        self.observations
            .lock()
            .unwrap()
            .push((metric, labels.to_vec(), value));
    }
}

impl MetricSink for RecordingSink {
    fn increment(&self, metric: Metric) {
        self.bump(metric, &[]);
    }

    fn observe(&self, metric: Metric, value: f64) {
        self.record(metric, &[], value);
    }

    fn increment_labeled(&self, metric: Metric, labels: &[String]) {
        self.bump(metric, labels);
    }

    fn observe_labeled(&self, metric: Metric, labels: &[String], value: f64) {
        self.record(metric, labels, value);
    }
}

pub fn engine(sink: &Arc<RecordingSink>, log_unsupported_lines: bool) -> LogLineEngine {
    LogLineEngine::new(sink.clone(), log_unsupported_lines)
}

pub fn feed(engine: &LogLineEngine, lines: &[&str]) {
    for line in lines {
        engine.classify(line);
    }
}
