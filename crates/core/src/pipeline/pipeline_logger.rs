use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for pipeline orchestration events.
///
/// Decouples use cases from specific output mechanisms (log crate, debug
/// overlays) so each caller can observe pipeline behavior without changing
/// the orchestration code.
pub trait PipelineLogger: Send {
    /// Record how long a named pipeline stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Multi-line debug summary. Default: empty.
    fn stats(&self) -> String {
        String::new()
    }
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

enum LogEvent {
    Timing(String, f64),
    Metric(String, f64),
    Info(String),
}

/// Holds one job's events so a worker can forward them to a shared
/// logger after the job, without holding the shared lock during it.
#[derive(Default)]
pub struct BufferedPipelineLogger {
    events: Vec<LogEvent>,
}

impl BufferedPipelineLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Forwards every event to `target` in recording order.
    pub fn replay_into(self, target: &mut dyn PipelineLogger) {
        for event in self.events {
            match event {
                LogEvent::Timing(stage, ms) => target.timing(&stage, ms),
                LogEvent::Metric(name, value) => target.metric(&name, value),
                LogEvent::Info(message) => target.info(&message),
            }
        }
    }
}

impl PipelineLogger for BufferedPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.events.push(LogEvent::Timing(stage.to_string(), duration_ms));
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.events.push(LogEvent::Metric(name.to_string(), value));
    }

    fn info(&mut self, message: &str) {
        self.events.push(LogEvent::Info(message.to_string()));
    }
}

/// Running totals for one stage or metric.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunningStat {
    pub count: u64,
    pub total: f64,
    pub last: f64,
}

impl RunningStat {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.last = value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates per-stage timings and metrics for the debug stats string.
///
/// Keeps running totals rather than samples, since a camera pipeline never
/// ends.
pub struct StatsPipelineLogger {
    timings: HashMap<String, RunningStat>,
    metrics: HashMap<String, RunningStat>,
    start_time: Instant,
    last_message: Option<String>,
}

impl StatsPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            last_message: None,
        }
    }

    pub fn timings_for(&self, stage: &str) -> Option<RunningStat> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<RunningStat> {
        self.metrics.get(name).copied()
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }
}

impl Default for StatsPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for StatsPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
        self.last_message = Some(message.to_string());
    }

    fn stats(&self) -> String {
        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!("Uptime: {elapsed_s:.1}s")];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stat) in stages {
            lines.push(format!(
                "{stage}: last {:.1}ms avg {:.1}ms ({}x)",
                stat.last,
                stat.mean(),
                stat.count
            ));
        }

        let mut metrics: Vec<_> = self.metrics.iter().collect();
        metrics.sort_by(|a, b| a.0.cmp(b.0));
        for (name, stat) in metrics {
            lines.push(format!("{name}: last {:.1} avg {:.1}", stat.last, stat.mean()));
        }

        lines.join("\n")
    }
}
