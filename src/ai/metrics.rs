//! Run Metrics Collection
//!
//! Counters for model usage across one documentation run. Thread-safe so
//! every concurrent unit request can record into the same collector.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = MetricsCollector::new(run_id.to_string());
//! metrics.record_attempt(latency_ms);
//! metrics.record_usage(response.usage, prompt.estimated_tokens);
//! let summary = metrics.summary();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use super::provider::TokenUsage;

// =============================================================================
// Metrics Collector
// =============================================================================

/// Thread-safe metrics collector for a generation run.
///
/// Every counter is an atomic; recording never blocks.
pub struct MetricsCollector {
    run_id: String,
    start_time: Instant,
    /// Model calls issued, retries included
    attempts: AtomicU32,
    /// Attempts that were retries of an earlier failure
    retries: AtomicU32,
    /// Requests that ended with an accepted fragment
    succeeded: AtomicU32,
    /// Requests that ended in a recorded failure
    failed: AtomicU32,
    /// Units that never reached the model (unparsed)
    skipped: AtomicU32,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    /// Prompts reduced to fit the context budget
    truncated_prompts: AtomicU32,
    total_latency_ms: AtomicU64,
}

/// Snapshot of a run's counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSummary {
    pub run_id: String,
    pub total_duration_ms: u64,
    pub attempts: u32,
    pub retries: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub truncated_prompts: u32,
    pub avg_latency_ms: f64,
}

impl MetricsCollector {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            start_time: Instant::now(),
            attempts: AtomicU32::new(0),
            retries: AtomicU32::new(0),
            succeeded: AtomicU32::new(0),
            failed: AtomicU32::new(0),
            skipped: AtomicU32::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            truncated_prompts: AtomicU32::new(0),
            total_latency_ms: AtomicU64::new(0),
        }
    }

    /// Record one model call, successful or not
    pub fn record_attempt(&self, latency_ms: u64) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record the usage of a call that returned a completion.
    ///
    /// Services that report no input count are charged `estimated_prompt_tokens`.
    pub fn record_usage(&self, usage: TokenUsage, estimated_prompt_tokens: usize) {
        let input = match usage.input_tokens {
            0 => estimated_prompt_tokens as u64,
            reported => u64::from(reported),
        };
        self.prompt_tokens.fetch_add(input, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(u64::from(usage.output_tokens), Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_truncation(&self) {
        self.truncated_prompts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSummary {
        let attempts = self.attempts.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let avg_latency = if attempts > 0 {
            total_latency as f64 / attempts as f64
        } else {
            0.0
        };

        MetricsSummary {
            run_id: self.run_id.clone(),
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            attempts,
            retries: self.retries.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            truncated_prompts: self.truncated_prompts.load(Ordering::Relaxed),
            avg_latency_ms: avg_latency,
        }
    }

    /// Get final summary
    pub fn summary(&self) -> MetricsSummary {
        self.snapshot()
    }
}

impl MetricsSummary {
    /// Format summary for display
    pub fn display(&self) -> String {
        format!(
            "Run: {}\n\
             Duration: {:.1}s\n\
             Model Calls: {} ({} retries)\n\
             Units: {} documented, {} failed, {} skipped\n\
             Tokens: {} prompt, {} completion ({} truncated prompts)\n\
             Avg Latency: {:.0}ms",
            self.run_id,
            self.total_duration_ms as f64 / 1000.0,
            self.attempts,
            self.retries,
            self.succeeded,
            self.failed,
            self.skipped,
            self.prompt_tokens,
            self.completion_tokens,
            self.truncated_prompts,
            self.avg_latency_ms,
        )
    }
}

// =============================================================================
// Shared Type
// =============================================================================

/// Shared metrics collector for concurrent requests
pub type SharedMetrics = Arc<MetricsCollector>;

pub fn create_shared_metrics(run_id: impl Into<String>) -> SharedMetrics {
    Arc::new(MetricsCollector::new(run_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_attempts() {
        let metrics = MetricsCollector::new("run-1");
        metrics.record_attempt(400);
        metrics.record_attempt(200);
        metrics.record_usage(TokenUsage::from_openai(0, 15), 120);
        metrics.record_usage(TokenUsage::from_openai(80, 25), 999);
        metrics.record_retry();
        metrics.record_success();

        let summary = metrics.summary();
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.retries, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.prompt_tokens, 200);
        assert_eq!(summary.completion_tokens, 40);
        assert!((summary.avg_latency_ms - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_recording() {
        use std::thread;

        let metrics = Arc::new(MetricsCollector::new("concurrent"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_attempt(5);
                        m.record_usage(TokenUsage::from_ollama(10, 2), 0);
                        m.record_failure();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let summary = metrics.summary();
        assert_eq!(summary.attempts, 800);
        assert_eq!(summary.failed, 800);
        assert_eq!(summary.prompt_tokens, 8000);
        assert_eq!(summary.completion_tokens, 1600);
    }

    #[test]
    fn test_summary_display() {
        let metrics = MetricsCollector::new("display-run");
        metrics.record_skipped();
        metrics.record_truncation();

        let display = metrics.summary().display();
        assert!(display.contains("display-run"));
        assert!(display.contains("1 skipped"));
        assert!(display.contains("1 truncated"));
    }
}
