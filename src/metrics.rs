//! In-memory metrics accumulator
//!
//! Counters are updated by both pumps during operation and read once by
//! the gateway at shutdown. Updates only need per-counter atomicity, so a
//! single mutex around the counter block is sufficient; the critical
//! sections are a few map operations long.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::parser::ParsedMessage;
use crate::scanner::Direction;

/// The raw counter block.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Every message seen by either pump
    pub messages_processed: u64,
    /// Messages keyed by `client->server` / `server->client`
    pub messages_by_direction: HashMap<String, u64>,
    /// Messages keyed by request/response/error/notification
    pub messages_by_type: HashMap<String, u64>,
    /// `tools/call` requests keyed by tool name
    pub tool_calls: HashMap<String, u64>,
    /// Violations keyed by rule name
    pub violations: HashMap<String, u64>,
    /// Messages withheld by a Block rule
    pub blocked_messages: u64,
    /// Sum of per-line processing latency
    pub total_latency_ms: f64,
}

/// Shared, config-gated metrics collector.
pub struct MetricsCollector {
    config: Arc<Config>,
    inner: Mutex<Metrics>,
}

impl MetricsCollector {
    /// Create a collector with zeroed counters.
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            inner: Mutex::new(Metrics::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Metrics> {
        // A poisoned lock only means a panicking thread died mid-update;
        // the counters themselves are still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one processed message by direction, type, and tool.
    pub fn record_message(&self, message: &ParsedMessage, direction: Direction) {
        if !self.config.metrics.collect_message_counts {
            return;
        }

        let mut metrics = self.lock();
        metrics.messages_processed += 1;
        *metrics
            .messages_by_direction
            .entry(direction.as_str().to_string())
            .or_insert(0) += 1;
        *metrics
            .messages_by_type
            .entry(message.message_type.as_str().to_string())
            .or_insert(0) += 1;

        if let Some(tool) = message.tool_name() {
            *metrics.tool_calls.entry(tool.to_string()).or_insert(0) += 1;
        }
    }

    /// Count one violation; `blocked` additionally bumps the blocked
    /// message counter.
    pub fn record_violation(&self, rule_name: &str, blocked: bool) {
        if !self.config.metrics.collect_violation_counts {
            return;
        }

        let mut metrics = self.lock();
        *metrics.violations.entry(rule_name.to_string()).or_insert(0) += 1;
        if blocked {
            metrics.blocked_messages += 1;
        }
    }

    /// Accumulate one line's processing latency.
    pub fn record_latency(&self, latency_ms: f64) {
        if !self.config.metrics.collect_latency {
            return;
        }
        self.lock().total_latency_ms += latency_ms;
    }

    /// A point-in-time copy of all counters.
    pub fn snapshot(&self) -> Metrics {
        self.lock().clone()
    }

    /// Render the human-readable shutdown summary: totals, average
    /// latency, top 5 tools descending, and violations by rule.
    pub fn summary(&self) -> String {
        let metrics = self.snapshot();
        let total = metrics.messages_processed;
        let avg_latency = if total > 0 {
            metrics.total_latency_ms / total as f64
        } else {
            0.0
        };

        let mut lines = vec![
            format!("Total messages: {}", total),
            format!("Blocked: {}", metrics.blocked_messages),
            format!("Average latency: {:.2}ms", avg_latency),
        ];

        if !metrics.tool_calls.is_empty() {
            lines.push("\nTop tool calls:".to_string());
            let mut tools: Vec<(&String, &u64)> = metrics.tool_calls.iter().collect();
            tools.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (tool, count) in tools.into_iter().take(5) {
                lines.push(format!("  {}: {}", tool, count));
            }
        }

        if !metrics.violations.is_empty() {
            lines.push("\nViolations by rule:".to_string());
            let mut rules: Vec<(&String, &u64)> = metrics.violations.iter().collect();
            rules.sort_by(|a, b| a.0.cmp(b.0));
            for (rule, count) in rules {
                lines.push(format!("  {}: {}", rule, count));
            }
        }

        lines.join("\n")
    }
}
