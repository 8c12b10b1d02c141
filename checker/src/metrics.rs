//! # Prometheus Metrics
//!
//! Counts checks and their outcomes. Scraped by Prometheus at the `/metrics`
//! HTTP endpoint on the metrics listener.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use knots_filter::policy::Verdict;

/// Holds all Prometheus metric handles for the checker.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct CheckerMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Transactions evaluated to a verdict.
    pub checks_total: IntCounter,
    pub accepted_total: IntCounter,
    pub rejected_total: IntCounter,
    /// Requests that ended in an error instead of a verdict, by error kind.
    pub errors_total: IntCounterVec,
    /// Failed rules, by rule name.
    pub rule_failures_total: IntCounterVec,
    /// Overlay signals raised, by kind, permitted or not.
    pub overlay_signals_total: IntCounterVec,
    /// Decode plus evaluation time in seconds.
    pub check_duration_seconds: Histogram,
}

impl CheckerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("knots".into()), None)?;

        let checks_total = IntCounter::new("checks_total", "Transactions evaluated to a verdict")?;
        registry.register(Box::new(checks_total.clone()))?;

        let accepted_total =
            IntCounter::new("accepted_total", "Transactions accepted by every rule")?;
        registry.register(Box::new(accepted_total.clone()))?;

        let rejected_total =
            IntCounter::new("rejected_total", "Transactions rejected by at least one rule")?;
        registry.register(Box::new(rejected_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Checks that ended in an error, by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let rule_failures_total = IntCounterVec::new(
            Opts::new("rule_failures_total", "Rule failures, by rule"),
            &["rule"],
        )?;
        registry.register(Box::new(rule_failures_total.clone()))?;

        let overlay_signals_total = IntCounterVec::new(
            Opts::new("overlay_signals_total", "Overlay signals raised, by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(overlay_signals_total.clone()))?;

        let check_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "check_duration_seconds",
                "Decode and evaluation latency in seconds",
            )
            .buckets(vec![
                0.000_01, 0.000_05, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
        )?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            checks_total,
            accepted_total,
            rejected_total,
            errors_total,
            rule_failures_total,
            overlay_signals_total,
            check_duration_seconds,
        })
    }

    /// Records one verdict.
    pub fn observe_verdict(&self, verdict: &Verdict) {
        self.checks_total.inc();
        if verdict.accepted {
            self.accepted_total.inc();
        } else {
            self.rejected_total.inc();
        }
        for record in verdict.failures() {
            self.rule_failures_total
                .with_label_values(&[record.rule.as_str()])
                .inc();
        }
        for signal in &verdict.overlay_signals {
            self.overlay_signals_total
                .with_label_values(&[signal.kind().as_str()])
                .inc();
        }
    }

    pub fn observe_error(&self, kind: &str) {
        self.errors_total.with_label_values(&[kind]).inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<CheckerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
