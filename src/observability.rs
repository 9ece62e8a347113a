use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, prelude::*};

#[cfg(feature = "otel")]
use opentelemetry::KeyValue;
#[cfg(feature = "otel")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otel")]
use opentelemetry_sdk::{resource::Resource, trace as sdktrace};

/// Installs the global subscriber. Logs go to stderr so stdout only carries
/// workflow results.
pub fn init_tracing(otlp_endpoint: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    #[cfg(feature = "otel")]
    {
        if let Some(endpoint) = otlp_endpoint {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(
                    vec![KeyValue::new("service.name", "serveflow")],
                )))
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .install_simple()?;

            return tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()
                .map_err(|err| anyhow!(err.to_string()));
        }
    }

    #[cfg(not(feature = "otel"))]
    if let Some(endpoint) = otlp_endpoint {
        eprintln!(
            "warning: --otlp-endpoint '{}' requested but OpenTelemetry support is not enabled. Rebuild with --features otel.",
            endpoint
        );
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))
}

pub fn shutdown_tracing() {
    #[cfg(feature = "otel")]
    opentelemetry::global::shutdown_tracer_provider();
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub steps: BTreeMap<String, StepMetrics>,
    pub total_duration_ms: f64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub step_failures: u64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct StepMetrics {
    pub calls: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
}

#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsCollector {
    /// Process-wide collector shared by every handle returned here.
    pub fn global() -> &'static MetricsCollector {
        static INSTANCE: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);
        &INSTANCE
    }

    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsSnapshot::default())),
        }
    }

    pub fn start_step(&self, step_name: &str) -> StepTimer {
        StepTimer {
            step: step_name.to_string(),
            started_at: Instant::now(),
            collector: self.inner.clone(),
            recorded: false,
        }
    }

    pub fn record_total_duration(&self, duration: Duration) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.total_duration_ms = duration.as_secs_f64() * 1_000.0;
        }
    }

    pub fn record_run(&self, succeeded: bool) {
        if let Ok(mut guard) = self.inner.lock() {
            if succeeded {
                guard.runs_succeeded += 1;
            } else {
                guard.runs_failed += 1;
            }
        }
    }

    pub fn record_step_failure(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.step_failures += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = MetricsSnapshot::default();
        }
    }
}

pub struct StepTimer {
    step: String,
    started_at: Instant,
    collector: Arc<Mutex<MetricsSnapshot>>,
    recorded: bool,
}

impl StepTimer {
    fn record(&mut self) {
        if self.recorded {
            return;
        }
        let duration_ms = self.started_at.elapsed().as_secs_f64() * 1_000.0;
        if let Ok(mut guard) = self.collector.lock() {
            let metrics = guard.steps.entry(self.step.clone()).or_default();
            metrics.calls += 1;
            metrics.total_duration_ms += duration_ms;
            if duration_ms > metrics.max_duration_ms {
                metrics.max_duration_ms = duration_ms;
            }
        }
        debug!(
            step = self.step.as_str(),
            duration_ms, "Step duration recorded"
        );
        self.recorded = true;
    }
}

impl Drop for StepTimer {
    fn drop(&mut self) {
        self.record();
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        total_duration_ms = snapshot.total_duration_ms,
        step_count = snapshot.steps.len(),
        runs_succeeded = snapshot.runs_succeeded,
        runs_failed = snapshot.runs_failed,
        "Workflow metrics summary"
    );
    for (step, metrics) in &snapshot.steps {
        info!(
            step = step.as_str(),
            calls = metrics.calls,
            total_ms = metrics.total_duration_ms,
            max_ms = metrics.max_duration_ms,
            "Step metrics"
        );
    }
}

struct MetricFamily {
    name: &'static str,
    kind: &'static str,
    help: &'static str,
    /// `(label, value)` pairs; an empty label renders a bare sample.
    samples: Vec<(String, String)>,
}

fn seconds(ms: f64) -> String {
    format!("{:.6}", ms / 1_000.0)
}

impl MetricsSnapshot {
    fn families(&self) -> Vec<MetricFamily> {
        let per_step = |value: fn(&StepMetrics) -> String| -> Vec<(String, String)> {
            self.steps
                .iter()
                .map(|(step, metrics)| (format!("step=\"{step}\""), value(metrics)))
                .collect()
        };
        vec![
            MetricFamily {
                name: "runs_total",
                kind: "counter",
                help: "Workflow runs by outcome",
                samples: vec![
                    ("outcome=\"success\"".into(), self.runs_succeeded.to_string()),
                    ("outcome=\"failure\"".into(), self.runs_failed.to_string()),
                ],
            },
            MetricFamily {
                name: "step_failures_total",
                kind: "counter",
                help: "Steps that returned an error",
                samples: vec![(String::new(), self.step_failures.to_string())],
            },
            MetricFamily {
                name: "step_calls_total",
                kind: "counter",
                help: "Step invocation count",
                samples: per_step(|m| m.calls.to_string()),
            },
            MetricFamily {
                name: "step_duration_seconds_total",
                kind: "counter",
                help: "Accumulated step duration in seconds",
                samples: per_step(|m| seconds(m.total_duration_ms)),
            },
            MetricFamily {
                name: "step_duration_seconds_max",
                kind: "gauge",
                help: "Maximum step duration in seconds",
                samples: per_step(|m| seconds(m.max_duration_ms)),
            },
            MetricFamily {
                name: "workflow_duration_seconds",
                kind: "gauge",
                help: "Total workflow duration",
                samples: vec![(String::new(), seconds(self.total_duration_ms))],
            },
        ]
    }

    /// Renders the snapshot in the Prometheus text exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut lines = Vec::new();
        for family in self.families() {
            let name = format!("serveflow_{}", family.name);
            lines.push(format!("# HELP {name} {}", family.help));
            lines.push(format!("# TYPE {name} {}", family.kind));
            for (label, value) in family.samples {
                if label.is_empty() {
                    lines.push(format!("{name} {value}"));
                } else {
                    lines.push(format!("{name}{{{label}}} {value}"));
                }
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }
}
