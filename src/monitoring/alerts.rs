//! Alert scan over the persisted monitoring reports
//!
//! Reads the latest drift reports and the production evaluation
//! baseline, turns findings into alert events, and fans them out to any
//! registered handlers. The scan itself never fails on a triggered
//! alert; raising alerts is its job, not an error condition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::monitoring::data_drift::DataDriftReport;
use crate::monitoring::model_drift::ModelDriftReport;
use crate::training::EvaluationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// One raised alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub severity: AlertSeverity,
    pub source: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl AlertEvent {
    fn new(severity: AlertSeverity, source: &str, message: String) -> Self {
        Self {
            severity,
            source: source.to_string(),
            message,
            raised_at: Utc::now(),
        }
    }
}

type AlertHandler = Box<dyn Fn(&AlertEvent) + Send + Sync>;

/// Scans monitoring artifacts and raises alerts.
pub struct AlertScan {
    sla_f1_threshold: f64,
    handlers: Vec<AlertHandler>,
}

impl AlertScan {
    pub fn new(sla_f1_threshold: f64) -> Self {
        Self {
            sla_f1_threshold,
            handlers: Vec::new(),
        }
    }

    /// Register a notification handler invoked for every raised alert.
    pub fn on_alert(&mut self, handler: impl Fn(&AlertEvent) + Send + Sync + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Evaluate all available reports. Missing reports are skipped, not
    /// errors; monitoring may run before any drift check has happened.
    pub fn run(
        &self,
        data_drift: Option<&DataDriftReport>,
        model_drift: Option<&ModelDriftReport>,
        baseline: Option<&EvaluationReport>,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        if let Some(report) = data_drift {
            for feature in report.features.iter().filter(|f| f.drift_detected) {
                events.push(AlertEvent::new(
                    AlertSeverity::Warning,
                    "data_drift",
                    format!(
                        "feature {} drifted (KS statistic {:.4}, p-value {:.4})",
                        feature.feature, feature.statistic, feature.p_value
                    ),
                ));
            }
        }

        if let Some(report) = model_drift {
            if report.drift_detected {
                events.push(AlertEvent::new(
                    AlertSeverity::Warning,
                    "model_drift",
                    format!(
                        "production F1 degraded from {:.4} to {:.4}",
                        report.baseline_f1, report.current_f1
                    ),
                ));
            }
            // SLA breach on live performance escalates to critical
            if report.current_f1 < self.sla_f1_threshold {
                events.push(AlertEvent::new(
                    AlertSeverity::Critical,
                    "sla",
                    format!(
                        "production F1 {:.4} below SLA floor {:.4}",
                        report.current_f1, self.sla_f1_threshold
                    ),
                ));
            }
        } else if let Some(report) = baseline {
            if report.metrics.f1_score < self.sla_f1_threshold {
                events.push(AlertEvent::new(
                    AlertSeverity::Critical,
                    "sla",
                    format!(
                        "baseline F1 {:.4} below SLA floor {:.4}",
                        report.metrics.f1_score, self.sla_f1_threshold
                    ),
                ));
            }
        }

        for event in &events {
            match event.severity {
                AlertSeverity::Warning => {
                    warn!(source = %event.source, "{}", event.message)
                }
                AlertSeverity::Critical => {
                    error!(source = %event.source, "{}", event.message)
                }
            }
            for handler in &self.handlers {
                handler(event);
            }
        }

        if events.is_empty() {
            info!("alert scan clean, no alerts raised");
        }

        events
    }

    /// Load whichever reports exist under `dir` and run the scan.
    pub fn run_from_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<AlertEvent>> {
        let dir = dir.as_ref();
        let data_drift = DataDriftReport::load(dir.join("data_drift.json")).ok();
        let model_drift = ModelDriftReport::load(dir.join("model_drift.json")).ok();
        let baseline = EvaluationReport::load(dir.join("evaluation.json")).ok();

        Ok(self.run(
            data_drift.as_ref(),
            model_drift.as_ref(),
            baseline.as_ref(),
        ))
    }
}
