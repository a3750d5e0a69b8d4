//! Post-deployment monitoring: data drift, performance drift, alerts

pub mod alerts;
pub mod data_drift;
pub mod model_drift;

pub use alerts::{AlertEvent, AlertScan, AlertSeverity};
pub use data_drift::{DataDriftMonitor, DataDriftReport, FeatureDrift};
pub use model_drift::{ModelDriftMonitor, ModelDriftReport};
