pub mod alerts;
pub mod cache;
pub mod config;
pub mod health;
pub mod logging;
pub mod performance;
pub mod probes;
pub mod recorder;
pub mod series;
pub mod service;
pub mod snapshot;
pub mod sysmem;
pub mod types;

// Re-export commonly used types
pub use config::{MonitorConfig, Thresholds};
pub use service::{MonitoringService, MonitoringServiceBuilder};
pub use types::{
    Alert, AlertLevel, ComponentHealth, ComponentStatus, Measurement, MetricKind, SystemStatus,
};
