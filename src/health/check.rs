//! Health check result types and probe reports.

use serde::{Deserialize, Serialize};

use crate::health::process::MemoryReport;
use crate::resilience::RetryStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    fn severity(self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Unknown => 1,
            HealthStatus::Degraded => 2,
            HealthStatus::Unhealthy => 3,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }

    /// Probe HTTP code: only `Healthy` maps to 200.
    pub fn http_status(self) -> u16 {
        if self.is_healthy() {
            200
        } else {
            503
        }
    }
}

/// Result of one named check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub response_time_ms: Option<f64>,
    pub details: Option<serde_json::Value>,
}

impl HealthCheck {
    pub fn new(name: impl Into<String>, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            response_time_ms: None,
            details: None,
        }
    }

    pub fn with_response_time(mut self, ms: f64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    pub status: HealthStatus,
    pub timestamp: f64,
    pub uptime_seconds: f64,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub status: HealthStatus,
    pub timestamp: f64,
    pub response_time_ms: f64,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub uptime_seconds: f64,
    pub version: String,
    pub service: String,
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedMetrics {
    pub retry: RetryStats,
    pub memory: MemoryReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedReport {
    pub status: HealthStatus,
    pub timestamp: f64,
    pub response_time_ms: f64,
    pub server: ServerInfo,
    pub checks: Vec<HealthCheck>,
    pub metrics: DetailedMetrics,
}
