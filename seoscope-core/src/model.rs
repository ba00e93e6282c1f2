// Shared report records used by every analysis module

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// A problem worth acting on, with the recommended fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    pub action: String,
}

impl Issue {
    pub fn new(severity: Severity, message: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            action: action.into(),
        }
    }
}

/// How far a module got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModuleStatus {
    Ok,
    Partial { reason: String },
    Skipped { reason: String },
    Error { message: String },
}

impl ModuleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ModuleStatus::Ok => "ok",
            ModuleStatus::Partial { .. } => "partial",
            ModuleStatus::Skipped { .. } => "skipped",
            ModuleStatus::Error { .. } => "error",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ModuleStatus::Ok => None,
            ModuleStatus::Partial { reason } | ModuleStatus::Skipped { reason } => Some(reason),
            ModuleStatus::Error { message } => Some(message),
        }
    }
}

/// Output of one module plus the status it finished in.
///
/// Failed and skipped modules still carry `T::default()`, so the
/// renderer never has to special-case missing data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport<T> {
    pub status: ModuleStatus,
    pub data: T,
}

impl<T: Default> ModuleReport<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: ModuleStatus::Ok,
            data,
        }
    }

    pub fn partial(data: T, reason: impl Into<String>) -> Self {
        Self {
            status: ModuleStatus::Partial {
                reason: reason.into(),
            },
            data,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ModuleStatus::Skipped {
                reason: reason.into(),
            },
            data: T::default(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ModuleStatus::Error {
                message: message.into(),
            },
            data: T::default(),
        }
    }

    /// Missing credentials skip the module and an unreadable payload counts
    /// as no data. Transport and status failures are errors.
    pub fn from_provider_error(err: &ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(reason) => Self::skipped(reason.clone()),
            ProviderError::Malformed(detail) => {
                Self::partial(T::default(), format!("no data, unreadable provider response: {}", detail))
            }
            other => Self::error(other.to_string()),
        }
    }

    pub fn has_data(&self) -> bool {
        matches!(
            self.status,
            ModuleStatus::Ok | ModuleStatus::Partial { .. }
        )
    }
}

/// How much of a candidate list a sampler actually looked at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBudget {
    pub candidates: usize,
    pub sampled: usize,
    pub budget_exhausted: bool,
}

impl SampleBudget {
    pub fn new(candidates: usize, limit: usize) -> Self {
        Self {
            candidates,
            sampled: candidates.min(limit),
            budget_exhausted: candidates > limit,
        }
    }
}

/// Round to one decimal place for display.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
