//! Doctor command for system diagnostics.
//!
//! Combines the pipeline's own component health report with host-side
//! checks (configuration, memory) into one pass/fail listing.

use crate::config::Config;
use sysinfo::System;

/// Per-component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One component's health report
#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
    pub detail: String,
}

/// Check that the configuration is complete enough to serve queries
pub fn check_config(config: &Config) -> ComponentHealth {
    let token_present = config
        .backend
        .api_token
        .as_deref()
        .is_some_and(|t| !t.is_empty());

    if !token_present {
        return ComponentHealth {
            component: "configuration".to_string(),
            status: HealthStatus::Degraded,
            detail: format!(
                "no API token configured; set {} or backend.api_token",
                crate::config::ENV_API_TOKEN
            ),
        };
    }

    if config.retrieval.top_k == 0 {
        return ComponentHealth {
            component: "configuration".to_string(),
            status: HealthStatus::Unhealthy,
            detail: "retrieval.top_k is 0; no chunk can ever be retrieved".to_string(),
        };
    }

    ComponentHealth {
        component: "configuration".to_string(),
        status: HealthStatus::Healthy,
        detail: format!(
            "model {}, top_k {}, min_score {}",
            config.backend.model, config.retrieval.top_k, config.retrieval.min_score
        ),
    }
}

/// Check available host memory
pub fn check_memory() -> ComponentHealth {
    let mut system = System::new();
    system.refresh_memory();

    let available_mb = system.available_memory() / (1024 * 1024);

    let status = if available_mb < 256 {
        HealthStatus::Unhealthy
    } else if available_mb < 1024 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    ComponentHealth {
        component: "host_memory".to_string(),
        status,
        detail: format!("{} MB available", available_mb),
    }
}

impl HealthStatus {
    /// Terminal marker used by the doctor listing
    pub fn marker(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "✓",
            HealthStatus::Degraded => "⚠",
            HealthStatus::Unhealthy => "✗",
        }
    }
}
