//! Response types for the relayer API.

use serde::Serialize;

use crate::maintenance::{SchedulerStatus, TriggerOutcome};

/// Response from the health endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub wallet: String,
    pub rpc_status: &'static str,
    pub fund_manager_running: bool,
    pub dry_run: bool,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct FundManagerStatusResponse {
    pub fund_manager: SchedulerStatus,
    pub timestamp_ms: u64,
}

#[derive(Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub status: TriggerOutcome,
}

/// Body of a request rejected before it reached its handler.
#[derive(Serialize)]
pub struct RejectionResponse {
    pub success: bool,
    pub error: String,
}

impl RejectionResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
