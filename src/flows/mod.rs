//! The workflows shipped with the crate: a four-stage data pipeline, an
//! email campaign with throttled sending, and three scheduled maintenance
//! jobs. Each flow module declares its topics and payload types alongside
//! its steps.

pub mod data_pipeline;
pub mod email_campaign;
pub mod scheduled_tasks;

/// Stable state-store namespaces. These are a public contract: external
/// tooling reads them directly.
pub mod namespaces {
    pub const PIPELINES: &str = "pipelines";
    pub const STORAGE: &str = "storage";
    pub const CAMPAIGNS: &str = "campaigns";
    pub const CAMPAIGN_CONTENT: &str = "campaign-content";
    pub const EMAIL_TRACKING: &str = "email-tracking";
    pub const CLEANUP_LOGS: &str = "cleanup-logs";
    pub const REPORTS: &str = "reports";
    pub const HEALTH_CHECKS: &str = "health-checks";
}
