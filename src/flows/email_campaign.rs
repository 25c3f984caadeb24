//! Email campaign flow: schedule -> generate content -> send -> track.
//!
//! Sending goes through the [`BatchDispatcher`], which throttles delivery
//! and publishes one `email-sent` receipt per successful delivery; the
//! tracking step fans those receipts into per-recipient engagement
//! records.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::namespaces;
use crate::dispatch::{
    BatchDispatcher, DeliveryClient, DeliveryReceipt, DispatchConfig, DispatchPlan,
    SimulatedDelivery,
};
use crate::steps::{ApiStep, EventStep, StepConfig, StepContext, StepError, Trigger};
use crate::utils::workflow_instance_id;

pub const FLOW: &str = "email-campaign";

pub mod topics {
    pub const CAMPAIGN_SCHEDULED: &str = "campaign-scheduled";
    pub const CONTENT_GENERATED: &str = "content-generated";
    pub const EMAILS_SENT: &str = "emails-sent";
    /// One event per successful delivery, for engagement tracking.
    pub const EMAIL_SENT: &str = "email-sent";
}

/* ---------- payload types ---------- */

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCampaignRequest {
    pub campaign_name: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub template: String,
    /// Defaults to now when omitted.
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCampaignResponse {
    pub campaign_id: String,
    pub status: String,
    pub recipient_count: usize,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignScheduled {
    pub campaign_id: String,
    pub campaign_name: String,
    pub subject: String,
    pub template: String,
    pub recipients: Vec<String>,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailContent {
    pub subject: String,
    pub body_template: String,
    pub personalization_fields: Vec<String>,
    pub content_variations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentGenerated {
    pub campaign_id: String,
    pub campaign_name: String,
    pub content: EmailContent,
    pub recipients: Vec<String>,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailsSent {
    pub campaign_id: String,
    pub sent_count: usize,
    pub failed_count: usize,
    pub total_recipients: usize,
    pub success_rate: f64,
    pub completed_at: DateTime<Utc>,
}

/* ---------- state records ---------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignStatus {
    Scheduled,
    GeneratingContent,
    Sending,
    Completed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledRecord {
    pub name: String,
    pub subject: String,
    pub template: String,
    pub recipients: Vec<String>,
    pub recipient_count: usize,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratingRecord {
    pub status: CampaignStatus,
    pub content_generation_started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendingRecord {
    pub status: CampaignStatus,
    pub sending_started_at: DateTime<Utc>,
    pub total_recipients: usize,
    pub sent_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedCampaignRecord {
    pub status: CampaignStatus,
    pub sent_count: usize,
    pub failed_count: usize,
    pub total_recipients: usize,
    pub success_rate: f64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementRecord {
    pub recipient: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub status: String,
    pub opened: bool,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked: bool,
    pub clicked_at: Option<DateTime<Utc>>,
    pub tracked_at: DateTime<Utc>,
}

/* ---------- steps ---------- */

/// Accepts a campaign request, records it, and starts the flow.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScheduleCampaign;

#[async_trait]
impl ApiStep for ScheduleCampaign {
    type Request = ScheduleCampaignRequest;
    type Response = ScheduleCampaignResponse;

    fn config(&self) -> StepConfig {
        StepConfig {
            name: "ScheduleCampaign",
            description: "Schedules an email campaign for execution",
            flow: FLOW,
            emits: &[topics::CAMPAIGN_SCHEDULED],
            trigger: Trigger::Api {
                method: "POST",
                path: "/campaign/schedule",
            },
        }
    }

    async fn handle(
        &self,
        request: ScheduleCampaignRequest,
        ctx: StepContext,
    ) -> Result<ScheduleCampaignResponse, StepError> {
        if request.recipients.is_empty() {
            return Err(StepError::Validation(
                "recipients must not be empty".to_string(),
            ));
        }

        let campaign_id = workflow_instance_id("campaign");
        let scheduled_for = request.scheduled_for.unwrap_or_else(Utc::now);
        let recipient_count = request.recipients.len();
        tracing::info!(
            campaign_id,
            campaign_name = request.campaign_name,
            recipient_count,
            "scheduling campaign"
        );

        ctx.set_state(
            namespaces::CAMPAIGNS,
            &campaign_id,
            &ScheduledRecord {
                name: request.campaign_name.clone(),
                subject: request.subject.clone(),
                template: request.template.clone(),
                recipients: request.recipients.clone(),
                recipient_count,
                status: CampaignStatus::Scheduled,
                created_at: Utc::now(),
                scheduled_for,
            },
        )
        .await?;

        ctx.emit(
            topics::CAMPAIGN_SCHEDULED,
            &CampaignScheduled {
                campaign_id: campaign_id.clone(),
                campaign_name: request.campaign_name.clone(),
                subject: request.subject,
                template: request.template,
                recipients: request.recipients,
                scheduled_for,
            },
        )?;

        Ok(ScheduleCampaignResponse {
            message: format!(
                "Campaign \"{}\" scheduled for {recipient_count} recipients",
                request.campaign_name
            ),
            campaign_id,
            status: "scheduled".to_string(),
            recipient_count,
        })
    }
}

const CONTENT_VARIATIONS: [&str; 4] = [
    "Exciting news awaits you!",
    "Don't miss out on this opportunity!",
    "Special offer just for you!",
    "Your exclusive update is here!",
];

/// Produces the campaign's email content and stores it for auditing.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenerateContent;

#[async_trait]
impl EventStep for GenerateContent {
    type Input = CampaignScheduled;

    fn config(&self) -> StepConfig {
        StepConfig {
            name: "GenerateContent",
            description: "Generates personalized email content for a campaign",
            flow: FLOW,
            emits: &[topics::CONTENT_GENERATED],
            trigger: Trigger::Event {
                subscribes: &[topics::CAMPAIGN_SCHEDULED],
            },
        }
    }

    async fn handle(&self, input: CampaignScheduled, ctx: StepContext) -> Result<(), StepError> {
        ctx.set_state(
            namespaces::CAMPAIGNS,
            &input.campaign_id,
            &GeneratingRecord {
                status: CampaignStatus::GeneratingContent,
                content_generation_started_at: Utc::now(),
            },
        )
        .await?;

        let content = EmailContent {
            subject: input.subject,
            body_template: input.template,
            personalization_fields: vec![
                "firstName".to_string(),
                "lastName".to_string(),
                "company".to_string(),
            ],
            content_variations: CONTENT_VARIATIONS.iter().map(|s| s.to_string()).collect(),
            generated_at: Utc::now(),
        };

        ctx.set_state(namespaces::CAMPAIGN_CONTENT, &input.campaign_id, &content)
            .await?;

        tracing::info!(
            campaign_id = input.campaign_id,
            variations = content.content_variations.len(),
            "content generated"
        );

        ctx.emit(
            topics::CONTENT_GENERATED,
            &ContentGenerated {
                campaign_id: input.campaign_id,
                campaign_name: input.campaign_name,
                content,
                recipients: input.recipients,
                scheduled_for: input.scheduled_for,
            },
        )?;
        Ok(())
    }
}

/// Delivers the campaign through the batch dispatcher and records the
/// final accounting.
pub struct SendEmails<C: DeliveryClient> {
    dispatcher: BatchDispatcher<C>,
}

impl<C: DeliveryClient> SendEmails<C> {
    pub fn new(client: C, config: DispatchConfig) -> Self {
        Self {
            dispatcher: BatchDispatcher::new(client, config),
        }
    }
}

impl SendEmails<SimulatedDelivery> {
    /// Simulated provider with the stock 95% success rate.
    pub fn simulated(config: DispatchConfig) -> Self {
        Self::new(SimulatedDelivery::default(), config)
    }
}

#[async_trait]
impl<C: DeliveryClient + 'static> EventStep for SendEmails<C> {
    type Input = ContentGenerated;

    fn config(&self) -> StepConfig {
        StepConfig {
            name: "SendEmails",
            description: "Sends campaign emails in throttled batches",
            flow: FLOW,
            emits: &[topics::EMAILS_SENT, topics::EMAIL_SENT],
            trigger: Trigger::Event {
                subscribes: &[topics::CONTENT_GENERATED],
            },
        }
    }

    async fn handle(&self, input: ContentGenerated, ctx: StepContext) -> Result<(), StepError> {
        tracing::info!(
            campaign_id = input.campaign_id,
            recipient_count = input.recipients.len(),
            "starting email sending"
        );

        ctx.set_state(
            namespaces::CAMPAIGNS,
            &input.campaign_id,
            &SendingRecord {
                status: CampaignStatus::Sending,
                sending_started_at: Utc::now(),
                total_recipients: input.recipients.len(),
                sent_count: 0,
            },
        )
        .await?;

        let outcome = self
            .dispatcher
            .dispatch(
                DispatchPlan {
                    campaign_id: &input.campaign_id,
                    subject: &input.content.subject,
                    recipients: &input.recipients,
                    tracking_topic: topics::EMAIL_SENT,
                    progress_namespace: namespaces::CAMPAIGNS,
                },
                &ctx,
            )
            .await?;

        let completed_at = Utc::now();
        ctx.set_state(
            namespaces::CAMPAIGNS,
            &input.campaign_id,
            &CompletedCampaignRecord {
                status: CampaignStatus::Completed,
                sent_count: outcome.sent_count,
                failed_count: outcome.failed_count,
                total_recipients: outcome.total_recipients,
                success_rate: outcome.success_rate,
                completed_at,
            },
        )
        .await?;

        tracing::info!(
            campaign_id = input.campaign_id,
            sent_count = outcome.sent_count,
            failed_count = outcome.failed_count,
            success_rate = outcome.success_rate,
            "email campaign completed"
        );

        ctx.emit(
            topics::EMAILS_SENT,
            &EmailsSent {
                campaign_id: input.campaign_id,
                sent_count: outcome.sent_count,
                failed_count: outcome.failed_count,
                total_recipients: outcome.total_recipients,
                success_rate: outcome.success_rate,
                completed_at,
            },
        )?;
        Ok(())
    }
}

/// Records simulated engagement for each delivered email.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackEngagement;

fn tracking_key(campaign_id: &str, recipient: &str) -> String {
    let sanitized: String = recipient
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{campaign_id}-{sanitized}")
}

#[async_trait]
impl EventStep for TrackEngagement {
    type Input = DeliveryReceipt;

    fn config(&self) -> StepConfig {
        StepConfig {
            name: "TrackEngagement",
            description: "Tracks individual email engagement (opens, clicks)",
            flow: FLOW,
            emits: &[],
            trigger: Trigger::Event {
                subscribes: &[topics::EMAIL_SENT],
            },
        }
    }

    async fn handle(&self, input: DeliveryReceipt, ctx: StepContext) -> Result<(), StepError> {
        let now = Utc::now();
        // Scoped so the thread-local rng never lives across an await.
        let record = {
            let mut rng = rand::rng();
            let opened = rng.random_bool(0.6);
            let clicked = rng.random_bool(0.3);
            EngagementRecord {
                recipient: input.recipient.clone(),
                subject: input.subject,
                sent_at: input.sent_at,
                status: input.status,
                opened,
                opened_at: opened.then(|| now + Duration::seconds(rng.random_range(0..3600))),
                clicked,
                clicked_at: clicked.then(|| now + Duration::seconds(rng.random_range(0..7200))),
                tracked_at: now,
            }
        };

        if record.opened {
            tracing::info!(
                campaign_id = input.campaign_id,
                recipient = input.recipient,
                "email opened"
            );
        }
        if record.clicked {
            tracing::info!(
                campaign_id = input.campaign_id,
                recipient = input.recipient,
                "email link clicked"
            );
        }

        let key = tracking_key(&input.campaign_id, &input.recipient);
        ctx.set_state(namespaces::EMAIL_TRACKING, &key, &record).await?;
        Ok(())
    }
}
