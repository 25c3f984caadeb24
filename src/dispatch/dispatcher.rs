use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use super::delivery::DeliveryClient;
use crate::steps::{StepContext, StepError};

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Throttle parameters for batched delivery.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Recipients per batch, at least 1.
    pub batch_size: usize,
    /// Pause inserted between consecutive batches (not after the last).
    pub batch_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

impl DispatchConfig {
    pub fn new(batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Defaults overridden by `STEPLINE_BATCH_SIZE` and
    /// `STEPLINE_BATCH_DELAY_MS` when set; unparseable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("STEPLINE_BATCH_SIZE")
            && let Ok(size) = raw.trim().parse::<usize>()
        {
            config.batch_size = size.max(1);
        }
        if let Ok(raw) = std::env::var("STEPLINE_BATCH_DELAY_MS")
            && let Ok(millis) = raw.trim().parse::<u64>()
        {
            config.batch_delay = Duration::from_millis(millis);
        }
        config
    }
}

/// One dispatch run: who gets what, and where the dispatcher reports.
///
/// The tracking topic and progress namespace are parameters so the
/// dispatcher stays ignorant of any particular workflow's wiring; the step
/// that owns the run supplies them and must declare the tracking topic in
/// its `emits`.
#[derive(Clone, Copy, Debug)]
pub struct DispatchPlan<'a> {
    pub campaign_id: &'a str,
    pub subject: &'a str,
    pub recipients: &'a [String],
    /// Topic to publish one [`DeliveryReceipt`] per successful delivery.
    pub tracking_topic: &'a str,
    /// Namespace for per-batch [`DispatchProgress`] records, keyed by
    /// `campaign_id`.
    pub progress_namespace: &'a str,
}

/// Published on the tracking topic after each successful delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub campaign_id: String,
    pub recipient: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub status: String,
}

/// Progress record written after every batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchProgress {
    pub status: String,
    pub sent_count: usize,
    pub failed_count: usize,
    /// Percentage of recipients attempted so far, rounded to 2 decimals.
    pub progress: f64,
}

/// Final accounting for one dispatch run.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchOutcome {
    pub total_recipients: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    pub batches_processed: usize,
    /// `sent / total * 100`, rounded to 2 decimals; 0.0 for an empty run.
    pub success_rate: f64,
}

/// Rate-limited batch dispatcher with partial-failure accounting.
///
/// Recipients are split into fixed-size batches processed sequentially,
/// with a pause between consecutive batches. Within a batch each recipient
/// is attempted independently: a refusal increments the failure counter
/// and never aborts the run. Every recipient is attempted exactly once.
pub struct BatchDispatcher<C: DeliveryClient> {
    client: C,
    config: DispatchConfig,
}

impl<C: DeliveryClient> BatchDispatcher<C> {
    pub fn new(client: C, config: DispatchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run the plan to completion and return the accounting.
    ///
    /// Progress is recorded after each batch and a receipt is published per
    /// successful delivery, so an observer mid-run sees counts consistent
    /// with the batches completed so far. Infrastructure failures (state
    /// writes, publishing) abort the run with the error.
    pub async fn dispatch(
        &self,
        plan: DispatchPlan<'_>,
        ctx: &StepContext,
    ) -> Result<DispatchOutcome, StepError> {
        let total = plan.recipients.len();
        let mut sent_count = 0usize;
        let mut failed_count = 0usize;
        let mut batches_processed = 0usize;

        for (index, batch) in plan.recipients.chunks(self.config.batch_size).enumerate() {
            if index > 0 {
                sleep(self.config.batch_delay).await;
            }

            for recipient in batch {
                match self.client.deliver(recipient, plan.subject).await {
                    Ok(()) => {
                        sent_count += 1;
                        let receipt = DeliveryReceipt {
                            campaign_id: plan.campaign_id.to_string(),
                            recipient: recipient.clone(),
                            subject: plan.subject.to_string(),
                            sent_at: Utc::now(),
                            status: "delivered".to_string(),
                        };
                        ctx.emit(plan.tracking_topic, &receipt)?;
                    }
                    Err(error) => {
                        failed_count += 1;
                        tracing::warn!(
                            campaign_id = plan.campaign_id,
                            recipient,
                            %error,
                            "delivery refused"
                        );
                    }
                }
            }

            batches_processed += 1;
            let attempted = sent_count + failed_count;
            let progress = DispatchProgress {
                status: "sending".to_string(),
                sent_count,
                failed_count,
                progress: round2(attempted as f64 / total as f64 * 100.0),
            };
            ctx.set_state(plan.progress_namespace, plan.campaign_id, &progress)
                .await?;

            tracing::info!(
                campaign_id = plan.campaign_id,
                batch = batches_processed,
                sent_count,
                failed_count,
                "batch processed"
            );
        }

        let success_rate = if total == 0 {
            0.0
        } else {
            round2(sent_count as f64 / total as f64 * 100.0)
        };

        Ok(DispatchOutcome {
            total_recipients: total,
            sent_count,
            failed_count,
            batches_processed,
            success_rate,
        })
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn round2_truncates_to_cents() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(0.0), 0.0);
    }
}
