use async_trait::async_trait;
use miette::Diagnostic;
use rand::Rng;
use thiserror::Error;

/// One attempted delivery was refused downstream.
///
/// A refusal is an expected per-recipient outcome, not an infrastructure
/// failure: the dispatcher counts it and keeps going.
#[derive(Debug, Error, Diagnostic)]
pub enum DeliveryError {
    #[error("delivery to '{recipient}' refused: {reason}")]
    #[diagnostic(code(stepline::dispatch::refused))]
    Refused { recipient: String, reason: String },
}

/// Seam for the actual delivery transport.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn deliver(&self, recipient: &str, subject: &str) -> Result<(), DeliveryError>;
}

/// Delivery client that succeeds with a fixed probability, standing in for
/// a real provider during development.
#[derive(Clone, Debug)]
pub struct SimulatedDelivery {
    success_rate: f64,
}

impl Default for SimulatedDelivery {
    fn default() -> Self {
        Self { success_rate: 0.95 }
    }
}

impl SimulatedDelivery {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl DeliveryClient for SimulatedDelivery {
    async fn deliver(&self, recipient: &str, _subject: &str) -> Result<(), DeliveryError> {
        if rand::rng().random_bool(self.success_rate) {
            Ok(())
        } else {
            Err(DeliveryError::Refused {
                recipient: recipient.to_string(),
                reason: "simulated provider refusal".to_string(),
            })
        }
    }
}
