//! Rate-limited batch delivery with partial-failure accounting.

pub mod delivery;
pub mod dispatcher;

pub use delivery::{DeliveryClient, DeliveryError, SimulatedDelivery};
pub use dispatcher::{
    BatchDispatcher, DeliveryReceipt, DispatchConfig, DispatchOutcome, DispatchPlan,
    DispatchProgress,
};
