//! Small shared helpers.

pub mod ids;

pub use ids::workflow_instance_id;
