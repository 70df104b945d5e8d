//! Turning ingestion output and drift reports into ordered plans

pub mod plan;
pub mod reconciler;

pub use plan::{Action, DeleteCause, Plan};
pub use reconciler::{ReconcilePolicy, Reconciler};
