pub mod engine;
pub mod ordering;

pub use engine::{push_recent, reconcile, trim_recent, Reconciliation};
pub use ordering::{of_kind, sort_for_display};
