pub mod coordinator;
pub mod sync;

pub use coordinator::{AlarmBook, AlarmCoordinator, AlarmDraft};
pub use sync::SyncController;
