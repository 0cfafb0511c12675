pub mod deriver;
pub mod state;

pub use deriver::{derive, derive_cold};
pub use state::{CountdownState, PausedState, PresentationState};
