pub mod controller;
pub mod events;
mod loop_worker;
pub mod state;

pub use controller::SamplingController;
pub use events::{RunEvent, RunOutcome};
pub use state::{RunState, RunStatus};
