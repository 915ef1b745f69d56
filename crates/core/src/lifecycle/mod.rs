pub mod engine;
pub mod states;

pub use engine::{LeaveLifecycle, TransitionError};
pub use states::{LifecycleEvent, TransitionOutcome};
