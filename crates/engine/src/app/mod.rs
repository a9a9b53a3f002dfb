mod clock;
mod input;
mod signal;
mod state;
mod wait;

pub use clock::{FixedStepClock, LoopConfig, StepPlan};
pub use input::{InputAction, InputSnapshot};
pub use signal::{Signal, SubscriptionId};
pub use state::{GameState, GameStateMachine, StateChanged};
pub use wait::{DependencyWait, WaitStatus};
