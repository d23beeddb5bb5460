//! Task lifecycle state machine.
//!
//! One pure transition function is the authoritative definition of legal
//! state changes; the booking engine, scheduler, reconciler, and
//! cancellation handler are its only callers.

pub mod events;
pub mod states;
pub mod task_state_machine;

pub use events::TaskEvent;
pub use states::TaskState;
pub use task_state_machine::{
    apply_event, next_state, StateMachineError, StateMachineResult, Transition,
};
