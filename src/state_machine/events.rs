use serde::{Deserialize, Serialize};

/// Events that drive task lifecycle transitions.
///
/// Produced by the booking engine (Book), the status reconciler
/// (Confirm/Start/Complete/Fail) and the cancellation handler (Cancel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A marketplace booking was created for the task.
    Book,
    /// The worker confirmed an existing booking.
    Confirm,
    /// The worker started the physical work.
    Start,
    /// The work finished successfully.
    Complete,
    /// The worker cancelled; carries the reported reason.
    Cancel(String),
    /// The work failed; carries the reported reason.
    Fail(String),
}

impl TaskEvent {
    /// Short name used in audit payloads and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Confirm => "confirm",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel(_) => "cancel",
            Self::Fail(_) => "fail",
        }
    }
}
