//! The upload state machine.

pub use orchestrator::{
    CommitOutcome, SelectedFile, UploadOrchestrator, UploadPhase, UploadReceipt,
};

mod orchestrator;
