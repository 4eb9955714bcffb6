use std::fmt;

use thiserror::Error;

use crate::analysis_client::AnalysisError;
use crate::extraction::ExtractError;

/// The remote-backed steps of the workflow, named the way failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Scoring,
    Optimization,
    InterviewPrep,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Scoring => "Analysis",
            Step::Optimization => "Optimization",
            Step::InterviewPrep => "Interview question generation",
        })
    }
}

/// Coarse classification used for HTTP mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Busy,
    EngineUnavailable,
    InsufficientText,
    PdfParse,
    Transport,
    RemoteOperation,
    MalformedResponse,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("Another operation is already running for this session. Wait for it to finish.")]
    Busy,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("{step} failed: {source}")]
    Analysis {
        step: Step,
        #[source]
        source: AnalysisError,
    },

    /// The session was reset while the operation was in flight; its result was dropped.
    #[error("The operation was cancelled by a reset.")]
    Cancelled,
}

impl WorkflowError {
    pub fn analysis(step: Step) -> impl FnOnce(AnalysisError) -> Self {
        move |source| WorkflowError::Analysis { step, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Busy => ErrorKind::Busy,
            WorkflowError::Cancelled => ErrorKind::Cancelled,
            WorkflowError::Extract(e) if e.is_validation() => ErrorKind::Validation,
            WorkflowError::Extract(e) => match e {
                ExtractError::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
                ExtractError::InsufficientText { .. } => ErrorKind::InsufficientText,
                _ => ErrorKind::PdfParse,
            },
            WorkflowError::Analysis { source, .. } => match source {
                AnalysisError::Transport(_) | AnalysisError::Encode(_) => ErrorKind::Transport,
                AnalysisError::Remote(_) => ErrorKind::RemoteOperation,
                AnalysisError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            },
        }
    }
}
