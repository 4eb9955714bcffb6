use serde::Serialize;

use crate::analysis_client::types::{InterviewQuestionSet, MatchReport};
use crate::extraction::DocumentKind;
use crate::workflow::errors::WorkflowError;

/// Position in the four-stage workflow. Ordered: `Intake < Scored < Optimized < InterviewReady`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Intake,
    Scored,
    Optimized,
    InterviewReady,
}

/// How the current résumé text arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumeSource {
    Pasted,
    Upload {
        document_kind: DocumentKind,
        file_name: Option<String>,
    },
}

/// Everything one session has accumulated. Mutated only by `Workflow`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineState {
    pub stage: Stage,
    pub resume_text: String,
    pub resume_source: Option<ResumeSource>,
    pub job_description_text: String,
    pub match_report: Option<MatchReport>,
    pub optimized_resume_text: Option<String>,
    pub interview_question_set: Option<InterviewQuestionSet>,
    pub last_error: Option<String>,
}

impl PipelineState {
    /// Fails with a validation error unless the workflow sits exactly at `expected`.
    pub fn require_stage(&self, expected: Stage, action: &str) -> Result<(), WorkflowError> {
        if self.stage == expected {
            return Ok(());
        }
        let hint = if self.stage > expected {
            "Reset to start a new analysis."
        } else {
            "Complete the previous step first."
        };
        Err(WorkflowError::Validation(format!(
            "{action} is not available at the {:?} stage. {hint}",
            self.stage
        )))
    }

    /// Stage outputs exist exactly for the stages that produced them.
    pub fn is_consistent(&self) -> bool {
        self.match_report.is_some() == (self.stage >= Stage::Scored)
            && self.optimized_resume_text.is_some() == (self.stage >= Stage::Optimized)
            && self.interview_question_set.is_some() == (self.stage == Stage::InterviewReady)
    }
}
