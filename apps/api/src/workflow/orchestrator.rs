//! Workflow Orchestrator: drives one session through Intake → Scored → Optimized → InterviewReady.
//!
//! Flow per transition: claim the busy flag → check the stage precondition → one awaited
//! analysis call → commit output and advance the stage in a single critical section.
//!
//! A failed transition commits nothing. Its message lands in `last_error`, which the next
//! operation clears on entry. `reset` never waits: it bumps the epoch, and any result that
//! arrives for an older epoch is dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::analysis_client::types::{
    InterviewPrepRequest, InterviewQuestionSet, MatchReport, OptimizationRequest, OptimizedResume,
    ScoringRequest,
};
use crate::analysis_client::AnalysisClient;
use crate::extraction::{Extracted, TextExtractor, MAX_TEXT_CHARS};
use crate::session::SessionIdentity;
use crate::workflow::errors::{Step, WorkflowError};
use crate::workflow::export::ExportedResume;
use crate::workflow::pipeline::{PipelineState, ResumeSource, Stage};

/// Holds the busy flag for the lifetime of one operation.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Workflow {
    client: AnalysisClient,
    extractor: TextExtractor,
    state: Mutex<PipelineState>,
    busy: AtomicBool,
    /// Bumped by every reset. Commits carrying an older value are discarded.
    epoch: AtomicU64,
}

impl Workflow {
    pub fn new(client: AnalysisClient, extractor: TextExtractor) -> Self {
        Self {
            client,
            extractor,
            state: Mutex::new(PipelineState::default()),
            busy: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        self.client.identity()
    }

    pub async fn snapshot(&self) -> PipelineState {
        self.state.lock().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Intake
    // ────────────────────────────────────────────────────────────────────────

    /// Stores pasted résumé text.
    pub async fn set_resume_text(&self, text: String) -> Result<(), WorkflowError> {
        let (_guard, epoch) = self.enter().await?;
        let outcome = async move {
            check_length("résumé", &text)?;
            self.commit(epoch, |state| {
                state.require_stage(Stage::Intake, "Editing the résumé")?;
                state.resume_text = text;
                state.resume_source = Some(ResumeSource::Pasted);
                Ok(())
            })
            .await
        }
        .await;
        self.settle(epoch, outcome).await
    }

    pub async fn set_job_description(&self, text: String) -> Result<(), WorkflowError> {
        let (_guard, epoch) = self.enter().await?;
        let outcome = async move {
            check_length("job description", &text)?;
            self.commit(epoch, |state| {
                state.require_stage(Stage::Intake, "Editing the job description")?;
                state.job_description_text = text;
                Ok(())
            })
            .await
        }
        .await;
        self.settle(epoch, outcome).await
    }

    /// Extracts text from an uploaded document and stores it as the résumé.
    ///
    /// On failure the previous résumé text is kept.
    pub async fn ingest_document(
        &self,
        blob: Bytes,
        media_type: &str,
        file_name: Option<String>,
    ) -> Result<Extracted, WorkflowError> {
        let (_guard, epoch) = self.enter().await?;
        let outcome = self.ingest(epoch, blob, media_type, file_name).await;
        self.settle(epoch, outcome).await
    }

    async fn ingest(
        &self,
        epoch: u64,
        blob: Bytes,
        media_type: &str,
        file_name: Option<String>,
    ) -> Result<Extracted, WorkflowError> {
        self.state
            .lock()
            .await
            .require_stage(Stage::Intake, "Uploading a résumé")?;

        let size = blob.len();
        let extracted = self.extractor.extract(blob, media_type).await?;
        check_length("extracted résumé", &extracted.text)?;

        let source = ResumeSource::Upload {
            document_kind: extracted.kind,
            file_name,
        };
        self.commit(epoch, |state| {
            state.resume_text = extracted.text.clone();
            state.resume_source = Some(source);
            Ok(())
        })
        .await?;

        info!(
            "Ingested {} bytes of {} for user {} ({} characters)",
            size,
            extracted.kind.media_type(),
            self.identity().user_id(),
            extracted.text.chars().count()
        );
        Ok(extracted)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Transitions
    // ────────────────────────────────────────────────────────────────────────

    /// Intake → Scored.
    pub async fn run_scoring(&self) -> Result<MatchReport, WorkflowError> {
        let (_guard, epoch) = self.enter().await?;
        let outcome = self.score(epoch).await;
        self.settle(epoch, outcome).await
    }

    async fn score(&self, epoch: u64) -> Result<MatchReport, WorkflowError> {
        let (cv, job_description) = {
            let state = self.state.lock().await;
            state.require_stage(Stage::Intake, "Scoring")?;
            if state.resume_text.trim().is_empty() || state.job_description_text.trim().is_empty() {
                return Err(WorkflowError::Validation(
                    "Provide both a résumé and a job description before running the analysis."
                        .to_string(),
                ));
            }
            (
                state.resume_text.clone(),
                state.job_description_text.clone(),
            )
        };

        let report: MatchReport = self
            .client
            .invoke_typed(&ScoringRequest {
                cv: &cv,
                job_description: &job_description,
            })
            .await
            .map_err(WorkflowError::analysis(Step::Scoring))?;

        self.commit(epoch, |state| {
            state.match_report = Some(report.clone());
            state.stage = Stage::Scored;
            Ok(())
        })
        .await?;

        info!(
            "Scored résumé for user {}: ATS score {}",
            self.identity().user_id(),
            report.ats_score
        );
        Ok(report)
    }

    /// Scored → Optimized. Sends the report's missing keywords along with both texts.
    pub async fn run_optimization(&self) -> Result<String, WorkflowError> {
        let (_guard, epoch) = self.enter().await?;
        let outcome = self.optimize(epoch).await;
        self.settle(epoch, outcome).await
    }

    async fn optimize(&self, epoch: u64) -> Result<String, WorkflowError> {
        let (cv, job_description, missing_keywords) = {
            let state = self.state.lock().await;
            state.require_stage(Stage::Scored, "Optimization")?;
            let report = state.match_report.as_ref().ok_or_else(|| {
                WorkflowError::Validation("Run the analysis before optimizing.".to_string())
            })?;
            (
                state.resume_text.clone(),
                state.job_description_text.clone(),
                report.missing_keywords.clone(),
            )
        };

        let optimized: OptimizedResume = self
            .client
            .invoke_typed(&OptimizationRequest {
                cv: &cv,
                job_description: &job_description,
                missing_keywords: &missing_keywords,
            })
            .await
            .map_err(WorkflowError::analysis(Step::Optimization))?;

        let text = optimized.optimized_cv;
        self.commit(epoch, |state| {
            state.optimized_resume_text = Some(text.clone());
            state.stage = Stage::Optimized;
            Ok(())
        })
        .await?;

        info!(
            "Optimized résumé for user {} ({} characters)",
            self.identity().user_id(),
            text.chars().count()
        );
        Ok(text)
    }

    /// Optimized → InterviewReady. Questions are generated from the optimized résumé.
    pub async fn run_interview_prep(&self) -> Result<InterviewQuestionSet, WorkflowError> {
        let (_guard, epoch) = self.enter().await?;
        let outcome = self.prepare_interview(epoch).await;
        self.settle(epoch, outcome).await
    }

    async fn prepare_interview(&self, epoch: u64) -> Result<InterviewQuestionSet, WorkflowError> {
        let (optimized, job_description) = {
            let state = self.state.lock().await;
            state.require_stage(Stage::Optimized, "Interview preparation")?;
            let optimized = state.optimized_resume_text.clone().ok_or_else(|| {
                WorkflowError::Validation("Optimize the résumé before preparing.".to_string())
            })?;
            (optimized, state.job_description_text.clone())
        };

        let questions: InterviewQuestionSet = self
            .client
            .invoke_typed(&InterviewPrepRequest {
                cv: &optimized,
                job_description: &job_description,
            })
            .await
            .map_err(WorkflowError::analysis(Step::InterviewPrep))?;

        self.commit(epoch, |state| {
            state.interview_question_set = Some(questions.clone());
            state.stage = Stage::InterviewReady;
            Ok(())
        })
        .await?;

        info!(
            "Prepared {} interview questions for user {}",
            questions.technical_questions.len()
                + questions.behavioral_questions.len()
                + questions.situational_questions.len(),
            self.identity().user_id()
        );
        Ok(questions)
    }

    /// Returns to a fresh Intake state. Never fails and never waits for in-flight work.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *state = PipelineState::default();
        info!("Workflow reset for user {}", self.identity().user_id());
    }

    pub async fn export_optimized_resume(&self) -> Result<ExportedResume, WorkflowError> {
        let state = self.state.lock().await;
        match (&state.optimized_resume_text, state.stage >= Stage::Optimized) {
            (Some(text), true) => Ok(ExportedResume::new(text, Utc::now())),
            _ => Err(WorkflowError::Validation(
                "There is no optimized résumé to export yet.".to_string(),
            )),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Bookkeeping
    // ────────────────────────────────────────────────────────────────────────

    /// Claims the busy flag and clears the error slot. Rejected claims leave state alone.
    async fn enter(&self) -> Result<(BusyGuard<'_>, u64), WorkflowError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WorkflowError::Busy);
        }
        let guard = BusyGuard(&self.busy);

        let mut state = self.state.lock().await;
        state.last_error = None;
        Ok((guard, self.epoch.load(Ordering::Acquire)))
    }

    /// Applies `update` unless a reset happened since `epoch` was read.
    async fn commit<F>(&self, epoch: u64, update: F) -> Result<(), WorkflowError>
    where
        F: FnOnce(&mut PipelineState) -> Result<(), WorkflowError>,
    {
        let mut state = self.state.lock().await;
        if self.epoch.load(Ordering::Acquire) != epoch {
            warn!(
                "Discarding result for user {}: session was reset",
                self.identity().user_id()
            );
            return Err(WorkflowError::Cancelled);
        }
        update(&mut state)?;
        debug_assert!(state.is_consistent(), "stage outputs out of sync: {state:?}");
        Ok(())
    }

    /// Records a failure in `last_error`, unless the session has moved on since.
    async fn settle<T>(
        &self,
        epoch: u64,
        outcome: Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        match &outcome {
            Ok(_) | Err(WorkflowError::Cancelled) => {}
            Err(e) => {
                let mut state = self.state.lock().await;
                if self.epoch.load(Ordering::Acquire) == epoch {
                    warn!(
                        "Operation failed for user {} at {:?}: {}",
                        self.identity().user_id(),
                        state.stage,
                        e
                    );
                    state.last_error = Some(e.to_string());
                }
            }
        }
        outcome
    }
}

fn check_length(field: &str, text: &str) -> Result<(), WorkflowError> {
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(WorkflowError::Validation(format!(
            "The {field} is {chars} characters long; the limit is {MAX_TEXT_CHARS}."
        )));
    }
    Ok(())
}
