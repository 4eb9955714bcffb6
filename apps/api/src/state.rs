use crate::analysis_client::AnalysisClient;
use crate::extraction::TextExtractor;
use crate::session::{SessionIdentity, SessionStore};
use crate::workflow::Workflow;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    /// Base client; each session gets a copy bound to its identity.
    pub analysis: AnalysisClient,
    pub extractor: TextExtractor,
}

impl AppState {
    pub fn new(analysis: AnalysisClient, extractor: TextExtractor) -> Self {
        Self {
            sessions: SessionStore::new(),
            analysis,
            extractor,
        }
    }

    /// Builds a fresh workflow for a new session.
    pub fn workflow_for(&self, identity: SessionIdentity) -> Workflow {
        Workflow::new(self.analysis.for_session(identity), self.extractor.clone())
    }
}
