use crate::careers::upload::ResumeStore;
use crate::careers::workflow::CareersWorkflow;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub workflow: CareersWorkflow,
    /// Upload directory for résumé attachments.
    pub resumes: ResumeStore,
}
