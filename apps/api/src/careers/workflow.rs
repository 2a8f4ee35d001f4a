use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::careers::input::NewApplication;
use crate::careers::repository::{ApplicationStore, InsertOutcome};
use crate::careers::upload::{remove_stored_file, TentativeResume};
use crate::errors::AppError;
use crate::models::application::{ApplicationDetail, ApplicationSummary};

/// Download name used when the upload never recorded one.
pub const FALLBACK_DOWNLOAD_NAME: &str = "resume.pdf";
const FALLBACK_DOWNLOAD_MIME: &str = "application/octet-stream";

pub const NOT_FOUND_MESSAGE: &str = "Not found";
pub const RESUME_NOT_FOUND_MESSAGE: &str = "Resume not found";
pub const APPLICATION_NOT_FOUND_MESSAGE: &str = "Application not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(i64),
    /// Same `(email, position)` already on file. Not an error.
    AlreadyApplied,
}

/// An opened résumé ready to stream.
#[derive(Debug)]
pub struct ResumeDownload {
    pub file: tokio::fs::File,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Orchestrates the job-application operations over an [`ApplicationStore`]
/// and the résumé files on disk.
#[derive(Clone)]
pub struct CareersWorkflow {
    store: Arc<dyn ApplicationStore>,
}

impl CareersWorkflow {
    pub fn new(store: Arc<dyn ApplicationStore>) -> Self {
        Self { store }
    }

    /// Records a new application unless one exists for the same email and position.
    ///
    /// The résumé, if any, is kept only when the rows commit; duplicates and
    /// failures delete it. Once the insert starts it runs to completion even
    /// if the caller stops waiting.
    pub async fn submit(
        &self,
        application: NewApplication,
        resume: Option<TentativeResume>,
    ) -> Result<SubmitOutcome, AppError> {
        let existing = match self
            .store
            .find_by_business_key(&application.email, &application.position)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                discard(resume).await;
                return Err(AppError::Database(e));
            }
        };

        if let Some(existing_id) = existing {
            info!(
                existing_id,
                email = %application.email,
                position = %application.position,
                "Duplicate application ignored"
            );
            discard(resume).await;
            return Ok(SubmitOutcome::AlreadyApplied);
        }

        // The insert and the file's fate are settled in their own task. Dropping
        // the request future after the commit must not delete a referenced file.
        let store = Arc::clone(&self.store);
        let settle = tokio::spawn(async move {
            let inserted = store
                .insert(&application, resume.as_ref().map(TentativeResume::resume))
                .await;
            match (&inserted, resume) {
                (Ok(InsertOutcome::Inserted(_)), Some(resume)) => {
                    resume.finalize();
                }
                (_, resume) => discard(resume).await,
            }
            (application, inserted)
        });
        let (application, inserted) = settle
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("submit task failed: {e}")))?;

        match inserted {
            Ok(InsertOutcome::Inserted(id)) => {
                info!(
                    application_id = id,
                    email = %application.email,
                    position = %application.position,
                    experiences = application.experiences.len(),
                    education = application.education.len(),
                    "Application submitted"
                );
                Ok(SubmitOutcome::Created(id))
            }
            Ok(InsertOutcome::Duplicate) => {
                info!(
                    email = %application.email,
                    position = %application.position,
                    "Concurrent duplicate application rejected by unique key"
                );
                Ok(SubmitOutcome::AlreadyApplied)
            }
            Err(e) => {
                error!(
                    email = %application.email,
                    position = %application.position,
                    "Error submitting application: {e}"
                );
                Err(AppError::Database(e))
            }
        }
    }

    /// All applications, newest first.
    pub async fn list(&self) -> Result<Vec<ApplicationSummary>, AppError> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: i64) -> Result<ApplicationDetail, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND_MESSAGE.to_string()))
    }

    /// Opens the résumé for `id`.
    ///
    /// A row that points at a file no longer on disk is reported separately
    /// from a row with no résumé at all.
    pub async fn resume_download(&self, id: i64) -> Result<ResumeDownload, AppError> {
        let resume = self.store.resume_ref(id).await?;
        let Some((path, original_name, mime)) = resume.and_then(|r| {
            r.resume_path
                .map(|path| (path, r.resume_original_name, r.resume_mime))
        }) else {
            return Err(AppError::NotFound(RESUME_NOT_FOUND_MESSAGE.to_string()));
        };

        let path = PathBuf::from(path);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(missing_on_server(id, &path)),
            Err(e) => return Err(AppError::Storage(e)),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(missing_on_server(id, &path));
        }

        Ok(ResumeDownload {
            file,
            file_name: original_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string()),
            mime_type: mime
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_DOWNLOAD_MIME.to_string()),
            size_bytes: metadata.len(),
        })
    }

    /// Deletes the application, then its résumé file.
    ///
    /// File removal happens after the commit and its failure only logs.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let deleted = self
            .store
            .delete(id)
            .await?
            .ok_or_else(|| AppError::NotFound(APPLICATION_NOT_FOUND_MESSAGE.to_string()))?;

        info!(application_id = id, "Application deleted");

        if let Some(path) = deleted.resume_path {
            if let Err(e) = remove_stored_file(Path::new(&path)).await {
                warn!(application_id = id, path = %path, "Could not remove file: {e}");
            }
        }
        Ok(())
    }
}

async fn discard(resume: Option<TentativeResume>) {
    if let Some(resume) = resume {
        resume.abort().await;
    }
}

fn missing_on_server(id: i64, path: &Path) -> AppError {
    warn!(
        application_id = id,
        path = %path.display(),
        "Resume referenced by application is missing on disk"
    );
    AppError::NotFound("File missing on server".to_string())
}
