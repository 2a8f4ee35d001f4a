use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;

/// Multipart field carrying the résumé attachment.
pub const RESUME_FIELD: &str = "resume";

/// Largest résumé accepted, in bytes (5 MiB).
pub const MAX_RESUME_BYTES: u64 = 5 * 1024 * 1024;

const FALLBACK_FILE_NAME: &str = "resume";
const FALLBACK_MIME: &str = "application/octet-stream";

/// A résumé written to the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResume {
    pub stored_path: PathBuf,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// A stored résumé whose application row has not been committed yet.
///
/// Exactly one of [`finalize`](Self::finalize) (row committed, keep the file)
/// or [`abort`](Self::abort) (row rejected, delete the file) settles it.
/// Dropping an unsettled value deletes the file synchronously.
#[derive(Debug)]
pub struct TentativeResume {
    resume: StoredResume,
    settled: bool,
}

impl TentativeResume {
    pub(crate) fn new(resume: StoredResume) -> Self {
        Self {
            resume,
            settled: false,
        }
    }

    pub fn resume(&self) -> &StoredResume {
        &self.resume
    }

    /// Keeps the file; its path is now owned by a committed row.
    pub fn finalize(mut self) -> StoredResume {
        self.settled = true;
        self.resume.clone()
    }

    /// Deletes the file. Failures are logged, never returned.
    pub async fn abort(mut self) {
        self.settled = true;
        if let Err(e) = remove_stored_file(&self.resume.stored_path).await {
            warn!(
                path = %self.resume.stored_path.display(),
                "Could not remove orphaned resume: {e}"
            );
        } else {
            debug!(path = %self.resume.stored_path.display(), "Removed orphaned resume");
        }
    }
}

impl Drop for TentativeResume {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match std::fs::remove_file(&self.resume.stored_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.resume.stored_path.display(),
                "Could not remove unsettled resume: {e}"
            ),
        }
    }
}

/// Removes a stored résumé. A file that is already gone is not an error.
pub async fn remove_stored_file(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// The parts of an `/apply` request: text fields plus an optional résumé.
#[derive(Debug, Default)]
pub struct ApplicationUpload {
    pub fields: HashMap<String, String>,
    pub resume: Option<TentativeResume>,
}

/// Receives résumé uploads into a local directory.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl ResumeStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            max_bytes: MAX_RESUME_BYTES,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Reads every part of the request, storing at most one résumé.
    ///
    /// On any failure the résumé written so far is deleted before returning.
    pub async fn receive(&self, mut multipart: Multipart) -> Result<ApplicationUpload, AppError> {
        let mut upload = ApplicationUpload::default();
        if let Err(e) = self.read_parts(&mut multipart, &mut upload).await {
            if let Some(resume) = upload.resume.take() {
                resume.abort().await;
            }
            return Err(e);
        }
        Ok(upload)
    }

    async fn read_parts(
        &self,
        multipart: &mut Multipart,
        upload: &mut ApplicationUpload,
    ) -> Result<(), AppError> {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == RESUME_FIELD {
                if upload.resume.is_some() {
                    return Err(AppError::InvalidInput(
                        "only one resume file may be uploaded".to_string(),
                    ));
                }
                upload.resume = self.store_field(field).await?;
            } else {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidInput(format!("Invalid {name}: {}", e.body_text()))
                })?;
                upload.fields.insert(name, value);
            }
        }
        Ok(())
    }

    async fn store_field(&self, mut field: Field<'_>) -> Result<Option<TentativeResume>, AppError> {
        let supplied_name = field.file_name().unwrap_or_default().trim().to_string();
        let mime_type = field
            .content_type()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(FALLBACK_MIME)
            .to_string();

        self.ensure_dir().await?;
        let stored_path = self.dir.join(stored_file_name(&supplied_name));
        let mut file = tokio::fs::File::create(&stored_path).await?;
        let mut tentative = TentativeResume::new(StoredResume {
            stored_path,
            original_name: if supplied_name.is_empty() {
                FALLBACK_FILE_NAME.to_string()
            } else {
                supplied_name.clone()
            },
            mime_type,
            size_bytes: 0,
        });

        let mut size: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            size += chunk.len() as u64;
            if size > self.max_bytes {
                drop(file);
                tentative.abort().await;
                return Err(AppError::PayloadTooLarge(format!(
                    "resume exceeds maximum upload size of {} bytes",
                    self.max_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        // An empty file input still submits a nameless, zero-byte part.
        if size == 0 && supplied_name.is_empty() {
            tentative.abort().await;
            return Ok(None);
        }

        tentative.resume.size_bytes = size;
        debug!(
            path = %tentative.resume.stored_path.display(),
            size_bytes = size,
            "Stored resume upload"
        );
        Ok(Some(tentative))
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::InvalidInput(format!("Invalid multipart data: {}", e.body_text()))
    }
}

/// `<unix millis>-<8 hex chars>-<sanitized name>`
pub fn stored_file_name(original: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        &token[..8],
        sanitize_file_name(original)
    )
}

/// Reduces a client-supplied file name to a single safe path component.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let mut out = String::with_capacity(base.len());
    let mut in_whitespace = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        }
    }

    let trimmed = out.trim_matches('.');
    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
