//! In-memory `ApplicationStore` with failure injection, for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::careers::input::NewApplication;
use crate::careers::repository::{ApplicationStore, DeletedApplication, InsertOutcome};
use crate::careers::upload::StoredResume;
use crate::models::application::{
    ApplicationDetail, ApplicationRow, ApplicationSummary, EducationRow, ExperienceRow, ResumeRef,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    applications: Vec<ApplicationRow>,
    experiences: Vec<(i64, ExperienceRow)>,
    education: Vec<(i64, EducationRow)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Fail after the parent and experience rows are staged.
    fail_education_insert: AtomicBool,
    /// Make the duplicate pre-check miss, as a concurrent insert would.
    blind_duplicate_check: AtomicBool,
    /// Pause after an insert commits, before it returns.
    post_commit_delay: Mutex<Option<Duration>>,
}

fn injected(step: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected failure during {step}"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_education_insert(&self, fail: bool) {
        self.fail_education_insert.store(fail, Ordering::SeqCst);
    }

    pub fn blind_duplicate_check(&self, blind: bool) {
        self.blind_duplicate_check.store(blind, Ordering::SeqCst);
    }

    pub fn delay_after_commit(&self, delay: Duration) {
        *self.post_commit_delay.lock().unwrap() = Some(delay);
    }

    pub fn application_count(&self) -> usize {
        self.tables.lock().unwrap().applications.len()
    }

    /// Total experience and education rows across all applications.
    pub fn child_counts(&self) -> (usize, usize) {
        let tables = self.tables.lock().unwrap();
        (tables.experiences.len(), tables.education.len())
    }

    pub fn set_resume_path(&self, id: i64, path: &str) {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .applications
            .iter_mut()
            .find(|a| a.id == id)
            .expect("application exists");
        row.resume_path = Some(path.to_string());
        row.resume_original_name.get_or_insert_with(|| "cv.pdf".to_string());
        row.resume_mime
            .get_or_insert_with(|| "application/pdf".to_string());
    }

    /// Stages every row like a transaction: nothing lands in `tables` until every step succeeds.
    fn insert_rows(
        &self,
        application: &NewApplication,
        resume: Option<&StoredResume>,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .applications
            .iter()
            .any(|a| a.email == application.email && a.position_applied == application.position)
        {
            return Ok(InsertOutcome::Duplicate);
        }

        let id = tables.next_id + 1;
        let row = ApplicationRow {
            id,
            full_name: application.full_name.clone(),
            email: application.email.clone(),
            phone: application.phone.clone(),
            position_applied: application.position.clone(),
            cover_letter: application.cover_letter.clone(),
            resume_path: resume.map(|r| r.stored_path.to_string_lossy().into_owned()),
            resume_original_name: resume.map(|r| r.original_name.clone()),
            resume_mime: resume.map(|r| r.mime_type.clone()),
            created_at: Utc::now(),
        };
        let experiences: Vec<_> = application
            .experiences
            .iter()
            .map(|e| {
                (
                    id,
                    ExperienceRow {
                        company: e.company.clone(),
                        role: e.role.clone(),
                        years: e.years.clone(),
                    },
                )
            })
            .collect();

        if self.fail_education_insert.load(Ordering::SeqCst) {
            return Err(injected("education insert"));
        }

        let education: Vec<_> = application
            .education
            .iter()
            .map(|e| {
                (
                    id,
                    EducationRow {
                        institution: e.institution.clone(),
                        degree: e.degree.clone(),
                        year: e.year.clone(),
                    },
                )
            })
            .collect();

        tables.next_id = id;
        tables.applications.push(row);
        tables.experiences.extend(experiences);
        tables.education.extend(education);
        Ok(InsertOutcome::Inserted(id))
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn find_by_business_key(
        &self,
        email: &str,
        position: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        if self.blind_duplicate_check.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .applications
            .iter()
            .find(|a| a.email == email && a.position_applied == position)
            .map(|a| a.id))
    }

    async fn insert(
        &self,
        application: &NewApplication,
        resume: Option<&StoredResume>,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let outcome = self.insert_rows(application, resume)?;
        let delay = *self.post_commit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(outcome)
    }

    async fn list(&self) -> Result<Vec<ApplicationSummary>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<_> = tables
            .applications
            .iter()
            .map(|a| ApplicationSummary {
                id: a.id,
                full_name: a.full_name.clone(),
                email: a.email.clone(),
                phone: a.phone.clone(),
                position_applied: a.position_applied.clone(),
                created_at: a.created_at,
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<ApplicationDetail>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        let Some(application) = tables.applications.iter().find(|a| a.id == id).cloned() else {
            return Ok(None);
        };
        Ok(Some(ApplicationDetail {
            application,
            experiences: tables
                .experiences
                .iter()
                .filter(|(parent, _)| *parent == id)
                .map(|(_, row)| row.clone())
                .collect(),
            education: tables
                .education
                .iter()
                .filter(|(parent, _)| *parent == id)
                .map(|(_, row)| row.clone())
                .collect(),
        }))
    }

    async fn resume_ref(&self, id: i64) -> Result<Option<ResumeRef>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .applications
            .iter()
            .find(|a| a.id == id)
            .map(|a| ResumeRef {
                resume_path: a.resume_path.clone(),
                resume_original_name: a.resume_original_name.clone(),
                resume_mime: a.resume_mime.clone(),
            }))
    }

    async fn delete(&self, id: i64) -> Result<Option<DeletedApplication>, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let Some(pos) = tables.applications.iter().position(|a| a.id == id) else {
            return Ok(None);
        };
        let removed = tables.applications.remove(pos);
        tables.experiences.retain(|(parent, _)| *parent != id);
        tables.education.retain(|(parent, _)| *parent != id);
        Ok(Some(DeletedApplication {
            resume_path: removed.resume_path,
        }))
    }
}
