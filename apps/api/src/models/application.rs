use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position_applied: String,
    pub cover_letter: Option<String>,
    pub resume_path: Option<String>,
    pub resume_original_name: Option<String>,
    pub resume_mime: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing projection of an application, without cover letter or résumé details.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationSummary {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position_applied: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ExperienceRow {
    pub company: Option<String>,
    pub role: Option<String>,
    pub years: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EducationRow {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub year: Option<String>,
}

/// An application together with the child rows inserted alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetail {
    pub application: ApplicationRow,
    pub experiences: Vec<ExperienceRow>,
    pub education: Vec<EducationRow>,
}

/// Where an application's résumé lives and what to call it on download.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ResumeRef {
    pub resume_path: Option<String>,
    pub resume_original_name: Option<String>,
    pub resume_mime: Option<String>,
}
