use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::careers::input::NewApplication;
use crate::careers::upload::StoredResume;
use crate::models::application::{
    ApplicationDetail, ApplicationRow, ApplicationSummary, EducationRow, ExperienceRow, ResumeRef,
};

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// The `(email, position)` key was taken by a concurrent submission.
    Duplicate,
}

/// A deleted application's résumé path, if it had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedApplication {
    pub resume_path: Option<String>,
}

/// Persistence seam for the careers workflow.
///
/// `insert` and `delete` are each all-or-nothing.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn find_by_business_key(
        &self,
        email: &str,
        position: &str,
    ) -> Result<Option<i64>, sqlx::Error>;

    async fn insert(
        &self,
        application: &NewApplication,
        resume: Option<&StoredResume>,
    ) -> Result<InsertOutcome, sqlx::Error>;

    async fn list(&self) -> Result<Vec<ApplicationSummary>, sqlx::Error>;

    async fn get(&self, id: i64) -> Result<Option<ApplicationDetail>, sqlx::Error>;

    async fn resume_ref(&self, id: i64) -> Result<Option<ResumeRef>, sqlx::Error>;

    async fn delete(&self, id: i64) -> Result<Option<DeletedApplication>, sqlx::Error>;
}

pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn find_by_business_key(
        &self,
        email: &str,
        position: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM applications WHERE email = $1 AND position_applied = $2 LIMIT 1",
        )
        .bind(email)
        .bind(position)
        .fetch_optional(&self.pool)
        .await
    }

    async fn insert(
        &self,
        application: &NewApplication,
        resume: Option<&StoredResume>,
    ) -> Result<InsertOutcome, sqlx::Error> {
        // Dropping `tx` on any early return rolls the whole insert back.
        let mut tx = self.pool.begin().await?;

        let inserted: Result<i64, sqlx::Error> = sqlx::query_scalar(
            r#"
            INSERT INTO applications
                (full_name, email, phone, position_applied, cover_letter,
                 resume_path, resume_original_name, resume_mime)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&application.full_name)
        .bind(&application.email)
        .bind(application.phone.as_deref())
        .bind(&application.position)
        .bind(application.cover_letter.as_deref())
        .bind(resume.map(|r| r.stored_path.to_string_lossy().into_owned()))
        .bind(resume.map(|r| r.original_name.as_str()))
        .bind(resume.map(|r| r.mime_type.as_str()))
        .fetch_one(&mut *tx)
        .await;

        let id = match inserted {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => return Ok(InsertOutcome::Duplicate),
            Err(e) => return Err(e),
        };

        if !application.experiences.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO experiences (application_id, company, role, years) ",
            );
            builder.push_values(&application.experiences, |mut b, exp| {
                b.push_bind(id)
                    .push_bind(exp.company.clone())
                    .push_bind(exp.role.clone())
                    .push_bind(exp.years.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        if !application.education.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO education (application_id, institution, degree, year) ",
            );
            builder.push_values(&application.education, |mut b, edu| {
                b.push_bind(id)
                    .push_bind(edu.institution.clone())
                    .push_bind(edu.degree.clone())
                    .push_bind(edu.year.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!(
            application_id = id,
            experiences = application.experiences.len(),
            education = application.education.len(),
            "Committed application rows"
        );
        Ok(InsertOutcome::Inserted(id))
    }

    async fn list(&self) -> Result<Vec<ApplicationSummary>, sqlx::Error> {
        sqlx::query_as::<_, ApplicationSummary>(
            r#"
            SELECT id, full_name, email, phone, position_applied, created_at
            FROM applications
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<ApplicationDetail>, sqlx::Error> {
        // One snapshot for the parent and both child reads.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let application = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT id, full_name, email, phone, position_applied, cover_letter,
                   resume_path, resume_original_name, resume_mime, created_at
            FROM applications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(application) = application else {
            tx.rollback().await?;
            return Ok(None);
        };

        let experiences = sqlx::query_as::<_, ExperienceRow>(
            "SELECT company, role, years FROM experiences WHERE application_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let education = sqlx::query_as::<_, EducationRow>(
            "SELECT institution, degree, year FROM education WHERE application_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(ApplicationDetail {
            application,
            experiences,
            education,
        }))
    }

    async fn resume_ref(&self, id: i64) -> Result<Option<ResumeRef>, sqlx::Error> {
        sqlx::query_as::<_, ResumeRef>(
            "SELECT resume_path, resume_original_name, resume_mime FROM applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete(&self, id: i64) -> Result<Option<DeletedApplication>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let resume_path: Option<Option<String>> =
            sqlx::query_scalar("SELECT resume_path FROM applications WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(resume_path) = resume_path else {
            tx.rollback().await?;
            return Ok(None);
        };

        // experiences / education rows go with it via ON DELETE CASCADE
        sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(DeletedApplication { resume_path }))
    }
}
