use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::AppError;

/// Longest accepted value for the free-form `years` / `year` columns.
pub const MAX_YEAR_LEN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExperienceInput {
    #[serde(default, deserialize_with = "text_or_number")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub years: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EducationInput {
    #[serde(default, deserialize_with = "text_or_number")]
    pub institution: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub degree: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub year: Option<String>,
}

impl ExperienceInput {
    fn is_blank(&self) -> bool {
        self.company.is_none() && self.role.is_none() && self.years.is_none()
    }
}

impl EducationInput {
    fn is_blank(&self) -> bool {
        self.institution.is_none() && self.degree.is_none() && self.year.is_none()
    }
}

/// A validated job application, minus the résumé attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: String,
    pub cover_letter: Option<String>,
    pub experiences: Vec<ExperienceInput>,
    pub education: Vec<EducationInput>,
}

impl NewApplication {
    /// Builds an application from the text parts of the `/apply` form.
    ///
    /// `experience` and `education` carry JSON arrays serialized into a form
    /// field; a missing or blank field is an empty list.
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self, AppError> {
        let full_name = required(fields, "fullName")?;
        let email = required(fields, "email")?;
        if !email.contains('@') {
            return Err(AppError::InvalidInput(format!(
                "email '{email}' is not a valid address"
            )));
        }
        let position = required(fields, "position")?;

        let experiences: Vec<ExperienceInput> = parse_records(fields, "experience")?;
        let education: Vec<EducationInput> = parse_records(fields, "education")?;

        for (i, exp) in experiences.iter().enumerate() {
            check_year_len("experience", i, exp.years.as_deref())?;
        }
        for (i, edu) in education.iter().enumerate() {
            check_year_len("education", i, edu.year.as_deref())?;
        }

        Ok(NewApplication {
            full_name,
            email,
            phone: optional(fields, "phone"),
            position,
            cover_letter: optional(fields, "coverLetter"),
            experiences: experiences.into_iter().filter(|e| !e.is_blank()).collect(),
            education: education.into_iter().filter(|e| !e.is_blank()).collect(),
        })
    }
}

fn required(fields: &HashMap<String, String>, name: &str) -> Result<String, AppError> {
    optional(fields, name).ok_or_else(|| AppError::InvalidInput(format!("{name} is required")))
}

fn optional(fields: &HashMap<String, String>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn parse_records<T>(fields: &HashMap<String, String>, name: &str) -> Result<Vec<T>, AppError>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(raw) = optional(fields, name) else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&raw).map_err(|e| {
        AppError::InvalidInput(format!("{name} must be a JSON array of objects: {e}"))
    })
}

fn check_year_len(field: &str, index: usize, value: Option<&str>) -> Result<(), AppError> {
    match value {
        Some(v) if v.chars().count() > MAX_YEAR_LEN => Err(AppError::InvalidInput(format!(
            "{field}[{index}] year value exceeds {MAX_YEAR_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

/// Accepts a JSON string or number, trimming text and mapping blanks to `None`.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected text or number, found {other}"
        ))),
    }
}
