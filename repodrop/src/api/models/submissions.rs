use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Path components the contents API would resolve or collapse instead of storing literally.
fn is_unstorable_component(component: &str) -> bool {
    matches!(component, "" | "." | "..")
}

/// Form fields of a submission.
///
/// Every field is optional at the decoding stage so that missing fields produce a validation
/// error with a useful message instead of a generic decoding failure. When a field is sent more
/// than once, the first value wins.
#[derive(Debug, Default, Clone, ToSchema)]
pub struct SubmissionForm {
    /// Project the submission belongs to; first path component under `data/`
    pub project_name: Option<String>,
    /// Submitting user; second path component
    pub user_name: Option<String>,
    /// File name (without extension) inside the user's folder; may contain `/`
    pub directory: Option<String>,
    /// Payload. Parsed as JSON when the declared content type is JSON, stored verbatim otherwise.
    pub data: Option<String>,
}

/// Validated identifiers of a submission, borrowed from the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionTarget<'a> {
    pub project_name: &'a str,
    pub user_name: &'a str,
    pub directory: &'a str,
}

impl SubmissionForm {
    /// Build a form from decoded `(name, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut form = Self::default();
        for (name, value) in pairs {
            form.set_field(&name, value);
        }
        form
    }

    /// Record a named form field, ignoring fields this endpoint does not know and repeats of
    /// fields already set.
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "project_name" => &mut self.project_name,
            "user_name" => &mut self.user_name,
            "directory" => &mut self.directory,
            "data" => &mut self.data,
            _ => return,
        };
        slot.get_or_insert(value);
    }

    /// Require `project_name`, `user_name` and `directory` to be present and non-empty.
    ///
    /// `/` inside a field nests folders, but empty, `.` and `..` components are rejected: the
    /// stored path must be exactly `data/{project_name}/{user_name}/{directory}.{ext}`.
    pub fn target(&self) -> Result<SubmissionTarget<'_>> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|v| !v.is_empty())
        }

        let (Some(project_name), Some(user_name), Some(directory)) =
            (present(&self.project_name), present(&self.user_name), present(&self.directory))
        else {
            return Err(Error::BadRequest {
                message: "Missing project, user, or directory name.".to_string(),
            });
        };

        if [project_name, user_name, directory]
            .into_iter()
            .flat_map(|field| field.split('/'))
            .any(is_unstorable_component)
        {
            return Err(Error::BadRequest {
                message: "Project, user, and directory names must not contain empty, '.' or '..' path segments."
                    .to_string(),
            });
        }

        Ok(SubmissionTarget {
            project_name,
            user_name,
            directory,
        })
    }

    /// Submitted payload; an absent `data` field counts as empty.
    pub fn data(&self) -> &str {
        self.data.as_deref().unwrap_or_default()
    }
}

/// Response for a successfully stored submission
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmissionCreated {
    pub message: String,
    /// Browser URL of the stored file in the remote repository
    pub file_url: String,
    /// Extension the payload was stored under
    pub file_type: String,
}

/// Error body returned by every failing request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
