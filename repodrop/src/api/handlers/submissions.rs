use crate::AppState;
use crate::api::models::submissions::{ErrorResponse, SubmissionCreated, SubmissionForm};
use crate::content::{self, DEFAULT_CONTENT_TYPE};
use crate::errors::{Error, Result};
use crate::store::PutFile;
use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header},
};
use tracing::{debug, info, instrument};

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Decode the submission fields from the request body. Repeated fields keep their first value.
///
/// The declared content type only selects the transport encoding when it is
/// `multipart/form-data`; any other value is a classification key and the body is read as
/// `application/x-www-form-urlencoded`.
async fn decode_form(declared_type: &str, body: Bytes) -> Result<SubmissionForm> {
    if content::essence(declared_type) != MULTIPART_FORM_DATA {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body).map_err(|e| Error::BadRequest {
            message: format!("Failed to parse form data: {e}"),
        })?;
        return Ok(SubmissionForm::from_pairs(pairs));
    }

    let boundary = multer::parse_boundary(declared_type).map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })?;
    let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = SubmissionForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field.text().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read field '{name}': {e}"),
        })?;
        form.set_field(&name, value);
    }

    Ok(form)
}

#[utoipa::path(
    post,
    path = "/post-data",
    tag = "submissions",
    summary = "Store a submission",
    description = "Store the `data` field as a file at `data/{project_name}/{user_name}/{directory}.{ext}` in the \
        configured GitHub repository. The `Content-Type` header picks the extension; JSON content types require \
        `data` to be valid JSON. Fields may be sent urlencoded or as multipart/form-data.",
    request_body(
        content = SubmissionForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Submission fields"
    ),
    responses(
        (status = 201, description = "File written to the repository", body = SubmissionCreated),
        (status = 400, description = "Missing fields, invalid path segments or malformed JSON payload", body = ErrorResponse),
        (status = 413, description = "Request body exceeds the configured limit", body = ErrorResponse),
        (status = 500, description = "Missing token, GitHub API error, or unexpected failure", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(content_type = tracing::field::Empty, path = tracing::field::Empty))]
pub async fn post_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<SubmissionCreated>)> {
    // Without a token no write can succeed; fail before looking at the payload
    let store = state.store.clone().ok_or_else(|| Error::ConfigurationMissing {
        what: "GitHub token".to_string(),
    })?;

    let body = body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => Error::PayloadTooLarge {
            message: format!(
                "Request body exceeds maximum allowed size of {} bytes",
                state.config.max_body_size
            ),
        },
        _ => Error::BadRequest {
            message: rejection.body_text(),
        },
    })?;

    let declared_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    tracing::Span::current().record("content_type", declared_type);

    let form = decode_form(declared_type, body).await?;
    let target = form.target()?;

    let classified = content::classify(declared_type, form.data())?;
    let path = content::storage_path(target.project_name, target.user_name, target.directory, classified.extension);
    tracing::Span::current().record("path", path.as_str());
    debug!(kind = ?classified.kind, bytes = classified.bytes.len(), "Classified submission");

    let stored = store
        .put_file(PutFile {
            path,
            message: format!(
                "Add or update {} file for {}/{}",
                classified.extension, target.project_name, target.user_name
            ),
            content: classified.bytes,
        })
        .await?;

    info!(file_url = %stored.html_url, sha = ?stored.sha, "Submission stored");

    Ok((
        StatusCode::CREATED,
        Json(SubmissionCreated {
            message: "File successfully saved to GitHub.".to_string(),
            file_url: stored.html_url,
            file_type: classified.extension.to_string(),
        }),
    ))
}
