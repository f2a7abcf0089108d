//! OpenAPI documentation, served at `/openapi.json` and rendered at `/docs`.

use crate::api::handlers::submissions;
use crate::api::models::submissions::{ErrorResponse, SubmissionCreated, SubmissionForm};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "repodrop",
        description = "Stores form submissions as files in a GitHub repository."
    ),
    paths(submissions::post_data),
    components(schemas(SubmissionForm, SubmissionCreated, ErrorResponse)),
    tags((name = "submissions", description = "Submission intake"))
)]
pub struct ApiDoc;
