//! OpenAPI documentation configuration
//!
//! Configures utoipa to generate an OpenAPI 3.0 specification for the survey
//! engine's HTTP surface. The generated spec is served via Swagger UI and as
//! raw JSON, both mounted by `routes::create_router`.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the survey engine
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Survey Engine API",
        version = "1.0.0",
        description = "REST API over a dependency-driven survey engine: DisplayKey-addressed navigation, answer persistence, and SHOW/REPEAT/TEXT relationship propagation."
    ),
    servers(
        (url = "/api", description = "API base path")
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "respondents", description = "Public façade: init, navigate, saveAnswer, finalize, removeDeleted")
    ),
    paths(
        crate::openapi::paths::health_check,
        crate::openapi::paths::health_check_db,
        crate::openapi::paths::init_respondent,
        crate::openapi::paths::navigate,
        crate::openapi::paths::save_answer,
        crate::openapi::paths::finalize,
        crate::openapi::paths::remove_deleted,
    ),
    components(
        schemas(
            schemas::ErrorResponse,
            schemas::HealthResponse,
            schemas::DbHealthResponse,
            schemas::InitRequest,
            schemas::NavigateQuery,
            schemas::SaveAnswerRequest,
            schemas::StatusResponse,
            schemas::NavResponse,
            schemas::NavigationItem,
            schemas::Answer,
            schemas::Respondent,
        )
    )
)]
pub struct ApiDoc;

/// Schema definitions for OpenAPI
pub mod schemas {
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;

    /// Standard error response
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct ErrorResponse {
        /// Machine-readable error code
        #[schema(example = "malformed_key")]
        pub error: String,
        /// Human-readable error message
        #[schema(example = "display key is malformed")]
        pub message: String,
        /// Optional field-level error details
        #[serde(skip_serializing_if = "Option::is_none")]
        pub details: Option<std::collections::HashMap<String, Vec<String>>>,
    }

    /// Basic health check response
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct HealthResponse {
        #[schema(example = "ok")]
        pub status: String,
        pub timestamp: String,
        pub version: String,
    }

    /// Database connectivity health response
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct DbHealthResponse {
        #[schema(example = "ok")]
        pub status: String,
        #[schema(example = "connected")]
        pub database: String,
        pub timestamp: String,
    }

    /// Request body for initializing a respondent at a starting DisplayKey
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct InitRequest {
        #[schema(example = "0001-0001-0000-0001-0000-0000-0000")]
        pub initial_display_key: String,
    }

    /// Query parameters for navigating to a section
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct NavigateQuery {
        #[schema(example = "0001-0001-0000-0001-0000-0000-0000")]
        pub section_display_key: String,
    }

    /// Request body for saving an answer
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct SaveAnswerRequest {
        #[schema(example = "0001-0001-0000-0001-0000-0001-0001")]
        pub display_key: String,
        pub text_value: Option<String>,
    }

    /// Generic acknowledgement response
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct StatusResponse {
        pub ok: bool,
    }

    /// A single entry in a section's navigation bar
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct NavigationItem {
        pub name: String,
        pub path: String,
        pub previous: Option<String>,
        pub next: Option<String>,
    }

    /// A persisted answer row
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct Answer {
        pub id: i64,
        pub respondent_id: i64,
        pub display_key: String,
        pub display_text: String,
        pub text_value: Option<String>,
        pub deleted: bool,
    }

    /// A survey respondent
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct Respondent {
        pub id: i64,
        pub survey_id: i64,
        pub active: bool,
        pub logins: i32,
        pub finalized_at: Option<String>,
    }

    /// The response returned by navigate/saveAnswer: the current section's
    /// navigation item, its answers, and the full navigation bar.
    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct NavResponse {
        pub step: String,
        pub current_nav_item: Option<NavigationItem>,
        pub answers: Vec<Answer>,
        pub nav_items: Vec<NavigationItem>,
    }
}

/// `utoipa::path` declarations describing the live handlers in `routes::health`
/// and `routes::respondents`. These functions are never called; utoipa only
/// reads their attribute macro to build the spec.
pub mod paths {
    #[allow(unused_imports)]
    use super::schemas::*;

    /// Basic health check
    #[utoipa::path(
        get,
        path = "/health",
        tag = "health",
        responses(
            (status = 200, description = "Service is healthy", body = HealthResponse)
        )
    )]
    pub async fn health_check() {}

    /// Database health check
    #[utoipa::path(
        get,
        path = "/health/db",
        tag = "health",
        responses(
            (status = 200, description = "Database is connected", body = DbHealthResponse),
            (status = 503, description = "Database is disconnected", body = DbHealthResponse)
        )
    )]
    pub async fn health_check_db() {}

    /// Initialize a respondent at a starting DisplayKey
    #[utoipa::path(
        post,
        path = "/respondents/{respondent_id}/init",
        tag = "respondents",
        params(
            ("respondent_id" = i64, Path, description = "Respondent id")
        ),
        request_body = InitRequest,
        responses(
            (status = 200, description = "Respondent initialized", body = StatusResponse),
            (status = 400, description = "Malformed display key", body = ErrorResponse),
            (status = 404, description = "Unknown respondent", body = ErrorResponse)
        )
    )]
    pub async fn init_respondent() {}

    /// Navigate to a section, returning its answers and the navigation bar
    #[utoipa::path(
        get,
        path = "/respondents/{respondent_id}/navigate",
        tag = "respondents",
        params(
            ("respondent_id" = i64, Path, description = "Respondent id"),
            ("section_display_key" = String, Query, description = "DisplayKey of the section to navigate to")
        ),
        responses(
            (status = 200, description = "Section resolved", body = NavResponse),
            (status = 400, description = "Malformed display key", body = ErrorResponse),
            (status = 404, description = "Unknown respondent or section", body = ErrorResponse)
        )
    )]
    pub async fn navigate() {}

    /// Save an answer and propagate any SHOW/REPEAT/TEXT relationships it triggers
    #[utoipa::path(
        post,
        path = "/respondents/{respondent_id}/answers",
        tag = "respondents",
        params(
            ("respondent_id" = i64, Path, description = "Respondent id")
        ),
        request_body = SaveAnswerRequest,
        responses(
            (status = 200, description = "Answer saved, relationships propagated", body = NavResponse),
            (status = 400, description = "Malformed display key or invalid value", body = ErrorResponse),
            (status = 404, description = "Unknown respondent or answer", body = ErrorResponse)
        )
    )]
    pub async fn save_answer() {}

    /// Finalize a respondent, marking their submission complete
    #[utoipa::path(
        post,
        path = "/respondents/{respondent_id}/finalize",
        tag = "respondents",
        params(
            ("respondent_id" = i64, Path, description = "Respondent id")
        ),
        responses(
            (status = 200, description = "Respondent finalized", body = Respondent),
            (status = 404, description = "Unknown respondent", body = ErrorResponse)
        )
    )]
    pub async fn finalize() {}

    /// Permanently remove this respondent's soft-deleted answers
    #[utoipa::path(
        post,
        path = "/respondents/{respondent_id}/remove-deleted",
        tag = "respondents",
        params(
            ("respondent_id" = i64, Path, description = "Respondent id")
        ),
        responses(
            (status = 200, description = "Soft-deleted answers purged", body = StatusResponse),
            (status = 404, description = "Unknown respondent", body = ErrorResponse)
        )
    )]
    pub async fn remove_deleted() {}
}

/// Mounts Swagger UI at `/api/docs` and the raw spec at `/api/openapi.json`.
///
/// `routes::create_router` merges this directly; this standalone helper exists
/// for callers (e.g. a static-doc generation binary) that want the docs router
/// without the rest of the application mounted.
pub fn swagger_routes() -> Router {
    Router::new().merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
}

/// Get the OpenAPI specification as a JSON string
pub fn get_openapi_spec() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .expect("failed to serialize OpenAPI spec")
}

/// Get the OpenAPI specification as a YAML string
pub fn get_openapi_spec_yaml() -> String {
    ApiDoc::openapi()
        .to_yaml()
        .expect("failed to serialize OpenAPI spec to YAML")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();

        assert_eq!(spec.info.title, "Survey Engine API");

        let tags = spec.tags.as_ref().expect("tags should be present");
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert!(tag_names.contains(&"health"));
        assert!(tag_names.contains(&"respondents"));

        let paths = &spec.paths;
        assert!(paths.paths.contains_key("/health"));
        assert!(paths.paths.contains_key("/respondents/{respondent_id}/init"));
        assert!(paths.paths.contains_key("/respondents/{respondent_id}/navigate"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_spec();

        let parsed: serde_json::Value =
            serde_json::from_str(&json).expect("should be valid JSON");

        assert!(parsed["openapi"].as_str().is_some());
        assert!(parsed["info"]["title"].as_str().is_some());
        assert!(parsed["paths"].is_object());
        assert!(parsed["components"]["schemas"].is_object());
    }

    #[test]
    fn test_openapi_yaml_serialization() {
        let yaml = get_openapi_spec_yaml();

        assert!(!yaml.is_empty());
        assert!(yaml.contains("openapi:"));
        assert!(yaml.contains("Survey Engine API"));
    }

    #[test]
    fn test_swagger_routes_creation() {
        let _routes = swagger_routes();
    }
}
