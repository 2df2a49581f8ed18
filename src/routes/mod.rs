//! Route definitions module
//!
//! Defines all API routes and their handlers.
//! All routes are nested under /api prefix via the create_router function.

pub mod health;
pub mod respondents;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create the main application router with all routes nested under /api
///
/// - /api/health -> health routes (basic health check, db connectivity)
/// - /api/respondents -> the public façade: init, navigate, saveAnswer,
///   finalize, removeDeleted, scoped to a respondent id
/// - /api/docs -> Swagger UI for API documentation
/// - /api/openapi.json -> OpenAPI specification JSON
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/health", health::routes())
        .nest("/api/respondents", respondents::routes())
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn test_module_exports() {
        // Verify all modules are accessible
        // This is a compile-time check that all modules exist
    }
}
