pub mod common;
pub mod resource;

pub use common::common_routes;
pub use resource::resource_routes;

use crate::error::{expose_error_details, AppError};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, OriginalUri},
    middleware,
    routing::get,
    Json, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Unmatched paths and unsupported methods on known paths.
pub(crate) async fn unknown_route(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::BadRequest(format!("Can't find this route: {}", uri.path()))
}

/// Full application: common routes, `/api/v1` resources, `/uploads` static files and the layer stack.
pub fn app_router(state: AppState) -> Router {
    let settings = state.settings.clone();
    let mut router = Router::new()
        .merge(common_routes(state.clone()))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", resource_routes(state))
        .method_not_allowed_fallback(unknown_route)
        .nest_service("/uploads", ServeDir::new(&settings.upload_dir))
        .fallback(unknown_route);

    if settings.environment.is_development() {
        router = router.layer(middleware::from_fn(expose_error_details));
    }

    router
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
