//! Resource CRUD handlers: one set of handlers for every registered resource, resolved by path.

use crate::config::ResourceDescriptor;
use crate::error::{AppError, ErrorBody};
use crate::extractors::RawPayload;
use crate::query::{QueryBuilder, QueryRequest};
use crate::response::{success_many, success_one, success_one_ok, DocumentBody, SuccessMany, SuccessOne};
use crate::service::CrudService;
use crate::state::AppState;
use crate::store::Document;
use crate::upload::{apply_uploads, coerce_form_fields};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// JSON bodies pass through; forms are coerced and their images normalized first.
async fn into_document(state: &AppState, descriptor: &ResourceDescriptor, body: RawPayload) -> Result<Document, AppError> {
    match body {
        RawPayload::Json(doc) => Ok(doc),
        RawPayload::Form { fields, files } => {
            let mut doc = coerce_form_fields(descriptor, fields);
            apply_uploads(state.images.as_ref(), descriptor, files, &mut doc).await?;
            Ok(doc)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/{resource}",
    tag = "resources",
    params(
        ("resource" = String, Path, description = "brands, categories or products"),
        ("page" = Option<u64>, Query, description = "1-based page, default 1"),
        ("limit" = Option<u64>, Query, description = "Page size, default 50, capped"),
        ("sort" = Option<String>, Query, description = "e.g. `-price,title`"),
        ("fields" = Option<String>, Query, description = "Projection, e.g. `title,price`"),
        ("keyword" = Option<String>, Query, description = "Case-insensitive search"),
        ("populate" = Option<String>, Query, description = "Relations, e.g. `category,brand`")
    ),
    responses(
        (status = 200, description = "One page of documents", body = SuccessMany),
        (status = 404, description = "Unknown resource", body = ErrorBody)
    )
)]
pub async fn list(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let descriptor = state.descriptor(&resource)?;
    let req = QueryRequest::from_pairs(params);
    let plan = QueryBuilder::new(descriptor, state.settings.pagination).build(&req);
    let (items, page) = CrudService::list(state.store.as_ref(), &state.registry, descriptor, &plan).await?;
    Ok(success_many(items, page))
}

#[utoipa::path(
    get,
    path = "/api/v1/{resource}/{id}",
    tag = "resources",
    params(
        ("resource" = String, Path, description = "brands, categories or products"),
        ("id" = String, Path, description = "Document id"),
        ("populate" = Option<String>, Query, description = "Relations, e.g. `category,brand`")
    ),
    responses(
        (status = 200, description = "The document", body = SuccessOne),
        (status = 404, description = "Unknown resource or id", body = ErrorBody)
    )
)]
pub async fn read(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let descriptor = state.descriptor(&resource)?;
    let req = QueryRequest::from_pairs(params);
    let populate = QueryBuilder::new(descriptor, state.settings.pagination).populate(&req.populate);
    let doc = CrudService::get_one(state.store.as_ref(), &state.registry, descriptor, &id, &populate).await?;
    Ok(success_one_ok(doc))
}

#[utoipa::path(
    post,
    path = "/api/v1/{resource}",
    tag = "resources",
    params(("resource" = String, Path, description = "brands, categories or products")),
    request_body(content = DocumentBody, description = "JSON object or multipart/form-data with image files"),
    responses(
        (status = 201, description = "Created", body = SuccessOne),
        (status = 400, description = "Invalid payload or upload", body = ErrorBody),
        (status = 409, description = "Unique field already taken", body = ErrorBody)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    body: RawPayload,
) -> Result<impl IntoResponse, AppError> {
    let descriptor = state.descriptor(&resource)?;
    let payload = into_document(&state, descriptor, body).await?;
    let doc = CrudService::create(state.store.as_ref(), &state.registry, descriptor, payload).await?;
    Ok(success_one(doc))
}

#[utoipa::path(
    put,
    path = "/api/v1/{resource}/{id}",
    tag = "resources",
    params(
        ("resource" = String, Path, description = "brands, categories or products"),
        ("id" = String, Path, description = "Document id")
    ),
    request_body(content = DocumentBody, description = "Fields to change; JSON or multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = SuccessOne),
        (status = 400, description = "Invalid payload or upload", body = ErrorBody),
        (status = 404, description = "Unknown resource or id", body = ErrorBody),
        (status = 409, description = "Unique field already taken", body = ErrorBody)
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    body: RawPayload,
) -> Result<impl IntoResponse, AppError> {
    let descriptor = state.descriptor(&resource)?;
    if matches!(body, RawPayload::Form { .. }) {
        // resolve the target before any image is written
        CrudService::ensure_exists(state.store.as_ref(), descriptor, &id).await?;
    }
    let payload = into_document(&state, descriptor, body).await?;
    let doc = CrudService::update(state.store.as_ref(), &state.registry, descriptor, &id, payload).await?;
    Ok(success_one_ok(doc))
}

#[utoipa::path(
    delete,
    path = "/api/v1/{resource}/{id}",
    tag = "resources",
    params(
        ("resource" = String, Path, description = "brands, categories or products"),
        ("id" = String, Path, description = "Document id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Unknown resource or id", body = ErrorBody)
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let descriptor = state.descriptor(&resource)?;
    CrudService::delete(state.store.as_ref(), descriptor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
