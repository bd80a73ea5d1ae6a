//! Standard response envelope helpers.

use crate::query::PageInfo;
use crate::store::Document;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

pub const SUCCESS: &str = "success";

#[derive(Serialize, ToSchema)]
pub struct SuccessOne {
    pub status: &'static str,
    #[schema(value_type = Object)]
    pub data: Document,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessMany {
    pub status: &'static str,
    /// Number of items on this page.
    pub results: usize,
    pub pagination_result: PageInfo,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Document>,
}

/// Any resource document. Multipart bodies carry the same fields plus image files.
#[derive(ToSchema)]
#[schema(value_type = Object)]
pub struct DocumentBody(pub Document);

pub fn success_one(data: Document) -> (StatusCode, Json<SuccessOne>) {
    (StatusCode::CREATED, Json(SuccessOne { status: SUCCESS, data }))
}

pub fn success_one_ok(data: Document) -> (StatusCode, Json<SuccessOne>) {
    (StatusCode::OK, Json(SuccessOne { status: SUCCESS, data }))
}

pub fn success_many(data: Vec<Document>, page: PageInfo) -> (StatusCode, Json<SuccessMany>) {
    (
        StatusCode::OK,
        Json(SuccessMany {
            status: SUCCESS,
            results: data.len(),
            pagination_result: page,
            data,
        }),
    )
}
