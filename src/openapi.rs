//! OpenAPI document for the resource endpoints, served at `/api-docs/openapi.json`.

use crate::error::{ErrorBody, FieldError};
use crate::query::PageInfo;
use crate::response::{DocumentBody, SuccessMany, SuccessOne};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Catalog API", description = "Brands, categories and products"),
    paths(
        crate::handlers::resource::list,
        crate::handlers::resource::read,
        crate::handlers::resource::create,
        crate::handlers::resource::update,
        crate::handlers::resource::delete,
    ),
    components(schemas(SuccessOne, SuccessMany, PageInfo, DocumentBody, ErrorBody, FieldError)),
    tags((name = "resources", description = "Generic CRUD over every registered resource"))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_both_resource_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/{resource}"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/{resource}/{id}"));
    }
}
