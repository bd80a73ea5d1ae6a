//! Request body for create/update: a JSON object or a multipart form with image files.

use crate::error::AppError;
use crate::store::Document;
use crate::upload::UploadedFile;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde_json::Value;

#[derive(Debug)]
pub enum RawPayload {
    Json(Document),
    /// Text fields in arrival order, plus every part that carried a filename.
    Form {
        fields: Vec<(String, String)>,
        files: Vec<UploadedFile>,
    },
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for RawPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return match value {
                Value::Object(map) => Ok(RawPayload::Json(map)),
                _ => Err(AppError::BadRequest("body must be a JSON object".into())),
            };
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let mut fields = Vec::new();
        let mut files = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_some() {
                let content_type = field.content_type().map(String::from);
                let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
                files.push(UploadedFile {
                    field: name,
                    content_type,
                    bytes,
                });
            } else {
                let text = field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
                fields.push((name, text));
            }
        }
        Ok(RawPayload::Form { fields, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn json_object_body() {
        let req = axum::http::Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"Acme"}"#))
            .unwrap();
        match RawPayload::from_request(req, &()).await.unwrap() {
            RawPayload::Json(map) => assert_eq!(map["name"], "Acme"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_object_json_is_rejected() {
        let req = axum::http::Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("[1,2]"))
            .unwrap();
        assert!(matches!(
            RawPayload::from_request(req, &()).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn multipart_splits_fields_and_files() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
            "Acme\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"image\"; filename=\"logo.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "PNGDATA\r\n",
            "--XBOUNDARY--\r\n",
        );
        let req = axum::http::Request::builder()
            .header(CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        match RawPayload::from_request(req, &()).await.unwrap() {
            RawPayload::Form { fields, files } => {
                assert_eq!(fields, vec![("name".to_string(), "Acme".to_string())]);
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].field, "image");
                assert_eq!(files[0].content_type.as_deref(), Some("image/png"));
                assert_eq!(&files[0].bytes[..], b"PNGDATA");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
