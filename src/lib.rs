//! Catalog API: descriptor-driven REST backend for brands, categories and products.

pub mod config;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod openapi;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod upload;

pub use config::{builtin_config, load_from_path, resolve, AppSettings, FullConfig, ResourceRegistry, StoreBackend};
pub use email::{EmailMessage, Mailer, SmtpMailer};
pub use error::{AppError, ConfigError};
pub use openapi::ApiDoc;
pub use response::{success_many, success_one};
pub use routes::{app_router, common_routes, resource_routes};
pub use service::CrudService;
pub use state::AppState;
pub use store::{ensure_collections, ensure_database_exists, DocumentStore, MemoryStore, PgDocumentStore};
pub use upload::{ImageProcessor, RustImageProcessor};
