//! Shared application state for all routes. Built once at startup and cloned into handlers.

use crate::config::{AppSettings, ResourceDescriptor, ResourceRegistry};
use crate::email::Mailer;
use crate::error::AppError;
use crate::store::DocumentStore;
use crate::upload::ImageProcessor;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub registry: Arc<ResourceRegistry>,
    pub images: Arc<dyn ImageProcessor>,
    /// Outbound mail for routes mounted alongside the catalog (account or order flows).
    /// The resource handlers never send mail. None when SMTP is not configured.
    pub mailer: Option<Arc<dyn Mailer>>,
    pub settings: Arc<AppSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: ResourceRegistry,
        images: Arc<dyn ImageProcessor>,
        settings: AppSettings,
    ) -> Self {
        AppState {
            store,
            registry: Arc::new(registry),
            images,
            mailer: None,
            settings: Arc::new(settings),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Resource served under `/api/v1/{path_segment}`.
    pub fn descriptor(&self, path_segment: &str) -> Result<&ResourceDescriptor, AppError> {
        self.registry
            .by_path(path_segment)
            .ok_or_else(|| AppError::NotFound(format!("Unknown resource: {}", path_segment)))
    }
}
