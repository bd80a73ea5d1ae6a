//! CrudService: generic CRUD over the document store.

mod crud;
mod validation;
pub use crud::{slugify, CrudService};
pub use validation::RequestValidator;
