//! Service layer.

mod catalog_service;

pub use catalog_service::{Catalog, CatalogManager, Manuscript, NewAuthor, NewBook};
