//! Generic repository over SeaORM entities.
//!
//! One reusable component for CRUD and query access to any entity: equality
//! filters, default joins of related tables, eager loading of related records,
//! transaction-aware writes, and a small error vocabulary that hides the
//! store's own sentinels.
//!
//! # Example
//!
//! ```rust,ignore
//! use repository::{BaseRepository, Filters, Join, Preload, Preloads, Repository};
//!
//! let books = BaseRepository::<book::Entity, book::ActiveModel>::new(db.clone())
//!     .with_default_joins([Join::relation(book::Relation::Author)]);
//!
//! let recent = books
//!     .get_by_fields(
//!         &Filters::new().eq("published_year", 2024),
//!         &Preloads::from(Preload::related::<author::Entity>()),
//!     )
//!     .await?;
//! let author = recent[0].related::<author::Entity>();
//! ```

mod base;
mod error;
mod filter;
mod join;
mod loaded;
mod outcome;
mod pagination;
mod preload;
mod store;

#[cfg(test)]
mod fixtures;

pub use base::{Repository, TransactionRepository};
pub use error::{ErrorKind, Operation, RepositoryError, RepositoryResult};
pub use filter::{resolve_column, Filters, ID_FIELD};
pub use join::Join;
pub use loaded::Loaded;
pub use outcome::AffectedRows;
pub use pagination::{Pagination, DEFAULT_BATCH_SIZE, DEFAULT_PAGE_NUMBER};
pub use preload::{Preload, PreloadQuery, Preloads};
pub use store::BaseRepository;
