//! Repository wiring for the catalog entities.
//!
//! Both tables go through the generic repository; this module only fixes
//! each one's construction-time options.

pub mod entities;

use std::sync::Arc;

use repository::{BaseRepository, Join, RepositoryResult, TransactionRepository};
use sea_orm::DatabaseConnection;

use self::entities::{author, book};

pub type AuthorRepository = dyn TransactionRepository<author::Entity, author::ActiveModel>;
pub type BookRepository = dyn TransactionRepository<book::Entity, book::ActiveModel>;

type AuthorStore = BaseRepository<author::Entity, author::ActiveModel>;
type BookStore = BaseRepository<book::Entity, book::ActiveModel>;

/// Authors, soft deleted through `deleted_at`.
pub fn author_store(db: DatabaseConnection) -> RepositoryResult<AuthorStore> {
    AuthorStore::new(db).with_soft_delete(author::Column::DeletedAt)
}

/// Books, always joined with their author so queries can filter on author columns.
pub fn book_store(db: DatabaseConnection) -> BookStore {
    BookStore::new(db).with_default_joins([Join::relation(book::Relation::Author)])
}

/// Repositories used by the catalog service
#[derive(Clone)]
pub struct Repositories {
    /// Active authors only
    pub authors: Arc<AuthorRepository>,
    /// Every author, removed ones included
    pub all_authors: Arc<AuthorRepository>,
    pub books: Arc<BookRepository>,
}

impl Repositories {
    pub fn new(db: DatabaseConnection) -> RepositoryResult<Self> {
        Ok(Self {
            authors: Arc::new(author_store(db.clone())?),
            all_authors: Arc::new(AuthorStore::new(db.clone())),
            books: Arc::new(book_store(db)),
        })
    }
}
