//! Catalog service - authors and their books.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, DatabaseTransaction, IntoActiveModel, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use common::{AppError, AppResult};
use repository::{Filters, Loaded, Pagination, Preload, Preloads};

use crate::repositories::entities::{author, book};
use crate::repositories::Repositories;

/// Author details for [`Catalog::publish`]
#[derive(Debug, Clone, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    pub email: String,
}

/// Book details for [`Catalog::publish`]
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub published_year: i32,
}

/// Author and books submitted together
#[derive(Debug, Clone, Deserialize)]
pub struct Manuscript {
    #[serde(flatten)]
    pub author: NewAuthor,
    #[serde(default)]
    pub books: Vec<NewBook>,
}

/// Catalog service trait for dependency injection.
///
/// Author lookups exclude removed authors unless stated otherwise.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Register a new author
    async fn add_author(&self, name: String, email: String) -> AppResult<author::Model>;

    /// Get active author by ID
    async fn get_author(&self, id: Uuid) -> AppResult<author::Model>;

    /// Get active author by email
    async fn find_author_by_email(&self, email: &str) -> AppResult<author::Model>;

    /// Get active author by ID with all of their books
    async fn get_author_with_books(
        &self,
        id: Uuid,
    ) -> AppResult<(author::Model, Vec<book::Model>)>;

    async fn list_authors(&self, include_deleted: bool) -> AppResult<Vec<author::Model>>;

    /// Change an active author's name and/or email
    async fn update_author(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> AppResult<author::Model>;

    /// Soft delete an author. Their books stay.
    async fn remove_author(&self, id: Uuid) -> AppResult<()>;

    /// Add a book by an active author
    async fn add_book(&self, author_id: Uuid, title: String, published_year: i32)
        -> AppResult<book::Model>;

    /// Books, optionally by one author and optionally one page at a time
    async fn list_books(
        &self,
        author_id: Option<Uuid>,
        page: Option<Pagination>,
    ) -> AppResult<Vec<book::Model>>;

    async fn count_books(&self, author_id: Uuid) -> AppResult<u64>;

    /// Books whose author has not been removed
    async fn books_by_active_authors(&self) -> AppResult<Vec<book::Model>>;

    /// Create an author and all of their books atomically
    async fn publish(&self, manuscript: Manuscript) -> AppResult<(author::Model, Vec<book::Model>)>;
}

/// Concrete implementation of Catalog using the generic repositories.
pub struct CatalogManager {
    repos: Repositories,
}

impl CatalogManager {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Fail with `Conflict` if any author, removed or not, uses `email`.
    ///
    /// Concurrent writers can both pass this check; the unique index then
    /// rejects the second write, which [`email_taken`] reports the same way.
    async fn ensure_email_free(&self, email: &str) -> AppResult<()> {
        let taken = self
            .repos
            .all_authors
            .count_by_fields(&Filters::single("email", email))
            .await?;
        if taken > 0 {
            return Err(AppError::conflict("Email"));
        }
        Ok(())
    }

    async fn publish_in(
        &self,
        txn: &DatabaseTransaction,
        manuscript: Manuscript,
    ) -> AppResult<(author::Model, Vec<book::Model>)> {
        let author = self
            .repos
            .authors
            .create_tx(new_author(manuscript.author), txn)
            .await
            .map_err(email_taken)?;

        let mut books = Vec::with_capacity(manuscript.books.len());
        for draft in manuscript.books {
            validate_title(&draft.title)?;
            let book = self
                .repos
                .books
                .create_tx(new_book(author.id, draft.title, draft.published_year), txn)
                .await?;
            books.push(book);
        }

        Ok((author, books))
    }
}

#[async_trait]
impl Catalog for CatalogManager {
    async fn add_author(&self, name: String, email: String) -> AppResult<author::Model> {
        validate_author(&name, &email)?;
        self.ensure_email_free(&email).await?;

        let author = self
            .repos
            .authors
            .create(new_author(NewAuthor { name, email }))
            .await
            .map_err(email_taken)?;
        info!(author_id = %author.id, "Author added");
        Ok(author)
    }

    async fn get_author(&self, id: Uuid) -> AppResult<author::Model> {
        let author = self
            .repos
            .authors
            .get_one_by_id(id.into(), &Preloads::none())
            .await?;
        Ok(author.into_record())
    }

    async fn find_author_by_email(&self, email: &str) -> AppResult<author::Model> {
        let author = self
            .repos
            .authors
            .get_one_by_field("email", email.into(), &Preloads::none())
            .await?;
        Ok(author.into_record())
    }

    async fn get_author_with_books(
        &self,
        id: Uuid,
    ) -> AppResult<(author::Model, Vec<book::Model>)> {
        let with_books = Preloads::from(Preload::related::<book::Entity>());
        let author = self
            .repos
            .authors
            .get_one_by_id(id.into(), &with_books)
            .await?;

        let books = author
            .related::<book::Entity>()
            .map(<[book::Model]>::to_vec)
            .unwrap_or_default();
        Ok((author.into_record(), books))
    }

    async fn list_authors(&self, include_deleted: bool) -> AppResult<Vec<author::Model>> {
        let authors = if include_deleted {
            self.repos.authors.get_all(&Preloads::none()).await?
        } else {
            self.repos
                .authors
                .get_by_fields(&Filters::new(), &Preloads::none())
                .await?
        };
        Ok(Loaded::into_records(authors))
    }

    async fn update_author(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> AppResult<author::Model> {
        let current = self.get_author(id).await?;

        let name = name.unwrap_or_else(|| current.name.clone());
        let email = email.unwrap_or_else(|| current.email.clone());
        validate_author(&name, &email)?;
        if email != current.email {
            self.ensure_email_free(&email).await?;
        }

        let mut active: author::ActiveModel = current.into_active_model();
        active.name = Set(name);
        active.email = Set(email);

        Ok(self.repos.authors.save(active).await.map_err(email_taken)?)
    }

    async fn remove_author(&self, id: Uuid) -> AppResult<()> {
        let author = self.get_author(id).await?;
        self.repos.authors.delete(author).await?;
        info!(author_id = %id, "Author removed");
        Ok(())
    }

    async fn add_book(
        &self,
        author_id: Uuid,
        title: String,
        published_year: i32,
    ) -> AppResult<book::Model> {
        validate_title(&title)?;
        // Removed authors do not get new books
        self.get_author(author_id).await?;

        Ok(self
            .repos
            .books
            .create(new_book(author_id, title, published_year))
            .await?)
    }

    async fn list_books(
        &self,
        author_id: Option<Uuid>,
        page: Option<Pagination>,
    ) -> AppResult<Vec<book::Model>> {
        let books = &self.repos.books;
        let none = Preloads::none();

        let found = match (author_id, page) {
            (None, None) => books.get_all(&none).await?,
            (None, Some(page)) => books.get_batch(page, &none).await?,
            (Some(id), None) => books.get_by_field("author_id", id.into(), &none).await?,
            (Some(id), Some(page)) => {
                books
                    .get_by_field_batch("author_id", id.into(), page, &none)
                    .await?
            }
        };
        Ok(Loaded::into_records(found))
    }

    async fn count_books(&self, author_id: Uuid) -> AppResult<u64> {
        Ok(self
            .repos
            .books
            .count_by_fields(&Filters::single("author_id", author_id))
            .await?)
    }

    async fn books_by_active_authors(&self) -> AppResult<Vec<book::Model>> {
        let active = Condition::all().add(author::Column::DeletedAt.is_null());
        let books = self
            .repos
            .books
            .get_where(active, &Preloads::none())
            .await?;
        Ok(Loaded::into_records(books))
    }

    async fn publish(
        &self,
        manuscript: Manuscript,
    ) -> AppResult<(author::Model, Vec<book::Model>)> {
        validate_author(&manuscript.author.name, &manuscript.author.email)?;
        self.ensure_email_free(&manuscript.author.email).await?;

        let txn = self.repos.authors.connection().begin().await?;

        match self.publish_in(&txn, manuscript).await {
            Ok(published) => {
                txn.commit().await?;
                info!(
                    author_id = %published.0.id,
                    books = published.1.len(),
                    "Manuscript published"
                );
                Ok(published)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

/// Report a unique-index rejection on authors as a taken email.
fn email_taken(err: impl Into<AppError>) -> AppError {
    match err.into() {
        AppError::Conflict(_) => AppError::conflict("Email"),
        other => other,
    }
}

fn validate_author(name: &str, email: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Author name is required"));
    }
    if !email.contains('@') {
        return Err(AppError::validation("Invalid email format"));
    }
    Ok(())
}

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("Book title is required"));
    }
    Ok(())
}

fn new_author(author: NewAuthor) -> author::ActiveModel {
    author::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(author.name),
        email: Set(author.email),
        created_at: Set(Utc::now()),
        deleted_at: Set(None),
    }
}

fn new_book(author_id: Uuid, title: String, published_year: i32) -> book::ActiveModel {
    book::ActiveModel {
        id: Set(Uuid::new_v4()),
        author_id: Set(author_id),
        title: Set(title),
        published_year: Set(published_year),
        created_at: Set(Utc::now()),
    }
}
