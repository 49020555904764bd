//! Repository traits.
//!
//! [`Repository`] covers reads and default-connection writes.
//! [`TransactionRepository`] adds write variants that run on a caller-owned
//! transaction. Both are object safe, so services can hold
//! `Arc<dyn TransactionRepository<E, A>>`.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, Select, Value,
};

use crate::error::RepositoryResult;
use crate::filter::Filters;
use crate::pagination::Pagination;
use crate::loaded::Loaded;
use crate::preload::{PreloadQuery, Preloads};

/// Generic data access over one entity
#[async_trait]
pub trait Repository<E, A>: Send + Sync
where
    E: EntityTrait,
    E::Model: Send + Sync + IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
{
    /// Get database connection reference
    fn connection(&self) -> &DatabaseConnection;

    /// Scoped query with the default joins applied
    fn query(&self) -> Select<E>;

    /// Scoped query that also fetches `preloads` when run
    fn query_with_preloads(&self, preloads: &Preloads<E>) -> PreloadQuery<E>;

    /// All records, soft-deleted ones included
    async fn get_all(&self, preloads: &Preloads<E>) -> RepositoryResult<Vec<Loaded<E::Model>>>;

    /// A window of `get_all`, ordered by primary key
    async fn get_batch(
        &self,
        pagination: Pagination,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>>;

    /// Records matching a caller-built condition
    async fn get_where(
        &self,
        condition: Condition,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>>;

    async fn get_where_batch(
        &self,
        condition: Condition,
        pagination: Pagination,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>>;

    /// Records whose `field` equals `value`
    async fn get_by_field(
        &self,
        field: &str,
        value: Value,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>>;

    /// Records matching every filter
    async fn get_by_fields(
        &self,
        filters: &Filters,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>>;

    async fn get_by_field_batch(
        &self,
        field: &str,
        value: Value,
        pagination: Pagination,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>>;

    async fn get_by_fields_batch(
        &self,
        filters: &Filters,
        pagination: Pagination,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>>;

    /// First record whose `field` equals `value`
    ///
    /// # Errors
    /// `NotFound` when no record matches.
    async fn get_one_by_field(
        &self,
        field: &str,
        value: Value,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Loaded<E::Model>>;

    /// First record matching every filter
    ///
    /// # Errors
    /// `NotFound` when no record matches.
    async fn get_one_by_fields(
        &self,
        filters: &Filters,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Loaded<E::Model>>;

    /// Record whose `id` column equals `id`.
    ///
    /// Entities keyed by another column should use `get_one_by_field`.
    async fn get_one_by_id(
        &self,
        id: Value,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Loaded<E::Model>>;

    /// Number of records matching every filter
    async fn count_by_fields(&self, filters: &Filters) -> RepositoryResult<u64>;

    /// Insert a new record
    async fn create(&self, model: A) -> RepositoryResult<E::Model>;

    /// Insert, or update every column of the row with the same primary key
    async fn save(&self, model: A) -> RepositoryResult<E::Model>;

    /// Delete a record by primary key
    async fn delete(&self, model: E::Model) -> RepositoryResult<()>;
}

/// Write operations against a caller-owned transaction.
///
/// The caller begins, commits and rolls back the transaction.
#[async_trait]
pub trait TransactionRepository<E, A>: Repository<E, A>
where
    E: EntityTrait,
    E::Model: Send + Sync + IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send + 'static,
{
    async fn create_tx(&self, model: A, txn: &DatabaseTransaction) -> RepositoryResult<E::Model>;

    async fn save_tx(&self, model: A, txn: &DatabaseTransaction) -> RepositoryResult<E::Model>;

    async fn delete_tx(&self, model: E::Model, txn: &DatabaseTransaction) -> RepositoryResult<()>;
}
