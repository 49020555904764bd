//! SeaORM-backed repository implementation.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, IntoActiveModel, Iterable,
    ModelTrait, PaginatorTrait, PrimaryKeyToColumn, QueryFilter, QueryOrder, QuerySelect, Select,
    Value,
};
use tracing::{debug, error, warn};

use crate::base::{Repository, TransactionRepository};
use crate::error::{is_not_found_sentinel, Operation, RepositoryError, RepositoryResult};
use crate::filter::{Filters, ID_FIELD};
use crate::join::{apply_joins, Join};
use crate::loaded::Loaded;
use crate::outcome::AffectedRows;
use crate::pagination::Pagination;
use crate::preload::{PreloadQuery, Preloads};

type Stamp = fn(DateTime<Utc>) -> Value;

/// Timestamp encodings tried, in order, against a soft-delete column
const STAMPS: [Stamp; 4] = [utc_stamp, offset_stamp, local_stamp, naive_stamp];

fn utc_stamp(now: DateTime<Utc>) -> Value {
    now.into()
}

fn offset_stamp(now: DateTime<Utc>) -> Value {
    now.fixed_offset().into()
}

fn local_stamp(now: DateTime<Utc>) -> Value {
    now.with_timezone(&Local).into()
}

fn naive_stamp(now: DateTime<Utc>) -> Value {
    now.naive_utc().into()
}

/// Soft-delete column and the timestamp encoding its model field accepts
struct SoftDelete<E: EntityTrait> {
    column: E::Column,
    stamp: Stamp,
}

impl<E: EntityTrait> Clone for SoftDelete<E> {
    fn clone(&self) -> Self {
        Self {
            column: self.column,
            stamp: self.stamp,
        }
    }
}

/// Generic repository over the entity `E` and its active model `A`.
///
/// Holds a clone of the shared connection handle plus construction-time
/// options; nothing is mutated after construction, so one instance can serve
/// concurrent callers.
pub struct BaseRepository<E: EntityTrait, A> {
    db: DatabaseConnection,
    default_joins: Vec<Join>,
    soft_delete: Option<SoftDelete<E>>,
    _marker: PhantomData<fn() -> (E, A)>,
}

impl<E: EntityTrait, A> BaseRepository<E, A> {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            default_joins: Vec::new(),
            soft_delete: None,
            _marker: PhantomData,
        }
    }

    /// Relations joined on every read
    pub fn with_default_joins(mut self, joins: impl IntoIterator<Item = Join>) -> Self {
        self.default_joins.extend(joins);
        self
    }

    pub fn default_joins(&self) -> &[Join] {
        &self.default_joins
    }

    pub fn soft_delete_column(&self) -> Option<E::Column> {
        self.soft_delete.as_ref().map(|soft| soft.column)
    }

    fn entity() -> &'static str {
        type_name::<E>()
    }

    /// Normalize a raw store result.
    ///
    /// Returns `Ok(None)` when the store reported its not-found sentinel, and a
    /// logged [`RepositoryError::Store`] for any other store error.
    pub fn handle_error<T>(
        &self,
        operation: Operation,
        result: Result<T, DbErr>,
    ) -> RepositoryResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if is_not_found_sentinel(&err) => Ok(None),
            Err(err) => {
                error!(
                    operation = %operation,
                    entity = Self::entity(),
                    error = %err,
                    "Store operation failed"
                );
                Err(RepositoryError::Store {
                    operation,
                    source: err,
                })
            }
        }
    }

    /// Normalize a single-row store result.
    ///
    /// Like [`handle_error`](Self::handle_error), but anything other than
    /// exactly one returned or affected row is `NotFound`.
    pub fn handle_one_error<T: AffectedRows>(
        &self,
        operation: Operation,
        result: Result<T, DbErr>,
    ) -> RepositoryResult<T> {
        match self.handle_error(operation, result)? {
            Some(value) if value.affected_rows() == 1 => Ok(value),
            _ => Err(RepositoryError::NotFound),
        }
    }

    fn select(&self, include_deleted: bool) -> Select<E> {
        let select = apply_joins(E::find(), &self.default_joins);
        match &self.soft_delete {
            Some(soft) if !include_deleted => select.filter(soft.column.is_null()),
            _ => select,
        }
    }

    fn condition(&self, operation: Operation, filters: &Filters) -> RepositoryResult<Condition> {
        filters.to_condition::<E>().map_err(|err| {
            warn!(operation = %operation, entity = Self::entity(), error = %err, "Rejected filter");
            err
        })
    }
}

impl<E, A> BaseRepository<E, A>
where
    E: EntityTrait,
    A: ActiveModelTrait<Entity = E>,
{
    /// Soft delete through a nullable timestamp column.
    ///
    /// Scoped reads skip rows where the column is set and `delete` sets it
    /// instead of removing the row. `get_all` and `get_batch` still see them.
    ///
    /// # Errors
    /// `UnsupportedSoftDelete` when the column is not nullable or its model
    /// field is not a chrono date-time.
    pub fn with_soft_delete(mut self, column: E::Column) -> RepositoryResult<Self> {
        let unsupported = || RepositoryError::UnsupportedSoftDelete {
            entity: Self::entity(),
            column: format!("{:?}", column),
        };

        if !column.def().is_null() {
            return Err(unsupported());
        }

        let now = Utc::now();
        let stamp = STAMPS
            .into_iter()
            .find(|stamp| {
                let mut model = <A as ActiveModelTrait>::default();
                model.try_set(column, stamp(now)).is_ok()
            })
            .ok_or_else(unsupported)?;

        self.soft_delete = Some(SoftDelete { column, stamp });
        Ok(self)
    }
}

/// Add `condition` unless it is empty.
fn with_condition<E: EntityTrait>(select: Select<E>, condition: Condition) -> Select<E> {
    if condition.is_empty() {
        select
    } else {
        select.filter(condition)
    }
}

/// Order by primary key and apply the window.
fn windowed<E: EntityTrait>(select: Select<E>, pagination: Pagination) -> Select<E> {
    E::PrimaryKey::iter()
        .fold(select, |select, key| select.order_by_asc(key.into_column()))
        .limit(pagination.limit)
        .offset(pagination.offset)
}

/// Condition matching `model`'s row by primary key
fn by_primary_key<E: EntityTrait>(model: &E::Model) -> Condition {
    E::PrimaryKey::iter().fold(Condition::all(), |condition, key| {
        let column = key.into_column();
        condition.add(column.eq(model.get(column)))
    })
}

/// Mark every value that is present as `Set`, so an update writes all of them.
fn mark_all_set<A: ActiveModelTrait>(mut model: A) -> A {
    for column in <A::Entity as EntityTrait>::Column::iter() {
        if let Some(value) = model.get(column).into_value() {
            model.set(column, value);
        }
    }
    model
}

impl<E, A> BaseRepository<E, A>
where
    E: EntityTrait,
    E::Model: Send + Sync + IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Clone + Send + 'static,
{
    async fn find_many(
        &self,
        operation: Operation,
        condition: Condition,
        pagination: Option<Pagination>,
        preloads: &Preloads<E>,
        include_deleted: bool,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        let mut select = with_condition(self.select(include_deleted), condition);
        if let Some(pagination) = pagination {
            select = windowed(select, pagination);
        }

        let result = PreloadQuery::new(select, preloads.clone())
            .all(&self.db)
            .await;
        self.handle_error(operation, result)
            .map(Option::unwrap_or_default)
    }

    async fn find_one(
        &self,
        operation: Operation,
        condition: Condition,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Loaded<E::Model>> {
        let select = with_condition(self.select(false), condition);
        let result = PreloadQuery::new(select, preloads.clone())
            .one(&self.db)
            .await;
        self.handle_one_error(operation, result)?
            .ok_or(RepositoryError::NotFound)
    }

    async fn create_on<C>(&self, conn: &C, model: A) -> RepositoryResult<E::Model>
    where
        C: ConnectionTrait,
    {
        let result = model.insert(conn).await;
        self.handle_error(Operation::Create, result)?
            .ok_or(RepositoryError::NotFound)
    }

    async fn save_on<C>(&self, conn: &C, model: A) -> RepositoryResult<E::Model>
    where
        C: ConnectionTrait,
    {
        let result = upsert::<E, A, C>(conn, model).await;
        self.handle_error(Operation::Save, result)?
            .ok_or(RepositoryError::NotFound)
    }

    /// Hard delete, or stamp the soft-delete column of a row not yet deleted.
    async fn delete_on<C>(&self, conn: &C, model: E::Model) -> RepositoryResult<()>
    where
        C: ConnectionTrait,
    {
        let result = match &self.soft_delete {
            Some(soft) => E::update_many()
                .col_expr(soft.column, Expr::value((soft.stamp)(Utc::now())))
                .filter(by_primary_key::<E>(&model))
                .filter(soft.column.is_null())
                .exec(conn)
                .await
                .map(|res| res.rows_affected),
            None => {
                let active: A = model.into_active_model();
                active.delete(conn).await.map(|res| res.rows_affected)
            }
        };
        self.handle_error(Operation::Delete, result).map(|_| ())
    }
}

/// Insert when the primary key is unset; otherwise update every column and
/// fall back to insert when no row had that key.
async fn upsert<E, A, C>(conn: &C, model: A) -> Result<E::Model, DbErr>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Clone + Send + 'static,
    C: ConnectionTrait,
{
    let keyed = E::PrimaryKey::iter().all(|key| !model.is_not_set(key.into_column()));
    if !keyed {
        return model.insert(conn).await;
    }

    let model = mark_all_set(model);
    match model.clone().update(conn).await {
        Err(err) if is_not_found_sentinel(&err) => model.insert(conn).await,
        result => result,
    }
}

#[async_trait]
impl<E, A> Repository<E, A> for BaseRepository<E, A>
where
    E: EntityTrait,
    E::Model: Send + Sync + IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Clone + Send + 'static,
{
    fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn query(&self) -> Select<E> {
        self.select(false)
    }

    fn query_with_preloads(&self, preloads: &Preloads<E>) -> PreloadQuery<E> {
        PreloadQuery::new(self.select(false), preloads.clone())
    }

    async fn get_all(
        &self,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        debug!(entity = Self::entity(), preloads = ?preloads.names(), "Executing get_all");

        self.find_many(Operation::GetAll, Condition::all(), None, preloads, true)
            .await
    }

    async fn get_batch(
        &self,
        pagination: Pagination,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        debug!(
            entity = Self::entity(),
            limit = pagination.limit,
            offset = pagination.offset,
            preloads = ?preloads.names(),
            "Executing get_batch"
        );

        self.find_many(
            Operation::GetBatch,
            Condition::all(),
            Some(pagination),
            preloads,
            true,
        )
        .await
    }

    async fn get_where(
        &self,
        condition: Condition,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        debug!(
            entity = Self::entity(),
            ?condition,
            preloads = ?preloads.names(),
            "Executing get_where"
        );

        self.find_many(Operation::GetWhere, condition, None, preloads, false)
            .await
    }

    async fn get_where_batch(
        &self,
        condition: Condition,
        pagination: Pagination,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        debug!(
            entity = Self::entity(),
            ?condition,
            limit = pagination.limit,
            offset = pagination.offset,
            preloads = ?preloads.names(),
            "Executing get_where_batch"
        );

        self.find_many(
            Operation::GetWhereBatch,
            condition,
            Some(pagination),
            preloads,
            false,
        )
        .await
    }

    async fn get_by_field(
        &self,
        field: &str,
        value: Value,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        debug!(
            entity = Self::entity(),
            field,
            ?value,
            preloads = ?preloads.names(),
            "Executing get_by_field"
        );

        let condition = self.condition(Operation::GetByField, &Filters::single(field, value))?;
        self.find_many(Operation::GetByField, condition, None, preloads, false)
            .await
    }

    async fn get_by_fields(
        &self,
        filters: &Filters,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        debug!(
            entity = Self::entity(),
            ?filters,
            preloads = ?preloads.names(),
            "Executing get_by_fields"
        );

        let condition = self.condition(Operation::GetByFields, filters)?;
        self.find_many(Operation::GetByFields, condition, None, preloads, false)
            .await
    }

    async fn get_by_field_batch(
        &self,
        field: &str,
        value: Value,
        pagination: Pagination,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        debug!(
            entity = Self::entity(),
            field,
            ?value,
            limit = pagination.limit,
            offset = pagination.offset,
            preloads = ?preloads.names(),
            "Executing get_by_field_batch"
        );

        let filters = Filters::single(field, value);
        let condition = self.condition(Operation::GetByFieldBatch, &filters)?;
        self.find_many(
            Operation::GetByFieldBatch,
            condition,
            Some(pagination),
            preloads,
            false,
        )
        .await
    }

    async fn get_by_fields_batch(
        &self,
        filters: &Filters,
        pagination: Pagination,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Vec<Loaded<E::Model>>> {
        debug!(
            entity = Self::entity(),
            ?filters,
            limit = pagination.limit,
            offset = pagination.offset,
            preloads = ?preloads.names(),
            "Executing get_by_fields_batch"
        );

        let condition = self.condition(Operation::GetByFieldsBatch, filters)?;
        self.find_many(
            Operation::GetByFieldsBatch,
            condition,
            Some(pagination),
            preloads,
            false,
        )
        .await
    }

    async fn get_one_by_field(
        &self,
        field: &str,
        value: Value,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Loaded<E::Model>> {
        debug!(
            entity = Self::entity(),
            field,
            ?value,
            preloads = ?preloads.names(),
            "Executing get_one_by_field"
        );

        let filters = Filters::single(field, value);
        let condition = self.condition(Operation::GetOneByField, &filters)?;
        self.find_one(Operation::GetOneByField, condition, preloads)
            .await
    }

    async fn get_one_by_fields(
        &self,
        filters: &Filters,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Loaded<E::Model>> {
        debug!(
            entity = Self::entity(),
            ?filters,
            preloads = ?preloads.names(),
            "Executing get_one_by_fields"
        );

        let condition = self.condition(Operation::GetOneByFields, filters)?;
        self.find_one(Operation::GetOneByFields, condition, preloads)
            .await
    }

    async fn get_one_by_id(
        &self,
        id: Value,
        preloads: &Preloads<E>,
    ) -> RepositoryResult<Loaded<E::Model>> {
        debug!(
            entity = Self::entity(),
            ?id,
            preloads = ?preloads.names(),
            "Executing get_one_by_id"
        );

        let condition = self.condition(Operation::GetOneById, &Filters::single(ID_FIELD, id))?;
        self.find_one(Operation::GetOneById, condition, preloads)
            .await
    }

    async fn count_by_fields(&self, filters: &Filters) -> RepositoryResult<u64> {
        debug!(entity = Self::entity(), ?filters, "Executing count_by_fields");

        let condition = self.condition(Operation::Count, filters)?;
        let result = with_condition(self.query(), condition)
            .count(&self.db)
            .await;
        self.handle_error(Operation::Count, result)
            .map(Option::unwrap_or_default)
    }

    async fn create(&self, model: A) -> RepositoryResult<E::Model> {
        debug!(entity = Self::entity(), "Executing create");

        self.create_on(&self.db, model).await
    }

    async fn save(&self, model: A) -> RepositoryResult<E::Model> {
        debug!(entity = Self::entity(), "Executing save");

        self.save_on(&self.db, model).await
    }

    async fn delete(&self, model: E::Model) -> RepositoryResult<()> {
        debug!(entity = Self::entity(), soft = self.soft_delete.is_some(), "Executing delete");

        self.delete_on(&self.db, model).await
    }
}

#[async_trait]
impl<E, A> TransactionRepository<E, A> for BaseRepository<E, A>
where
    E: EntityTrait,
    E::Model: Send + Sync + IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Clone + Send + 'static,
{
    async fn create_tx(
        &self,
        model: A,
        txn: &DatabaseTransaction,
    ) -> RepositoryResult<E::Model> {
        debug!(entity = Self::entity(), "Executing create in transaction");

        self.create_on(txn, model).await
    }

    async fn save_tx(
        &self,
        model: A,
        txn: &DatabaseTransaction,
    ) -> RepositoryResult<E::Model> {
        debug!(entity = Self::entity(), "Executing save in transaction");

        self.save_on(txn, model).await
    }

    async fn delete_tx(
        &self,
        model: E::Model,
        txn: &DatabaseTransaction,
    ) -> RepositoryResult<()> {
        debug!(
            entity = Self::entity(),
            soft = self.soft_delete.is_some(),
            "Executing delete in transaction"
        );

        self.delete_on(txn, model).await
    }
}

impl<E: EntityTrait, A> Clone for BaseRepository<E, A> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            default_joins: self.default_joins.clone(),
            soft_delete: self.soft_delete.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E: EntityTrait, A> fmt::Debug for BaseRepository<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseRepository")
            .field("entity", &Self::entity())
            .field(
                "default_joins",
                &self.default_joins.iter().map(Join::name).collect::<Vec<_>>(),
            )
            .field("soft_delete", &self.soft_delete_column())
            .finish()
    }
}
