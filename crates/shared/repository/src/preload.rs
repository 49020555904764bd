//! Preload directives.
//!
//! A [`Preload`] eagerly fetches the records of a related entity for every
//! primary record a read returns. Each directive costs one extra query
//! (`WHERE key IN (...)`) after the primary one, so to-many relations never
//! repeat primary rows.

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::sea_query::IntoCondition;
use sea_orm::{
    DatabaseConnection, DbErr, EntityTrait, LoaderTrait, QueryFilter, Related, RelationType,
    Select,
};

use crate::loaded::{Loaded, RelatedRecords, RelatedSet};

/// Fetches the related records of a batch of primary records.
#[async_trait]
trait Load<E: EntityTrait>: Send + Sync {
    /// One entry per model, in the same order.
    async fn load(
        &self,
        models: &[E::Model],
        db: &DatabaseConnection,
    ) -> Result<Vec<RelatedRecords>, DbErr>
    where
        E::Model: Sync;
}

struct RelatedLoader<R>(PhantomData<fn() -> R>);

#[async_trait]
impl<E, R> Load<E> for RelatedLoader<R>
where
    E: EntityTrait + Related<R>,
    R: EntityTrait,
    R::Model: Send + Sync + 'static,
{
    async fn load(
        &self,
        models: &[E::Model],
        db: &DatabaseConnection,
    ) -> Result<Vec<RelatedRecords>, DbErr>
    where
        E::Model: Sync,
    {
        let groups: Vec<Vec<R::Model>> = match <E as Related<R>>::to().rel_type {
            RelationType::HasOne => models
                .load_one(R::default(), db)
                .await?
                .into_iter()
                .map(|one| one.into_iter().collect())
                .collect(),
            RelationType::HasMany => models.load_many(R::default(), db).await?,
        };

        Ok(groups
            .into_iter()
            .map(|group| Arc::new(group) as RelatedRecords)
            .collect())
    }
}

/// Eager-load directive for one related entity
pub struct Preload<E: EntityTrait> {
    name: String,
    target: TypeId,
    loader: Arc<dyn Load<E>>,
}

impl<E: EntityTrait> Preload<E> {
    /// Preload the entity `R` related to `E`, named after `R`'s table.
    ///
    /// To-one relations yield zero or one record per primary record.
    /// Many-to-many relations (`Related::via`) are not supported and fail the
    /// read with a store error.
    pub fn related<R>() -> Self
    where
        E: Related<R>,
        R: EntityTrait + 'static,
        R::Model: Send + Sync + 'static,
    {
        Self {
            name: R::default().table_name().to_string(),
            target: TypeId::of::<R>(),
            loader: Arc::new(RelatedLoader::<R>(PhantomData)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<E: EntityTrait> Clone for Preload<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            target: self.target,
            loader: Arc::clone(&self.loader),
        }
    }
}

impl<E: EntityTrait> fmt::Debug for Preload<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Preload").field(&self.name).finish()
    }
}

/// Per-call set of preload directives
pub struct Preloads<E: EntityTrait>(Vec<Preload<E>>);

impl<E: EntityTrait> Preloads<E> {
    /// No preloads
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, preload: Preload<E>) -> Self {
        self.0.push(preload);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Preload<E>> {
        self.0.iter()
    }

    /// Directive names, for logging
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(Preload::name).collect()
    }
}

impl<E: EntityTrait> Default for Preloads<E> {
    fn default() -> Self {
        Self::none()
    }
}

impl<E: EntityTrait> Clone for Preloads<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E: EntityTrait> fmt::Debug for Preloads<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<E: EntityTrait> From<Preload<E>> for Preloads<E> {
    fn from(preload: Preload<E>) -> Self {
        Self(vec![preload])
    }
}

impl<E: EntityTrait> FromIterator<Preload<E>> for Preloads<E> {
    fn from_iter<I: IntoIterator<Item = Preload<E>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Run every distinct directive against `models` and attach the results.
pub(crate) async fn load_related<E>(
    models: Vec<E::Model>,
    preloads: &Preloads<E>,
    db: &DatabaseConnection,
) -> Result<Vec<Loaded<E::Model>>, DbErr>
where
    E: EntityTrait,
    E::Model: Sync,
{
    let mut seen = HashSet::new();
    let mut sets = Vec::new();
    if !models.is_empty() {
        for preload in preloads.iter() {
            if !seen.insert(preload.target) {
                continue;
            }
            let groups = preload.loader.load(&models, db).await?;
            sets.push((preload, groups.into_iter()));
        }
    }

    Ok(models
        .into_iter()
        .map(|model| {
            let related = sets
                .iter_mut()
                .filter_map(|(preload, groups)| {
                    groups.next().map(|records| RelatedSet {
                        name: preload.name.clone(),
                        target: preload.target,
                        records,
                    })
                })
                .collect();
            Loaded::with_related(model, related)
        })
        .collect())
}

/// Scoped select that resolves its preloads when executed
pub struct PreloadQuery<E: EntityTrait> {
    select: Select<E>,
    preloads: Preloads<E>,
}

impl<E: EntityTrait> PreloadQuery<E> {
    pub(crate) fn new(select: Select<E>, preloads: Preloads<E>) -> Self {
        Self { select, preloads }
    }

    pub fn filter<F: IntoCondition>(self, filter: F) -> Self {
        Self {
            select: self.select.filter(filter),
            preloads: self.preloads,
        }
    }

    /// Refine the underlying select (ordering, limits, extra joins).
    pub fn map(self, f: impl FnOnce(Select<E>) -> Select<E>) -> Self {
        Self {
            select: f(self.select),
            preloads: self.preloads,
        }
    }

    pub fn preloads(&self) -> &Preloads<E> {
        &self.preloads
    }

    /// The select alone; its results carry no preloaded records.
    pub fn into_select(self) -> Select<E> {
        self.select
    }

    pub async fn all(self, db: &DatabaseConnection) -> Result<Vec<Loaded<E::Model>>, DbErr>
    where
        E::Model: Sync,
    {
        let models = self.select.all(db).await?;
        load_related(models, &self.preloads, db).await
    }

    pub async fn one(self, db: &DatabaseConnection) -> Result<Option<Loaded<E::Model>>, DbErr>
    where
        E::Model: Sync,
    {
        let Some(model) = self.select.one(db).await? else {
            return Ok(None);
        };
        let mut loaded = load_related(vec![model], &self.preloads, db).await?;
        Ok(loaded.pop())
    }
}
