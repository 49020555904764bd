//! Read results with their preloaded relations.

use std::any::{Any, TypeId};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use sea_orm::EntityTrait;

/// Related records of one preload, for one primary record
pub(crate) type RelatedRecords = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub(crate) struct RelatedSet {
    pub(crate) name: String,
    pub(crate) target: TypeId,
    pub(crate) records: RelatedRecords,
}

/// A record returned by a read, with the records its preloads fetched.
///
/// Derefs to the record, and compares equal to a bare model with the same
/// values.
#[derive(Clone)]
pub struct Loaded<M> {
    record: M,
    related: Vec<RelatedSet>,
}

impl<M> Loaded<M> {
    /// A record with nothing preloaded
    pub fn new(record: M) -> Self {
        Self {
            record,
            related: Vec::new(),
        }
    }

    pub(crate) fn with_related(record: M, related: Vec<RelatedSet>) -> Self {
        Self { record, related }
    }

    pub fn record(&self) -> &M {
        &self.record
    }

    pub fn into_record(self) -> M {
        self.record
    }

    /// Drop the preloaded records of every item.
    pub fn into_records(loaded: Vec<Self>) -> Vec<M> {
        loaded.into_iter().map(Self::into_record).collect()
    }

    /// Records of entity `R` fetched by a preload.
    ///
    /// `None` when `R` was not preloaded; an empty slice when it was and
    /// nothing is associated.
    pub fn related<R>(&self) -> Option<&[R::Model]>
    where
        R: EntityTrait + 'static,
        R::Model: 'static,
    {
        self.related
            .iter()
            .find(|set| set.target == TypeId::of::<R>())
            .and_then(|set| set.records.downcast_ref::<Vec<R::Model>>())
            .map(Vec::as_slice)
    }

    /// Names of the preloads attached to this record
    pub fn preloaded(&self) -> impl Iterator<Item = &str> {
        self.related.iter().map(|set| set.name.as_str())
    }
}

impl<M> Deref for Loaded<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.record
    }
}

impl<M: PartialEq> PartialEq<M> for Loaded<M> {
    fn eq(&self, other: &M) -> bool {
        self.record == *other
    }
}

impl<M: fmt::Debug> fmt::Debug for Loaded<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loaded")
            .field("record", &self.record)
            .field("preloaded", &self.preloaded().collect::<Vec<_>>())
            .finish()
    }
}
