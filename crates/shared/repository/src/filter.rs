//! Equality filters.
//!
//! A [`Filters`] value maps field names to the value each field must equal.
//! All entries are AND-combined into a single predicate.

use std::any::type_name;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::str::FromStr;

use sea_orm::{ColumnTrait, Condition, EntityTrait, Value};

use crate::error::{RepositoryError, RepositoryResult};

/// Name of the column `get_one_by_id` filters on
pub const ID_FIELD: &str = "id";

/// Conjunction of `field = value` constraints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(BTreeMap<String, Value>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single `field = value` constraint
    pub fn single(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().eq(field, value)
    }

    /// Add a constraint. A later value for the same field replaces the earlier one.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Resolve every field against `E`'s columns and fold them into one condition.
    pub fn to_condition<E: EntityTrait>(&self) -> RepositoryResult<Condition> {
        self.0
            .iter()
            .try_fold(Condition::all(), |condition, (field, value)| {
                let column = resolve_column::<E>(field)?;
                Ok(condition.add(column.eq(value.clone())))
            })
    }
}

impl<K, V> FromIterator<(K, V)> for Filters
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Filters {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Look up a column of `E` by its field name.
pub fn resolve_column<E: EntityTrait>(field: &str) -> RepositoryResult<E::Column> {
    E::Column::from_str(field).map_err(|_| RepositoryError::UnknownField {
        entity: type_name::<E>(),
        field: field.to_string(),
    })
}
