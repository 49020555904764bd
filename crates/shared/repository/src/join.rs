//! Default joins.
//!
//! A [`Join`] names a relation of the queried entity and is applied as a
//! `LEFT JOIN`, so conditions can reference the related table's columns. The
//! rows returned are still the primary entity's; use a
//! [`Preload`](crate::Preload) to fetch the related records themselves.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use sea_orm::sea_query::{Alias, Iden, TableRef};
use sea_orm::{
    EntityTrait, JoinType, QuerySelect, Related, RelationDef, RelationTrait, RelationType, Select,
};

type RelationFn = Arc<dyn Fn() -> RelationDef + Send + Sync>;

/// Join directive for one relation
#[derive(Clone)]
pub struct Join {
    name: String,
    relation: RelationFn,
    identity: String,
    target: String,
    to_many: bool,
    alias: Option<String>,
}

impl Join {
    /// Join from an entity's `Relation` variant, named after the variant.
    pub fn relation<R>(relation: R) -> Self
    where
        R: RelationTrait + Send + Sync + 'static,
    {
        Self::build(format!("{:?}", relation), Arc::new(move || relation.def()))
    }

    /// Join the entity `R` related to `E`, named after `R`'s table.
    pub fn related<E, R>() -> Self
    where
        E: Related<R> + 'static,
        R: EntityTrait + 'static,
    {
        Self::build(
            R::default().table_name().to_string(),
            Arc::new(<E as Related<R>>::to),
        )
    }

    fn build(name: String, relation: RelationFn) -> Self {
        let def = relation();
        Self {
            name,
            identity: format!(
                "{:?}.{:?}->{:?}.{:?}",
                def.from_tbl, def.from_col, def.to_tbl, def.to_col
            ),
            target: table_name(&def.to_tbl),
            to_many: matches!(def.rel_type, RelationType::HasMany),
            alias: None,
            relation,
        }
    }

    /// Join the related table under `alias`.
    ///
    /// Conditions on this join must then use the alias as table name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the related side can match several rows per primary row
    pub fn is_to_many(&self) -> bool {
        self.to_many
    }
}

impl fmt::Debug for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Join")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("alias", &self.alias)
            .finish()
    }
}

fn table_name(table: &TableRef) -> String {
    match table {
        TableRef::Table(name)
        | TableRef::SchemaTable(_, name)
        | TableRef::DatabaseSchemaTable(_, _, name) => name.to_string(),
        other => format!("{:?}", other),
    }
}

/// Left-join each distinct relation in `joins` onto `select`.
///
/// A relation given twice, under any name, is joined once. A table reached by
/// a second relation, or the queried table itself, is joined under
/// `<table>_<n>` unless the join carries its own alias. To-many joins make the
/// select `DISTINCT` so the primary rows are not repeated.
pub(crate) fn apply_joins<'a, E, I>(mut select: Select<E>, joins: I) -> Select<E>
where
    E: EntityTrait,
    I: IntoIterator<Item = &'a Join>,
{
    let mut joined: HashSet<&str> = HashSet::new();
    let mut tables: HashMap<String, usize> = HashMap::new();
    tables.insert(E::default().table_name().to_string(), 1);
    let mut to_many = false;

    for join in joins {
        if !joined.insert(join.identity.as_str()) {
            continue;
        }

        let alias = match &join.alias {
            Some(alias) => Some(alias.clone()),
            None => {
                let seen = tables.entry(join.target.clone()).or_insert(0);
                *seen += 1;
                (*seen > 1).then(|| format!("{}_{}", join.target, seen))
            }
        };

        let def = (join.relation)();
        select = match alias {
            Some(alias) => select.join_as(JoinType::LeftJoin, def, Alias::new(alias)),
            None => select.join(JoinType::LeftJoin, def),
        };
        to_many |= join.to_many;
    }

    if to_many {
        select.distinct()
    } else {
        select
    }
}
