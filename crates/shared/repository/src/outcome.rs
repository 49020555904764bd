//! Row counts reported by store results.

use sea_orm::{DeleteResult, UpdateResult};

/// Number of rows a store result returned or affected
pub trait AffectedRows {
    fn affected_rows(&self) -> u64;
}

impl<M> AffectedRows for Option<M> {
    fn affected_rows(&self) -> u64 {
        u64::from(self.is_some())
    }
}

impl<M> AffectedRows for Vec<M> {
    fn affected_rows(&self) -> u64 {
        self.len() as u64
    }
}

impl AffectedRows for DeleteResult {
    fn affected_rows(&self) -> u64 {
        self.rows_affected
    }
}

impl AffectedRows for UpdateResult {
    fn affected_rows(&self) -> u64 {
        self.rows_affected
    }
}
