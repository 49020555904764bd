//! SeaORM entities for the catalog.

pub mod author;
pub mod book;
