//! Catalog Service Library
//!
//! Authors and books stored through the generic repository. The binary is a
//! thin CLI over [`CatalogManager`].

pub mod config;
pub mod infra;
pub mod repositories;
pub mod service;

use std::error::Error;

use common::AppError;
use tracing::info;

use crate::config::CatalogConfig;
use crate::infra::Database;
use crate::repositories::Repositories;
use crate::service::CatalogManager;

/// Connect (applying pending migrations) and build the catalog service.
pub async fn connect(config: &CatalogConfig) -> Result<CatalogManager, Box<dyn Error>> {
    let db = Database::connect(&config.database).await?;
    db.ping().await?;

    Ok(CatalogManager::new(Repositories::new(db.get_connection())?))
}

/// One-line report of a failed command.
///
/// Service errors show their code and user-facing message; anything else is
/// printed as is.
pub fn describe_error(err: &(dyn Error + 'static)) -> String {
    match err.downcast_ref::<AppError>() {
        Some(app_err) => format!("error[{}]: {}", app_err.code(), app_err.user_message()),
        None => format!("error: {}", err),
    }
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(
    config: &CatalogConfig,
    action: MigrateAction,
) -> Result<(), Box<dyn Error>> {
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}
