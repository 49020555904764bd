//! Catalog Service - command line access to the author/book catalog.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use catalog_service_lib::config::CatalogConfig;
use catalog_service_lib::service::{Catalog, Manuscript};
use catalog_service_lib::{describe_error, MigrateAction};
use repository::{Pagination, DEFAULT_BATCH_SIZE};

#[derive(Parser)]
#[command(name = "catalog-service")]
#[command(about = "Author and book catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
    /// Manage authors
    Author {
        #[command(subcommand)]
        action: AuthorCommands,
    },
    /// Manage books
    Book {
        #[command(subcommand)]
        action: BookCommands,
    },
    /// Create an author and their books from a JSON manuscript, atomically
    Publish {
        /// Path to a JSON file: {"name", "email", "books": [{"title", "published_year"}]}
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[derive(Subcommand)]
enum AuthorCommands {
    /// Register an author
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Show one author by ID or email
    Show {
        #[arg(long, conflicts_with = "email", required_unless_present = "email")]
        id: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
        /// Include the author's books
        #[arg(long)]
        books: bool,
    },
    /// List authors
    List {
        /// Include removed authors
        #[arg(long)]
        all: bool,
    },
    /// Rename an author or change their email
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Remove an author (soft delete)
    Remove { id: Uuid },
}

#[derive(Subcommand)]
enum BookCommands {
    /// Add a book by an active author
    Add {
        #[arg(long)]
        author: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long)]
        year: i32,
    },
    /// List books
    List {
        /// Only books by this author
        #[arg(long)]
        author: Option<Uuid>,
        /// Only books whose author is still active
        #[arg(long, conflicts_with = "author")]
        active: bool,
        /// 1-indexed page; lists everything when omitted
        #[arg(long)]
        page: Option<u64>,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        per_page: u64,
    },
    /// Count books by an author
    Count {
        #[arg(long)]
        author: Uuid,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = CatalogConfig::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", describe_error(err.as_ref()));
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &CatalogConfig) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            catalog_service_lib::run_migrations(config, migrate_action).await?;
        }
        Commands::Author { action } => {
            let catalog = catalog_service_lib::connect(config).await?;
            match action {
                AuthorCommands::Add { name, email } => {
                    print_json(&catalog.add_author(name, email).await?)?;
                }
                AuthorCommands::Show { id, email, books } => {
                    let author = match (id, email) {
                        (Some(id), _) => catalog.get_author(id).await?,
                        (None, Some(email)) => catalog.find_author_by_email(&email).await?,
                        (None, None) => return Err("either --id or --email is required".into()),
                    };
                    if books {
                        let (author, books) = catalog.get_author_with_books(author.id).await?;
                        print_json(&serde_json::json!({ "author": author, "books": books }))?;
                    } else {
                        print_json(&author)?;
                    }
                }
                AuthorCommands::List { all } => {
                    print_json(&catalog.list_authors(all).await?)?;
                }
                AuthorCommands::Update { id, name, email } => {
                    print_json(&catalog.update_author(id, name, email).await?)?;
                }
                AuthorCommands::Remove { id } => {
                    catalog.remove_author(id).await?;
                }
            }
        }
        Commands::Book { action } => {
            let catalog = catalog_service_lib::connect(config).await?;
            match action {
                BookCommands::Add {
                    author,
                    title,
                    year,
                } => {
                    print_json(&catalog.add_book(author, title, year).await?)?;
                }
                BookCommands::List {
                    author,
                    active,
                    page,
                    per_page,
                } => {
                    let books = if active {
                        catalog.books_by_active_authors().await?
                    } else {
                        let page = page.map(|page| Pagination::page(page, per_page));
                        catalog.list_books(author, page).await?
                    };
                    print_json(&books)?;
                }
                BookCommands::Count { author } => {
                    println!("{}", catalog.count_books(author).await?);
                }
            }
        }
        Commands::Publish { file } => {
            let manuscript: Manuscript = serde_json::from_slice(&std::fs::read(&file)?)?;
            let catalog = catalog_service_lib::connect(config).await?;
            let (author, books) = catalog.publish(manuscript).await?;
            print_json(&serde_json::json!({ "author": author, "books": books }))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
