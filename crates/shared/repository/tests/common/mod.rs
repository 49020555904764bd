//! Shared fixtures for repository integration tests.
#![allow(dead_code)]

use std::path::PathBuf;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, Set,
};
use uuid::Uuid;

pub mod team {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "teams")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub city: String,
        pub disbanded_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::player::Entity")]
        Player,
    }

    impl Related<super::player::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Player.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod player {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "players")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub team_id: i32,
        pub name: String,
        pub position: String,
        pub former_team_id: Option<i32>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::team::Entity",
            from = "Column::TeamId",
            to = "super::team::Column::Id"
        )]
        Team,
        #[sea_orm(
            belongs_to = "super::team::Entity",
            from = "Column::FormerTeamId",
            to = "super::team::Column::Id"
        )]
        FormerTeam,
    }

    impl Related<super::team::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Team.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod club {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "clubs")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub dissolved_at: Option<DateTimeWithTimeZone>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Temporary SQLite database file, removed on drop
pub struct TestDb {
    pub db: DatabaseConnection,
    path: PathBuf,
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Fresh database with the `teams`, `players` and `clubs` tables.
///
/// A file (not `:memory:`) so that pooled connections share one database and
/// a transaction on one connection can be observed from another.
pub async fn setup() -> TestDb {
    let path = std::env::temp_dir().join(format!("repository-test-{}.db", Uuid::new_v4()));
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options.max_connections(4).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    create_table(&db, team::Entity).await;
    create_table(&db, player::Entity).await;
    create_table(&db, club::Entity).await;

    TestDb { db, path }
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    db.execute(backend.build(&schema.create_table_from_entity(entity)))
        .await
        .unwrap();
}

pub fn new_team(name: &str, city: &str) -> team::ActiveModel {
    team::ActiveModel {
        name: Set(name.to_string()),
        city: Set(city.to_string()),
        ..Default::default()
    }
}

pub fn new_player(team_id: i32, name: &str, position: &str) -> player::ActiveModel {
    player::ActiveModel {
        team_id: Set(team_id),
        name: Set(name.to_string()),
        position: Set(position.to_string()),
        ..Default::default()
    }
}

pub fn new_club(name: &str) -> club::ActiveModel {
    club::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
}
