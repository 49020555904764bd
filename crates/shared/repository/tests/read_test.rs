//! Read operation tests against SQLite.

mod common;

use std::collections::BTreeSet;

use repository::{
    BaseRepository, ErrorKind, Filters, Join, Loaded, Operation, Pagination, Preload, Preloads,
    Repository,
};
use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{ColumnTrait, Condition, Set, Value};

use common::{new_player, new_team, player, setup, team};

type Teams = BaseRepository<team::Entity, team::ActiveModel>;
type Players = BaseRepository<player::Entity, player::ActiveModel>;

/// Two teams with three players each; returns (team ids, players).
async fn seed(teams: &Teams, players: &Players) -> (Vec<i32>, Vec<player::Model>) {
    let hawks = teams.create(new_team("Hawks", "Atlanta")).await.unwrap();
    let celtics = teams.create(new_team("Celtics", "Boston")).await.unwrap();

    let mut seeded = Vec::new();
    for (team_id, name, position) in [
        (hawks.id, "Young", "guard"),
        (hawks.id, "Murray", "guard"),
        (hawks.id, "Capela", "center"),
        (celtics.id, "White", "guard"),
        (celtics.id, "Tatum", "forward"),
        (celtics.id, "Porzingis", "center"),
    ] {
        seeded.push(
            players
                .create(new_player(team_id, name, position))
                .await
                .unwrap(),
        );
    }

    (vec![hawks.id, celtics.id], seeded)
}

fn ids(players: &[Loaded<player::Model>]) -> BTreeSet<i32> {
    players.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn test_get_all_on_empty_table() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());

    let all = teams.get_all(&Preloads::none()).await.unwrap();

    assert!(all.is_empty());
}

#[tokio::test]
async fn test_get_by_fields_matches_every_entry() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    let (team_ids, seeded) = seed(&teams, &players).await;

    let cases = [
        Filters::new().eq("team_id", team_ids[0]).eq("position", "guard"),
        Filters::new().eq("position", "center"),
        Filters::new().eq("team_id", team_ids[1]).eq("position", "forward"),
        Filters::new().eq("team_id", team_ids[1]).eq("position", "goalkeeper"),
    ];

    for filters in cases {
        let expected: BTreeSet<i32> = seeded
            .iter()
            .filter(|p| {
                filters.iter().all(|(field, value)| match field.as_str() {
                    "team_id" => Value::from(p.team_id) == *value,
                    "position" => Value::from(p.position.clone()) == *value,
                    other => panic!("unexpected field {other}"),
                })
            })
            .map(|p| p.id)
            .collect();

        let found = players.get_by_fields(&filters, &Preloads::none()).await.unwrap();
        assert_eq!(ids(&found), expected, "filters: {filters:?}");

        let reversed: Filters = filters
            .iter()
            .rev()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        let found = players.get_by_fields(&reversed, &Preloads::none()).await.unwrap();
        assert_eq!(ids(&found), expected, "filters: {reversed:?}");
    }
}

#[tokio::test]
async fn test_get_by_field() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    seed(&teams, &players).await;

    let guards = players
        .get_by_field("position", "guard".into(), &Preloads::none())
        .await
        .unwrap();
    assert_eq!(guards.len(), 3);
    assert!(guards.iter().all(|p| p.position == "guard"));

    let none = players
        .get_by_field("position", "goalkeeper".into(), &Preloads::none())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_get_one_by_field() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    seed(&teams, &players).await;

    let missing = players
        .get_one_by_field("name", "Bird".into(), &Preloads::none())
        .await
        .unwrap_err();
    assert!(missing.is_not_found());

    let tatum = players
        .get_one_by_field("name", "Tatum".into(), &Preloads::none())
        .await
        .unwrap();
    assert_eq!(tatum.position, "forward");

    // Several rows match: the store's first row is returned.
    let center = players
        .get_one_by_field("position", "center".into(), &Preloads::none())
        .await
        .unwrap();
    assert_eq!(center.position, "center");
}

#[tokio::test]
async fn test_get_one_by_fields() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    let (team_ids, _) = seed(&teams, &players).await;

    let white = players
        .get_one_by_fields(
            &Filters::new().eq("team_id", team_ids[1]).eq("position", "guard"),
            &Preloads::none(),
        )
        .await
        .unwrap();
    assert_eq!(white.name, "White");

    let err = players
        .get_one_by_fields(
            &Filters::new().eq("team_id", team_ids[0]).eq("position", "forward"),
            &Preloads::none(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unknown_field_is_invalid_filter() {
    let test_db = setup().await;
    let players = Players::new(test_db.db.clone());

    let err = players
        .get_by_fields(&Filters::single("jersey", 23), &Preloads::none())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidFilter);
}

#[tokio::test]
async fn test_batches_are_ordered_windows() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    let (_, seeded) = seed(&teams, &players).await;

    let window = Pagination::new(2, 0);
    let first = players.get_batch(window, &Preloads::none()).await.unwrap();
    let second = players.get_batch(window.next(), &Preloads::none()).await.unwrap();
    let past_end = players
        .get_batch(Pagination::new(2, 10), &Preloads::none())
        .await
        .unwrap();

    let seeded_ids: Vec<i32> = seeded.iter().map(|p| p.id).collect();
    assert_eq!(first.iter().map(|p| p.id).collect::<Vec<_>>(), seeded_ids[0..2]);
    assert_eq!(second.iter().map(|p| p.id).collect::<Vec<_>>(), seeded_ids[2..4]);
    assert!(past_end.is_empty());

    let guards = players
        .get_by_field_batch("position", "guard".into(), Pagination::new(2, 2), &Preloads::none())
        .await
        .unwrap();
    assert_eq!(guards.len(), 1);
    assert_eq!(guards[0].name, "White");

    let centers = players
        .get_by_fields_batch(
            &Filters::single("position", "center"),
            Pagination::page(1, 1),
            &Preloads::none(),
        )
        .await
        .unwrap();
    assert_eq!(centers.len(), 1);
    assert_eq!(centers[0].name, "Capela");
}

#[tokio::test]
async fn test_get_where() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    seed(&teams, &players).await;

    let condition = Condition::any()
        .add(player::Column::Position.eq("forward"))
        .add(player::Column::Name.eq("Young"));
    let found = players.get_where(condition.clone(), &Preloads::none()).await.unwrap();
    let mut names: Vec<_> = found.into_iter().map(|p| p.into_record().name).collect();
    names.sort();
    assert_eq!(names, vec!["Tatum", "Young"]);

    let windowed = players
        .get_where_batch(condition, Pagination::new(1, 1), &Preloads::none())
        .await
        .unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].name, "Tatum");
}

#[tokio::test]
async fn test_count_by_fields() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    let (team_ids, _) = seed(&teams, &players).await;

    let guards = players
        .count_by_fields(&Filters::single("position", "guard"))
        .await
        .unwrap();
    assert_eq!(guards, 3);

    let hawks = players
        .count_by_fields(&Filters::single("team_id", team_ids[0]))
        .await
        .unwrap();
    assert_eq!(hawks, 3);

    assert_eq!(players.count_by_fields(&Filters::new()).await.unwrap(), 6);
}

#[tokio::test]
async fn test_default_join_reaches_related_columns() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let plain = Players::new(test_db.db.clone());
    seed(&teams, &plain).await;

    let players = Players::new(test_db.db.clone())
        .with_default_joins([Join::relation(player::Relation::Team)]);

    let bostonians = players
        .get_where(
            Condition::all().add(team::Column::City.eq("Boston")),
            &Preloads::none(),
        )
        .await
        .unwrap();
    assert_eq!(bostonians.len(), 3);

    // Without the join the team column is not in scope.
    let err = plain
        .get_where(
            Condition::all().add(team::Column::City.eq("Boston")),
            &Preloads::none(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreFailure);

    let result = players
        .query_with_preloads(&Preloads::from(Preload::related::<team::Entity>()))
        .filter(team::Column::Name.eq("Hawks"))
        .all(players.connection())
        .await;
    let hawks = players.handle_error(Operation::Query, result).unwrap().unwrap();
    assert_eq!(hawks.len(), 3);
    for player in &hawks {
        let team = player.related::<team::Entity>().unwrap();
        assert_eq!(team.len(), 1);
        assert_eq!(team[0].name, "Hawks");
    }
}

#[tokio::test]
async fn test_same_relation_under_two_names_is_joined_once() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let plain = Players::new(test_db.db.clone());
    seed(&teams, &plain).await;

    let players = Players::new(test_db.db.clone()).with_default_joins([
        Join::relation(player::Relation::Team),
        Join::related::<player::Entity, team::Entity>(),
    ]);

    let hawks = players
        .get_where(
            Condition::all().add(team::Column::Name.eq("Hawks")),
            &Preloads::none(),
        )
        .await
        .unwrap();
    assert_eq!(hawks.len(), 3);
}

#[tokio::test]
async fn test_second_relation_to_the_same_table_is_aliased() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let plain = Players::new(test_db.db.clone());
    let (team_ids, _) = seed(&teams, &plain).await;

    let mut traded = new_player(team_ids[1], "Horford", "center");
    traded.former_team_id = Set(Some(team_ids[0]));
    let traded = plain.create(traded).await.unwrap();

    let players = Players::new(test_db.db.clone()).with_default_joins([
        Join::relation(player::Relation::Team),
        Join::relation(player::Relation::FormerTeam),
    ]);

    let from_atlanta = players
        .get_where(
            Condition::all()
                .add(team::Column::City.eq("Boston"))
                .add(Expr::col((Alias::new("teams_2"), team::Column::City)).eq("Atlanta")),
            &Preloads::none(),
        )
        .await
        .unwrap();
    assert_eq!(from_atlanta, vec![traded]);
}

#[tokio::test]
async fn test_to_many_default_join_does_not_repeat_rows() {
    let test_db = setup().await;
    let plain = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    seed(&plain, &players).await;

    let teams = Teams::new(test_db.db.clone())
        .with_default_joins([Join::relation(team::Relation::Player)]);

    let with_guards = teams
        .get_where(
            Condition::all().add(player::Column::Position.eq("guard")),
            &Preloads::none(),
        )
        .await
        .unwrap();
    assert_eq!(with_guards.len(), 2);

    let with_forwards = teams
        .get_where(
            Condition::all().add(player::Column::Position.eq("forward")),
            &Preloads::none(),
        )
        .await
        .unwrap();
    assert_eq!(with_forwards.len(), 1);
    assert_eq!(with_forwards[0].name, "Celtics");

    assert_eq!(teams.get_all(&Preloads::none()).await.unwrap().len(), 2);
    assert_eq!(teams.count_by_fields(&Filters::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_has_many_preload_fetches_every_associated_record() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    let (team_ids, seeded) = seed(&teams, &players).await;
    let expansion = teams.create(new_team("Hornets", "Charlotte")).await.unwrap();

    let with_roster = Preloads::from(Preload::related::<player::Entity>());
    let all = teams.get_all(&with_roster).await.unwrap();

    // One row per team, not one per player.
    assert_eq!(all.len(), 3);
    for team in &all {
        let roster = team.related::<player::Entity>().unwrap();
        let expected: Vec<_> = seeded.iter().filter(|p| p.team_id == team.id).collect();
        assert_eq!(roster.iter().collect::<Vec<_>>(), expected);
        assert_eq!(team.preloaded().collect::<Vec<_>>(), vec!["players"]);
    }

    let hawks = teams
        .get_one_by_id(team_ids[0].into(), &with_roster)
        .await
        .unwrap();
    assert_eq!(hawks.related::<player::Entity>().unwrap().len(), 3);

    let empty = teams
        .get_one_by_id(expansion.id.into(), &with_roster)
        .await
        .unwrap();
    assert_eq!(empty.related::<player::Entity>(), Some(&[][..]));

    let bare = teams.get_all(&Preloads::none()).await.unwrap();
    assert!(bare.iter().all(|t| t.related::<player::Entity>().is_none()));
}

#[tokio::test]
async fn test_belongs_to_preload_fetches_the_owner() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone());
    let players = Players::new(test_db.db.clone());
    seed(&teams, &players).await;

    let with_team = Preloads::none()
        .with(Preload::related::<team::Entity>())
        .with(Preload::related::<team::Entity>());
    let centers = players
        .get_by_field_batch("position", "center".into(), Pagination::new(10, 0), &with_team)
        .await
        .unwrap();

    assert_eq!(centers.len(), 2);
    let cities: Vec<_> = centers
        .iter()
        .map(|p| p.related::<team::Entity>().unwrap()[0].city.clone())
        .collect();
    assert_eq!(cities, vec!["Atlanta", "Boston"]);
    // The repeated directive was loaded once.
    assert_eq!(centers[0].preloaded().count(), 1);
}

#[tokio::test]
async fn test_get_all_includes_soft_deleted_rows() {
    let test_db = setup().await;
    let teams = Teams::new(test_db.db.clone())
        .with_soft_delete(team::Column::DisbandedAt)
        .unwrap();

    let sonics = teams.create(new_team("SuperSonics", "Seattle")).await.unwrap();
    teams.create(new_team("Lakers", "Los Angeles")).await.unwrap();
    teams.delete(sonics.clone()).await.unwrap();

    let all = teams.get_all(&Preloads::none()).await.unwrap();
    assert_eq!(all.len(), 2);
    let disbanded = all.iter().find(|t| t.id == sonics.id).unwrap();
    assert!(disbanded.disbanded_at.is_some());

    let active = teams
        .get_by_fields(&Filters::new(), &Preloads::none())
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Lakers");

    let batch = teams
        .get_batch(Pagination::new(10, 0), &Preloads::none())
        .await
        .unwrap();
    assert_eq!(batch.len(), 2);

    assert_eq!(teams.count_by_fields(&Filters::new()).await.unwrap(), 1);
}
