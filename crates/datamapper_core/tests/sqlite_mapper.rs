#[macro_use]
mod common;

use datamapper_core::{
    open_db, open_db_in_memory, DataMapper, OrmError, Repository, SqliteDataMapper, SqliteStore,
    Value,
};

fn articles<'conn>(store: &SqliteStore<'conn>) -> Repository<'conn> {
    Repository::new(SqliteDataMapper::new(common::builder(), "Article", store.clone()).unwrap())
}

fn with_repository(case: fn(&mut Repository<'_>)) {
    let conn = open_db_in_memory().unwrap();
    let mut repository = articles(&SqliteStore::new(&conn));
    common::seed(&mut repository);
    case(&mut repository);
}

repository_contract_tests!(with_repository);

#[test]
fn fields_map_to_their_columns() {
    let conn = open_db_in_memory().unwrap();
    let mut repository = articles(&SqliteStore::new(&conn));
    common::seed(&mut repository);

    let hits: i64 = conn
        .query_row("SELECT hit_count FROM articles WHERE id = 3", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(hits, 33);
}

#[test]
fn failed_commit_rolls_back_whole_batch() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::new(&conn);
    let mut first = articles(&store);
    let mut second = articles(&store);
    common::seed(&mut first);

    let mut fresh = first.create().unwrap();
    fresh.set("title", "Never stored").unwrap();
    first.add(&mut fresh).unwrap();
    let mut doomed = first.get_by_id(4).unwrap();
    doomed.set("title", "Too late").unwrap();
    first.add(&mut doomed).unwrap();

    let victim = second.get_by_id(4).unwrap();
    second.delete(&victim).unwrap();
    second.commit().unwrap();

    assert!(matches!(
        first.commit(),
        Err(OrmError::UnknownIdentity { .. })
    ));
    assert!(first.pending().is_empty());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn explicit_identity_must_be_unused() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::new(&conn);
    let mut mapper = SqliteDataMapper::new(common::builder(), "Article", store.clone()).unwrap();
    common::seed(&mut articles(&store));

    let mut clash = mapper.builder().create("Article").unwrap();
    clash.set("id", 2).unwrap();
    clash.set("title", "Clash").unwrap();
    assert!(matches!(
        mapper.insert(&mut clash),
        Err(OrmError::DuplicateIdentity { .. })
    ));
    assert!(mapper.pending().is_empty());
}

#[test]
fn commits_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("articles.sqlite3");

    {
        let conn = open_db(&path).unwrap();
        common::seed(&mut articles(&SqliteStore::new(&conn)));
    }

    let conn = open_db(&path).unwrap();
    let mut repository = articles(&SqliteStore::new(&conn));
    let reopened = repository.get_by_id(3).unwrap();
    assert_eq!(reopened.get("title"), Some(&Value::from("Part One")));
    assert_eq!(reopened.get("parent_id"), Some(&Value::Integer(2)));

    let mut next = repository.create().unwrap();
    next.set("title", "After reopen").unwrap();
    repository.add(&mut next).unwrap();
    assert_eq!(next.id(), &Value::Integer(5));
}

#[test]
fn repositories_sharing_a_store_reserve_distinct_identities() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::new(&conn);
    let mut first = articles(&store);
    let mut second = articles(&store);
    common::seed(&mut first);

    let mut from_first = first.create().unwrap();
    from_first.set("title", "From first").unwrap();
    first.add(&mut from_first).unwrap();
    let mut from_second = second.create().unwrap();
    from_second.set("title", "From second").unwrap();
    second.add(&mut from_second).unwrap();

    assert_eq!(from_first.id(), &Value::Integer(5));
    assert_eq!(from_second.id(), &Value::Integer(6));
    second.commit().unwrap();
    first.commit().unwrap();

    let stored = first.find_all().get_items(None, 0).unwrap();
    assert_eq!(common::ids(&stored), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn real_values_render_like_sqlite_text_casts() {
    let conn = open_db_in_memory().unwrap();
    for real in [2.0, -2.5, 0.1, 123.456, 1.5] {
        let cast: String = conn
            .query_row("SELECT CAST(?1 AS TEXT)", [real], |row| row.get(0))
            .unwrap();
        assert_eq!(Value::Real(real).to_text(), Some(cast), "rendering {real}");
    }
}

#[test]
fn unordered_results_follow_identity_not_commit_order() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::new(&conn);
    let mut repository = articles(&store);
    common::seed(&mut repository);
    let mut mapper = SqliteDataMapper::new(common::builder(), "Article", store.clone()).unwrap();
    common::reinsert_second_article(&mut repository, &mut mapper);

    let items = repository.find_all().get_items(None, 0).unwrap();
    assert_eq!(common::ids(&items), vec![1, 2, 3, 4]);
    let first_two = repository.find_all().get_items(Some(2), 0).unwrap();
    assert_eq!(common::ids(&first_two), vec![1, 2]);
}
