use crucible_elo::db::open_db_in_memory;
use crucible_elo::{
    KeySpace, MemoryHashStore, RatingRepository, SqliteHashStore, StoreError,
    VoteCountRepository,
};
use rusqlite::Connection;
use std::collections::BTreeMap;

const CONTEST: i64 = 42;

#[test]
fn ratings_use_namespaced_hash_with_decimal_values() {
    let conn = open_db_in_memory().unwrap();
    let keys = KeySpace::new("arena");
    let ratings = RatingRepository::new(SqliteHashStore::new(&conn), keys.clone());
    let votes = VoteCountRepository::new(SqliteHashStore::new(&conn), keys);

    ratings.set_rating(CONTEST, 5, 1523).unwrap();
    votes.increment_vote_count(CONTEST, 5).unwrap();

    assert_eq!(
        stored_rows(&conn),
        vec![
            ("arena:42".to_string(), "5".to_string(), "1523".to_string()),
            ("arena:42:votes".to_string(), "5".to_string(), "1".to_string()),
        ]
    );
}

#[test]
fn raw_reads_distinguish_absent_from_default() {
    let conn = open_db_in_memory().unwrap();
    let ratings = RatingRepository::new(SqliteHashStore::new(&conn), KeySpace::default());

    assert_eq!(ratings.get_rating(CONTEST, 1).unwrap(), None);
    assert!(!ratings.has_rating(CONTEST, 1).unwrap());
    assert!(ratings.get_all_ratings(CONTEST).unwrap().is_empty());

    ratings.initialize_rating(CONTEST, 1).unwrap();

    assert_eq!(ratings.get_rating(CONTEST, 1).unwrap(), Some(1500));
    assert!(ratings.has_rating(CONTEST, 1).unwrap());
}

#[test]
fn set_multiple_ratings_overwrites_and_keeps_others() {
    let conn = open_db_in_memory().unwrap();
    let ratings = RatingRepository::new(SqliteHashStore::new(&conn), KeySpace::default());

    ratings
        .set_multiple_ratings(CONTEST, &BTreeMap::from([(1, 1400), (2, 1550)]))
        .unwrap();
    ratings
        .set_multiple_ratings(CONTEST, &BTreeMap::from([(2, 1610), (3, 1490)]))
        .unwrap();

    assert_eq!(
        ratings.get_all_ratings(CONTEST).unwrap(),
        BTreeMap::from([(1, 1400), (2, 1610), (3, 1490)])
    );
}

#[test]
fn delete_all_removes_only_ratings() {
    let store = MemoryHashStore::new();
    let ratings = RatingRepository::new(store.clone(), KeySpace::default());
    let votes = VoteCountRepository::new(store, KeySpace::default());

    ratings.set_rating(CONTEST, 1, 1510).unwrap();
    votes.increment_vote_count(CONTEST, 1).unwrap();
    ratings.delete_all(CONTEST).unwrap();

    assert_eq!(ratings.get_rating(CONTEST, 1).unwrap(), None);
    assert_eq!(votes.get_vote_count(CONTEST, 1).unwrap(), 1);
}

#[test]
fn non_numeric_stored_rating_is_reported() {
    let conn = open_db_in_memory().unwrap();
    insert_raw(&conn, "crucible_elo:42", "9", "1.5e3");
    let ratings = RatingRepository::new(SqliteHashStore::new(&conn), KeySpace::default());

    let err = ratings.get_rating(CONTEST, 9).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
    let err = ratings.get_all_ratings(CONTEST).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[test]
fn non_numeric_field_is_reported() {
    let conn = open_db_in_memory().unwrap();
    insert_raw(&conn, "crucible_elo:42", "top", "1500");
    let ratings = RatingRepository::new(SqliteHashStore::new(&conn), KeySpace::default());

    let err = ratings.get_all_ratings(CONTEST).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[test]
fn vote_counts_start_at_zero_and_only_grow() {
    let conn = open_db_in_memory().unwrap();
    let votes = VoteCountRepository::new(SqliteHashStore::new(&conn), KeySpace::default());

    assert_eq!(votes.get_vote_count(CONTEST, 1).unwrap(), 0);
    assert_eq!(votes.increment_vote_count(CONTEST, 1).unwrap(), 1);
    assert_eq!(votes.increment_vote_count(CONTEST, 1).unwrap(), 2);
    assert_eq!(votes.increment_pair(CONTEST, 1, 2).unwrap(), (3, 1));

    assert_eq!(
        votes.get_all_vote_counts(CONTEST).unwrap(),
        BTreeMap::from([(1, 3), (2, 1)])
    );
}

#[test]
fn vote_counts_are_independent_of_ratings() {
    let store = MemoryHashStore::new();
    let ratings = RatingRepository::new(store.clone(), KeySpace::default());
    let votes = VoteCountRepository::new(store, KeySpace::default());

    votes.increment_vote_count(CONTEST, 8).unwrap();

    assert_eq!(ratings.get_rating(CONTEST, 8).unwrap(), None);
    assert!(ratings.get_all_ratings(CONTEST).unwrap().is_empty());
}

fn stored_rows(conn: &Connection) -> Vec<(String, String, String)> {
    let mut stmt = conn
        .prepare("SELECT hash_key, field, value FROM hash_fields ORDER BY hash_key, field;")
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    rows
}

fn insert_raw(conn: &Connection, key: &str, field: &str, value: &str) {
    conn.execute(
        "INSERT INTO hash_fields (hash_key, field, value) VALUES (?1, ?2, ?3);",
        [key, field, value],
    )
    .unwrap();
}
