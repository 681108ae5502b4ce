use crucible_elo::db::open_db_with_timeout;
use crucible_elo::{
    EntryId, KeySpace, MemoryHashStore, RatingRepository, SqliteHashStore, VoteResult,
    VoteService, DEFAULT_RATING,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const CONTEST: i64 = 3;
const LOCK_WAIT: Duration = Duration::from_secs(30);

type Applied = Vec<(EntryId, EntryId, VoteResult)>;

#[test]
fn disjoint_pairs_on_sqlite_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let path = migrated_db(dir.path());

    let pairs = (0..8_i64).map(|i| (i * 2, i * 2 + 1)).collect::<Vec<_>>();
    let applied = run_sqlite_workers(&path, pairs.iter().map(|pair| vec![*pair]).collect());

    assert_eq!(applied.len(), pairs.len());
    for (_, _, result) in &applied {
        assert_eq!(result.winner_old_rating, DEFAULT_RATING);
        assert_eq!(result.loser_old_rating, DEFAULT_RATING);
        assert_eq!(result.winner_delta, 16);
        assert_eq!(result.winner_delta + result.loser_delta, 0);
    }

    let conn = open_db_with_timeout(&path, LOCK_WAIT).unwrap();
    let ratings = RatingRepository::new(SqliteHashStore::new(&conn), KeySpace::default());
    let all = ratings.get_all_ratings(CONTEST).unwrap();
    assert_eq!(all.len(), 16);
    for (winner, loser) in pairs {
        assert_eq!(all[&winner], 1516);
        assert_eq!(all[&loser], 1484);
    }
}

#[test]
fn overlapping_votes_on_sqlite_lose_no_updates() {
    let dir = tempfile::tempdir().unwrap();
    let path = migrated_db(dir.path());

    // Every worker walks the same ring of four entries, so each vote shares
    // an entry with votes of every other worker.
    let ring = [1_i64, 2, 3, 4];
    let plans = (0..6_usize)
        .map(|worker| {
            (0..20_usize)
                .map(|step| {
                    let at = worker + step;
                    (ring[at % ring.len()], ring[(at + 1) % ring.len()])
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let applied = run_sqlite_workers(&path, plans);
    assert_eq!(applied.len(), 6 * 20);

    let conn = open_db_with_timeout(&path, LOCK_WAIT).unwrap();
    let ratings = RatingRepository::new(SqliteHashStore::new(&conn), KeySpace::default());
    assert_deltas_account_for_ratings(&applied, &ratings.get_all_ratings(CONTEST).unwrap());
}

#[test]
fn overlapping_votes_on_memory_store_lose_no_updates() {
    let store = MemoryHashStore::new();
    let ratings = RatingRepository::new(store.clone(), KeySpace::default());
    let barrier = Arc::new(Barrier::new(8));

    let handles = (0..8_i64)
        .map(|worker| {
            let service = VoteService::new(ratings.clone());
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut applied = Vec::new();
                for step in 0..50_i64 {
                    let winner = (worker + step) % 3;
                    let loser = (worker + step + 1) % 3;
                    let k = 16.0 + (worker as f64) * 4.0;
                    let result = service.process_vote(CONTEST, winner, loser, k, 32.0).unwrap();
                    applied.push((winner, loser, result));
                }
                applied
            })
        })
        .collect::<Vec<_>>();

    let applied = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(applied.len(), 8 * 50);
    assert_eq!(store.write_calls().unwrap(), 8 * 50);
    assert_deltas_account_for_ratings(&applied, &ratings.get_all_ratings(CONTEST).unwrap());
}

fn migrated_db(dir: &Path) -> PathBuf {
    let path = dir.join("crucible.db");
    drop(open_db_with_timeout(&path, LOCK_WAIT).unwrap());
    path
}

/// Runs one worker thread per plan, each on its own connection.
fn run_sqlite_workers(path: &Path, plans: Vec<Vec<(EntryId, EntryId)>>) -> Applied {
    let barrier = Arc::new(Barrier::new(plans.len()));

    let handles = plans
        .into_iter()
        .map(|plan| {
            let path = path.to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db_with_timeout(&path, LOCK_WAIT).unwrap();
                let ratings =
                    RatingRepository::new(SqliteHashStore::new(&conn), KeySpace::default());
                let service = VoteService::new(ratings);

                barrier.wait();
                plan.into_iter()
                    .map(|(winner, loser)| {
                        let result = service
                            .process_vote(CONTEST, winner, loser, 32.0, 32.0)
                            .unwrap();
                        (winner, loser, result)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect()
}

/// Each final rating must equal the default plus every delta the entry saw.
fn assert_deltas_account_for_ratings(applied: &Applied, stored: &BTreeMap<EntryId, i64>) {
    let mut expected = BTreeMap::new();
    for (winner, loser, result) in applied {
        assert_eq!(result.winner_delta + result.loser_delta, 0);
        *expected.entry(*winner).or_insert(DEFAULT_RATING) += result.winner_delta;
        *expected.entry(*loser).or_insert(DEFAULT_RATING) += result.loser_delta;
    }

    assert_eq!(&expected, stored);
    let total: i64 = stored.values().sum();
    assert_eq!(total, DEFAULT_RATING * stored.len() as i64);
}
