mod helpers;

use std::thread;

use memoir::db;
use memoir::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use memoir::memory::forget::forget;
use memoir::memory::records::get_extended;
use memoir::memory::search::{retrieve, DEFAULT_K, NO_MEMORIES};
use memoir::memory::types::{Tier, WriteRequest};
use memoir::memory::write::write;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("memory.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();
    assert!(db_path.exists());
    assert_eq!(helpers::count(&conn, "identity_memory"), 0);
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn busy_timeout_and_wal_are_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("memory.db")).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);

    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(mode, "wal");
}

#[test]
fn reopening_keeps_data() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memory.db");
    {
        let mut conn = db::open_database(&path).unwrap();
        write(&mut conn, &helpers::no_embeddings(), &WriteRequest::new(Tier::Extended, "employer", "Acme")).unwrap();
    }
    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_extended(&conn, "employer").unwrap().unwrap().value, "Acme");
}

#[test]
fn events_cannot_be_deleted_or_edited() {
    let conn = helpers::test_db();
    memoir::memory::events::record_event(&conn, None, "probe", &serde_json::json!({})).unwrap();

    assert!(conn.execute("DELETE FROM memory_events", []).is_err());
    assert!(conn.execute("UPDATE memory_events SET event = 'x'", []).is_err());
    assert_eq!(helpers::count(&conn, "memory_events"), 1);
}

#[test]
fn concurrent_list_writes_lose_nothing() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memory.db");

    // Open sequentially so schema setup does not race.
    let conns: Vec<_> = (0..2).map(|_| db::open_database(&path).unwrap()).collect();

    let handles: Vec<_> = conns
        .into_iter()
        .enumerate()
        .map(|(worker, mut conn)| {
            thread::spawn(move || {
                let engine = helpers::no_embeddings();
                for i in 0..20 {
                    let req = WriteRequest::new(Tier::Extended, "interests", format!("topic {worker}-{i}"));
                    let res = write(&mut conn, &engine, &req).unwrap();
                    assert!(res.ok);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let conn = db::open_database(&path).unwrap();
    let value = get_extended(&conn, "interests").unwrap().unwrap().value;
    assert_eq!(value.lines().count(), 40);
    for worker in 0..2 {
        for i in 0..20 {
            assert!(value.contains(&format!("- topic {worker}-{i}")));
        }
    }
}

#[test]
fn legacy_database_is_upgraded_on_open() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memory.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE user_memory (key TEXT PRIMARY KEY, value TEXT, category TEXT, last_updated TEXT);
             INSERT INTO user_memory VALUES ('timezone', 'CET', 'identity', '2024-03-01T00:00:00+00:00');
             INSERT INTO user_memory VALUES ('goals', '[\"run\", \"swim\"]', 'auto', NULL);",
        )
        .unwrap();
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    let tz = memoir::memory::records::get_identity(&conn, "timezone").unwrap().unwrap();
    assert_eq!(tz.value, "CET");
    assert_eq!(get_extended(&conn, "goals").unwrap().unwrap().value, "[\"run\", \"swim\"]");

    let report = db::check_database_health(&conn).unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.records_without_meta, 0);
    let meta = memoir::memory::meta::get_meta(&conn, "goals").unwrap().unwrap();
    assert_eq!(meta.body.authority, Some(memoir::memory::types::Authority::Imported));
}

#[test]
fn legacy_vectors_are_forgotten_with_their_key() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memory.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE user_memory (key TEXT PRIMARY KEY, value TEXT, category TEXT, last_updated TEXT);
             CREATE TABLE vector_memory (id INTEGER PRIMARY KEY AUTOINCREMENT, content TEXT NOT NULL,
                 embedding BLOB NOT NULL, meta_json TEXT NOT NULL, created_at TEXT, last_updated TEXT);
             INSERT INTO user_memory VALUES ('interests', '- chess', 'auto', '2024-03-01T00:00:00+00:00');",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO vector_memory (content, embedding, meta_json) VALUES ('- chess', ?1, '{}')",
            [memoir::memory::embedding_to_bytes(&helpers::test_embedding(0))],
        )
        .unwrap();
    }

    let mut conn = db::open_database(&path).unwrap();
    let engine = helpers::engine_with(&[("chess", helpers::test_embedding(0))]);
    let out = retrieve(&conn, &engine, None, "chess", DEFAULT_K).unwrap();
    assert_eq!(out, "[RELEVANT MEMORY (Tier-B)]\n* [interests] - chess");

    assert!(forget(&mut conn, "interests", None).unwrap());
    assert_eq!(helpers::count(&conn, "vector_memory"), 0);
    assert_eq!(retrieve(&conn, &engine, None, "chess", DEFAULT_K).unwrap(), NO_MEMORIES);
}
