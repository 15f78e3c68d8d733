mod helpers;

use helpers::{count, embedding_with_similarity, engine_with, event_names, no_embeddings, test_db, test_embedding};
use memoir::memory::events::recent_events;
use memoir::memory::forget::forget;
use memoir::memory::search::{retrieve, DEFAULT_K, NO_MEMORIES};
use memoir::memory::types::{Tier, WriteRequest};
use memoir::memory::write::write;

#[test]
fn similarity_below_cutoff_is_not_returned() {
    let mut conn = test_db();
    let engine = engine_with(&[
        ("level 3", test_embedding(0)),
        ("xyzzy", embedding_with_similarity(0.30)),
        ("plugh", embedding_with_similarity(0.50)),
    ]);

    write(&mut conn, &engine, &WriteRequest::new(Tier::Extended, "misc", "parked on level 3")).unwrap();
    assert_eq!(count(&conn, "vector_memory"), 1);

    let out = retrieve(&conn, &engine, None, "xyzzy", DEFAULT_K).unwrap();
    assert_eq!(out, NO_MEMORIES);

    let out = retrieve(&conn, &engine, None, "plugh", DEFAULT_K).unwrap();
    assert_eq!(out, "[RELEVANT MEMORY (Tier-B)]\n* - parked on level 3");
}

#[test]
fn keyword_fallback_without_embeddings() {
    let mut conn = test_db();
    let engine = no_embeddings();

    write(&mut conn, &engine, &WriteRequest::new(Tier::Extended, "interests", "chess")).unwrap();
    write(&mut conn, &engine, &WriteRequest::new(Tier::Identity, "preferred_name", "Sam")).unwrap();

    let out = retrieve(&conn, &engine, Some("s1"), "do I enjoy chess?", DEFAULT_K).unwrap();
    assert_eq!(
        out,
        "[USER IDENTITY (Tier-A)]\n* Preferred name: Sam\n\n[RELEVANT MEMORY (Tier-B)]\n* [interests] - chess"
    );

    let events = recent_events(&conn, Some("s1")).unwrap();
    assert_eq!(events[0].event, "memory_retrieve");
    assert_eq!(events[0].payload["found"], 1);
    assert_eq!(events[0].payload["sources"][0], "keyword");
}

#[test]
fn vector_and_keyword_hits_are_fused() {
    let mut conn = test_db();
    let engine = engine_with(&[("chess", test_embedding(0))]);

    write(&mut conn, &engine, &WriteRequest::new(Tier::Extended, "interests", "chess")).unwrap();

    let out = retrieve(&conn, &engine, Some("s1"), "chess openings", DEFAULT_K).unwrap();
    assert_eq!(out, "[RELEVANT MEMORY (Tier-B)]\n* [interests] - chess");

    let events = recent_events(&conn, Some("s1")).unwrap();
    assert_eq!(events[0].payload["sources"][0], "vector+keyword");
}

#[test]
fn only_latest_vector_per_key_is_kept() {
    let mut conn = test_db();
    let engine = engine_with(&[]);

    write(&mut conn, &engine, &WriteRequest::new(Tier::Extended, "interests", "chess")).unwrap();
    write(&mut conn, &engine, &WriteRequest::new(Tier::Extended, "interests", "go")).unwrap();

    assert_eq!(count(&conn, "vector_memory"), 1);
    let content: String = conn
        .query_row("SELECT content FROM vector_memory", [], |r| r.get(0))
        .unwrap();
    assert_eq!(content, "- chess\n- go");
}

#[test]
fn forgotten_key_does_not_resurface() {
    let mut conn = test_db();
    let engine = engine_with(&[("engineer", test_embedding(0))]);

    write(&mut conn, &engine, &WriteRequest::new(Tier::Extended, "occupation", "Engineer")).unwrap();
    let before = retrieve(&conn, &engine, None, "engineer", DEFAULT_K).unwrap();
    assert!(before.contains("[occupation] Engineer"));

    assert!(forget(&mut conn, "job", Some("s1")).unwrap());

    let after = retrieve(&conn, &engine, None, "engineer", DEFAULT_K).unwrap();
    assert_eq!(after, NO_MEMORIES);
    assert_eq!(count(&conn, "vector_memory"), 0);
    assert_eq!(count(&conn, "memory_meta"), 0);
    assert!(event_names(&conn).contains(&"memory_forget".to_string()));
}

#[test]
fn forgetting_missing_key_still_logs() {
    let mut conn = test_db();
    assert!(!forget(&mut conn, "goals", None).unwrap());
    assert_eq!(event_names(&conn), vec!["memory_forget"]);
}

#[test]
fn k_limits_extended_items() {
    let mut conn = test_db();
    let engine = no_embeddings();
    for key in ["interests", "goals", "projects"] {
        write(&mut conn, &engine, &WriteRequest::new(Tier::Extended, key, "garden work")).unwrap();
    }
    // Identical content fuses into one item, so vary it.
    write(&mut conn, &engine, &WriteRequest::new(Tier::Extended, "habits_routines", "garden daily")).unwrap();

    let out = retrieve(&conn, &engine, None, "garden", 1).unwrap();
    assert_eq!(out.lines().count(), 2);
}
