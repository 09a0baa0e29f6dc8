//! Dead-letter recording and sweep tests

mod common;

use common::*;
use rollcall::sweep::run_sweep;

#[test]
fn test_record_and_list_dead_letters() {
    let conn = setup_test_db();

    queries::record_dead_letter(&conn, "workos", "evt_1", "user.created", "{}", "db locked")
        .unwrap();

    let letters = queries::list_unresolved_dead_letters(&conn, 10).unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].provider, "workos");
    assert_eq!(letters[0].event_id, "evt_1");
    assert_eq!(letters[0].attempts, 1);
    assert_eq!(letters[0].resolved_at, None);
}

#[test]
fn test_repeated_failure_bumps_attempts() {
    let conn = setup_test_db();

    queries::record_dead_letter(&conn, "workos", "evt_1", "user.created", "{}", "first").unwrap();
    queries::record_dead_letter(&conn, "workos", "evt_1", "user.created", "{}", "second").unwrap();

    let letters = queries::list_unresolved_dead_letters(&conn, 10).unwrap();
    assert_eq!(letters.len(), 1, "One row per event, not one per failure");
    assert_eq!(letters[0].attempts, 2);
    assert_eq!(letters[0].error, "second");
}

#[test]
fn test_resolve_removes_from_unresolved_listing() {
    let conn = setup_test_db();

    queries::record_dead_letter(&conn, "workos", "evt_1", "user.created", "{}", "err").unwrap();
    let letter = &queries::list_unresolved_dead_letters(&conn, 10).unwrap()[0];

    assert!(queries::resolve_dead_letter(&conn, &letter.id).unwrap());
    assert!(queries::list_unresolved_dead_letters(&conn, 10)
        .unwrap()
        .is_empty());

    // Resolving twice is a no-op
    assert!(!queries::resolve_dead_letter(&conn, &letter.id).unwrap());
}

#[test]
fn test_sweep_replays_dead_letter_and_resolves_it() {
    let pool = setup_test_pool();

    let payload = workos_user_event("evt_1", "user.created", "usr_1", "a@b.com");
    {
        let conn = pool.get().unwrap();
        queries::record_dead_letter(
            &conn,
            "workos",
            "evt_1",
            "user.created",
            &payload,
            "db locked",
        )
        .unwrap();
    }

    let stats = run_sweep(&pool, 7).unwrap();
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.still_failing, 0);

    let conn = pool.get().unwrap();
    let user = queries::get_user_by_external_id(&conn, "usr_1")
        .unwrap()
        .unwrap();
    assert_eq!(user.email.as_deref(), Some("a@b.com"));
    assert!(queries::list_unresolved_dead_letters(&conn, 10)
        .unwrap()
        .is_empty());
}

#[test]
fn test_sweep_keeps_unparseable_payload_unresolved() {
    let pool = setup_test_pool();

    {
        let conn = pool.get().unwrap();
        queries::record_dead_letter(
            &conn,
            "workos",
            "evt_1",
            "user.created",
            "not json",
            "db locked",
        )
        .unwrap();
    }

    let stats = run_sweep(&pool, 7).unwrap();
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.resolved, 0);
    assert_eq!(stats.still_failing, 1);

    let conn = pool.get().unwrap();
    let letters = queries::list_unresolved_dead_letters(&conn, 10).unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].attempts, 2);
}

#[test]
fn test_sweep_purges_old_event_ids() {
    let pool = setup_test_pool();

    {
        let conn = pool.get().unwrap();
        queries::try_record_webhook_event(&conn, "workos", "evt_old").unwrap();
        // Age the record past retention
        conn.execute(
            "UPDATE webhook_events SET created_at = created_at - (10 * 86400)",
            [],
        )
        .unwrap();
        queries::try_record_webhook_event(&conn, "workos", "evt_fresh").unwrap();
    }

    let stats = run_sweep(&pool, 7).unwrap();
    assert_eq!(stats.purged_events, 1);

    let conn = pool.get().unwrap();
    assert!(
        queries::try_record_webhook_event(&conn, "workos", "evt_old").unwrap(),
        "Purged event id is processable again"
    );
    assert!(
        !queries::try_record_webhook_event(&conn, "workos", "evt_fresh").unwrap(),
        "Fresh event id still deduplicates"
    );
}
