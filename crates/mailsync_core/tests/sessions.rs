use mailsync_core::db::open_db_in_memory;
use mailsync_core::{SqliteStore, Store, StoreError};

fn store() -> SqliteStore {
    SqliteStore::try_new(open_db_in_memory().unwrap()).unwrap()
}

#[test]
fn create_session_requires_existing_user() {
    let store = store();

    let err = store.create_session(1, "token", "us6").unwrap_err();
    assert!(matches!(
        err,
        StoreError::MissingReference { table: "Users", .. }
    ));
}

#[test]
fn login_then_lookup_roundtrip() {
    let store = store();
    let user = store.create_user("alice", "a@x.com").unwrap();

    let session = store.create_session(user.id, "token-1", "us6").unwrap();

    let loaded = store.get_session(session.id).unwrap().unwrap();
    assert_eq!(loaded, session);
    assert_eq!(loaded.user_id, user.id);
}

#[test]
fn sessions_list_by_owner_only() {
    let store = store();
    let alice = store.create_user("alice", "a@x.com").unwrap();
    let bob = store.create_user("bob", "b@x.com").unwrap();

    let first = store.create_session(alice.id, "tok-a1", "us6").unwrap();
    let second = store.create_session(alice.id, "tok-a2", "us6").unwrap();
    store.create_session(bob.id, "tok-b", "us14").unwrap();

    let sessions = store.list_sessions_by_user(alice.id).unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().any(|s| s.id == first.id));
    assert!(sessions.iter().any(|s| s.id == second.id));

    assert!(store.list_sessions_by_user(9999).unwrap().is_empty());
}

#[test]
fn logout_deletes_one_session_and_is_idempotent() {
    let store = store();
    let user = store.create_user("alice", "a@x.com").unwrap();

    let kept = store.create_session(user.id, "tok-1", "us6").unwrap();
    let dropped = store.create_session(user.id, "tok-2", "us6").unwrap();

    store.delete_session(dropped.id).unwrap();
    store.delete_session(dropped.id).unwrap();

    assert!(store.get_session(dropped.id).unwrap().is_none());
    assert!(store.get_session(kept.id).unwrap().is_some());
}

#[test]
fn blank_token_or_dc_is_rejected() {
    let store = store();
    let user = store.create_user("alice", "a@x.com").unwrap();

    assert!(matches!(
        store.create_session(user.id, "", "us6").unwrap_err(),
        StoreError::Validation(_)
    ));
    assert!(matches!(
        store.create_session(user.id, "tok", "").unwrap_err(),
        StoreError::Validation(_)
    ));
}
