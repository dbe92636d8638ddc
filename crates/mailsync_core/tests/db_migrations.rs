use mailsync_core::db::migrations::latest_version;
use mailsync_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "Users");
    assert_table_exists(&conn, "UserSessions");
    assert_table_exists(&conn, "Campaigns");
    assert_table_exists(&conn, "Members");
}

#[test]
fn final_revision_drops_lists_and_rescopes_members() {
    let conn = open_db_in_memory().unwrap();

    assert!(!table_exists(&conn, "Lists"));
    assert!(table_has_column(&conn, "Members", "CampaignId"));
    assert!(!table_has_column(&conn, "Members", "ListId"));
    assert!(table_has_column(&conn, "Campaigns", "MemberListId"));
    assert!(!table_has_column(&conn, "Campaigns", "WebhookId"));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mailsync.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "Users");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn revision_three_carries_list_members_onto_matching_campaigns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rev2.db");

    // A database as revision 2 left it: lists still exist and members are
    // scoped to them.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Users (
            Id INTEGER PRIMARY KEY,
            Username TEXT NOT NULL,
            Email TEXT NOT NULL,
            LastSynced INTEGER
        );
        CREATE TABLE UserSessions (
            Id TEXT NOT NULL PRIMARY KEY,
            UserId INTEGER NOT NULL REFERENCES Users (Id),
            AccessToken TEXT NOT NULL,
            Dc TEXT NOT NULL
        );
        CREATE TABLE Lists (
            Id TEXT NOT NULL PRIMARY KEY,
            UserId INTEGER NOT NULL REFERENCES Users (Id),
            WebhookId TEXT NOT NULL
        );
        CREATE TABLE Members (
            EmailId TEXT NOT NULL,
            FullName TEXT NOT NULL,
            ListId TEXT NOT NULL REFERENCES Lists (Id)
        );
        CREATE TABLE Campaigns (
            Id TEXT NOT NULL PRIMARY KEY,
            Title TEXT NOT NULL,
            ListId TEXT NOT NULL,
            UserId INTEGER NOT NULL REFERENCES Users (Id),
            VideoTag TEXT,
            ImageTag TEXT
        );
        INSERT INTO Users (Id, Username, Email) VALUES (1, 'alice', 'a@x.com');
        INSERT INTO Lists VALUES ('list-1', 1, 'wh-1');
        INSERT INTO Members VALUES ('r@x.com', 'Bob', 'list-1');
        INSERT INTO Campaigns (Id, Title, ListId, UserId) VALUES ('c1', 'Launch', 'list-1', 1);
        PRAGMA user_version = 2;",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert!(!table_exists(&conn, "Lists"));

    let campaign_id: String = conn
        .query_row(
            "SELECT CampaignId FROM Members WHERE EmailId = 'r@x.com';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(campaign_id, "c1");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert!(table_exists(conn, table_name), "table {table_name} does not exist");
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> bool {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    let mut rows = stmt.query([]).unwrap();
    while let Some(row) = rows.next().unwrap() {
        let current: String = row.get(1).unwrap();
        if current == column {
            return true;
        }
    }
    false
}
