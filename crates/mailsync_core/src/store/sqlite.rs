//! SQLite-backed implementation of the store contract.
//!
//! # Responsibility
//! - Execute every mutation inside one IMMEDIATE transaction.
//! - Enforce reference checks and cascades as explicit ordered walks.
//!
//! # Invariants
//! - Reference checks run inside the same transaction as the write they
//!   guard; the connection mutex serializes writers.
//! - Cascade deletes execute the plan from [`graph::cascade_delete_plan`],
//!   dependents first.
//! - Key renames rewrite the parent before its referencing rows under
//!   `defer_foreign_keys`, so the declared FKs are re-checked at commit.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::{DbConfig, DbError};
use crate::model::campaign::Campaign;
use crate::model::member::Member;
use crate::model::require_non_empty;
use crate::model::session::{SessionId, UserSession};
use crate::model::user::{User, UserId};
use crate::store::graph::{cascade_delete_plan, edges_from};
use crate::store::{Store, StoreError, StoreResult};
use log::{info, warn};
use rusqlite::{params, Connection, ErrorCode, Row, ToSql, Transaction, TransactionBehavior};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const RETRY_BACKOFF_MS: u64 = 25;

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("Users", &["Id", "Username", "Email", "LastSynced"]),
    ("UserSessions", &["Id", "UserId", "AccessToken", "Dc"]),
    (
        "Campaigns",
        &["Id", "Title", "MemberListId", "UserId", "VideoTag", "ImageTag"],
    ),
    ("Members", &["EmailId", "FullName", "CampaignId"]),
];

/// Thread-safe store over one SQLite connection.
///
/// The mutex makes the store shareable across threads; combined with
/// IMMEDIATE transactions it gives every operation serializable behavior
/// with respect to the rows it touches.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_write_attempts: u32,
}

impl SqliteStore {
    /// Wraps a migrated connection, rejecting unprepared ones.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        Self::try_with_config(conn, &DbConfig::default())
    }

    /// Wraps a migrated connection using explicit tunables.
    pub fn try_with_config(conn: Connection, config: &DbConfig) -> StoreResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_write_attempts: config.max_write_attempts.max(1),
        })
    }

    fn write_op<T>(
        &self,
        op: &'static str,
        run: impl Fn(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.lock_conn();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = run_in_transaction(&mut conn, &run);
            match outcome {
                Err(StoreError::Db(DbError::Sqlite(err))) if is_busy(&err) => {
                    if attempt >= self.max_write_attempts {
                        return Err(StoreError::Contention { attempts: attempt });
                    }
                    warn!(
                        "event=store_retry module=store op={op} attempt={attempt} error={err}"
                    );
                    thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)));
                }
                other => return other,
            }
        }
    }

    fn read_op<T>(&self, run: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.lock_conn();
        run(&conn)
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock only means another caller panicked mid-operation;
        // any transaction it held has already rolled back.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn run_in_transaction<T>(
    conn: &mut Connection,
    run: &impl Fn(&Transaction<'_>) -> StoreResult<T>,
) -> StoreResult<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = run(&tx)?;
    tx.commit()?;
    Ok(value)
}

impl Store for SqliteStore {
    fn create_user(&self, username: &str, email: &str) -> StoreResult<User> {
        let mut user = User::with_id(0, username, email);
        user.validate()?;

        let id = self.write_op("user_create", |tx| {
            tx.execute(
                "INSERT INTO Users (Username, Email, LastSynced) VALUES (?1, ?2, NULL);",
                params![user.username, user.email],
            )?;
            Ok(tx.last_insert_rowid())
        })?;

        user.id = id;
        Ok(user)
    }

    fn create_user_with_id(&self, id: UserId, username: &str, email: &str) -> StoreResult<User> {
        let user = User::with_id(id, username, email);
        user.validate()?;

        self.write_op("user_import", |tx| {
            if row_exists(tx, "Users", "Id", &id)? {
                return Err(StoreError::DuplicateKey {
                    table: "Users",
                    key: id.to_string(),
                });
            }
            tx.execute(
                "INSERT INTO Users (Id, Username, Email, LastSynced) VALUES (?1, ?2, ?3, NULL);",
                params![id, user.username, user.email],
            )?;
            Ok(())
        })?;

        Ok(user)
    }

    fn mark_user_synced(&self, id: UserId, synced_at_ms: i64) -> StoreResult<bool> {
        self.write_op("user_mark_synced", |tx| {
            let changed = tx.execute(
                "UPDATE Users SET LastSynced = ?2 WHERE Id = ?1;",
                params![id, synced_at_ms],
            )?;
            Ok(changed > 0)
        })
    }

    fn rename_user_id(&self, old_id: UserId, new_id: UserId) -> StoreResult<bool> {
        self.write_op("user_rename", |tx| {
            if !row_exists(tx, "Users", "Id", &old_id)? {
                return Ok(false);
            }
            if new_id != old_id && row_exists(tx, "Users", "Id", &new_id)? {
                return Err(StoreError::DuplicateKey {
                    table: "Users",
                    key: new_id.to_string(),
                });
            }
            if new_id == old_id {
                return Ok(true);
            }

            // The parent key must move before its children are rewritten;
            // the declared FKs are re-validated when the transaction commits.
            tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
            tx.execute(
                "UPDATE Users SET Id = ?2 WHERE Id = ?1;",
                params![old_id, new_id],
            )?;

            let mut rewritten = 0;
            for edge in edges_from("Users") {
                rewritten += tx.execute(
                    &format!(
                        "UPDATE {} SET {} = ?2 WHERE {} = ?1;",
                        edge.child, edge.child_fk, edge.child_fk
                    ),
                    params![old_id, new_id],
                )?;
            }

            info!(
                "event=cascade_rename module=store table=Users old={old_id} new={new_id} rewritten={rewritten}"
            );
            Ok(true)
        })
    }

    fn delete_user(&self, id: UserId) -> StoreResult<()> {
        self.write_op("user_delete", |tx| {
            let removed = execute_cascade(tx, "Users", &id)?;
            if removed > 0 {
                info!("event=cascade_delete module=store root=Users key={id} rows={removed}");
            }
            Ok(())
        })
    }

    fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        self.read_op(|conn| {
            let mut stmt = conn.prepare(
                "SELECT Id, Username, Email, LastSynced FROM Users WHERE Id = ?1;",
            )?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(parse_user_row(row)?)),
                None => Ok(None),
            }
        })
    }

    fn create_session(
        &self,
        user_id: UserId,
        access_token: &str,
        dc: &str,
    ) -> StoreResult<UserSession> {
        let session = UserSession::new(user_id, access_token, dc);
        session.validate()?;

        self.write_op("session_create", |tx| {
            require_row(tx, "Users", "Id", &user_id, user_id.to_string())?;
            tx.execute(
                "INSERT INTO UserSessions (Id, UserId, AccessToken, Dc) VALUES (?1, ?2, ?3, ?4);",
                params![
                    session.id.to_string(),
                    session.user_id,
                    session.access_token,
                    session.dc
                ],
            )?;
            Ok(())
        })?;

        Ok(session)
    }

    fn get_session(&self, id: SessionId) -> StoreResult<Option<UserSession>> {
        self.read_op(|conn| {
            let mut stmt = conn.prepare(
                "SELECT Id, UserId, AccessToken, Dc FROM UserSessions WHERE Id = ?1;",
            )?;
            let mut rows = stmt.query(params![id.to_string()])?;
            match rows.next()? {
                Some(row) => Ok(Some(parse_session_row(row)?)),
                None => Ok(None),
            }
        })
    }

    fn delete_session(&self, id: SessionId) -> StoreResult<()> {
        self.write_op("session_delete", |tx| {
            tx.execute(
                "DELETE FROM UserSessions WHERE Id = ?1;",
                params![id.to_string()],
            )?;
            Ok(())
        })
    }

    fn list_sessions_by_user(&self, user_id: UserId) -> StoreResult<Vec<UserSession>> {
        self.read_op(|conn| {
            let mut stmt = conn.prepare(
                "SELECT Id, UserId, AccessToken, Dc
                 FROM UserSessions
                 WHERE UserId = ?1
                 ORDER BY Id ASC;",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(parse_session_row(row)?);
            }
            Ok(sessions)
        })
    }

    fn create_campaign(
        &self,
        title: &str,
        member_list_id: &str,
        user_id: UserId,
    ) -> StoreResult<Campaign> {
        let campaign = Campaign::new(title, member_list_id, user_id);
        self.insert_campaign("campaign_create", campaign, false)
    }

    fn create_campaign_with_id(
        &self,
        id: &str,
        title: &str,
        member_list_id: &str,
        user_id: UserId,
    ) -> StoreResult<Campaign> {
        let campaign = Campaign::with_id(id, title, member_list_id, user_id);
        self.insert_campaign("campaign_import", campaign, true)
    }

    fn set_merge_tags(
        &self,
        campaign_id: &str,
        video_tag: &str,
        image_tag: &str,
    ) -> StoreResult<bool> {
        self.write_op("campaign_set_tags", |tx| {
            let changed = tx.execute(
                "UPDATE Campaigns SET VideoTag = ?2, ImageTag = ?3 WHERE Id = ?1;",
                params![campaign_id, video_tag, image_tag],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_campaign(&self, id: &str) -> StoreResult<()> {
        self.write_op("campaign_delete", |tx| {
            let removed = execute_cascade(tx, "Campaigns", &id)?;
            if removed > 0 {
                info!(
                    "event=cascade_delete module=store root=Campaigns key={id} rows={removed}"
                );
            }
            Ok(())
        })
    }

    fn get_campaign(&self, id: &str) -> StoreResult<Option<Campaign>> {
        self.read_op(|conn| {
            let mut stmt = conn.prepare(
                "SELECT Id, Title, MemberListId, UserId, VideoTag, ImageTag
                 FROM Campaigns
                 WHERE Id = ?1;",
            )?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(parse_campaign_row(row)?)),
                None => Ok(None),
            }
        })
    }

    fn list_campaigns_by_user(&self, user_id: UserId) -> StoreResult<Vec<Campaign>> {
        self.read_op(|conn| {
            let mut stmt = conn.prepare(
                "SELECT Id, Title, MemberListId, UserId, VideoTag, ImageTag
                 FROM Campaigns
                 WHERE UserId = ?1
                 ORDER BY Id ASC;",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let mut campaigns = Vec::new();
            while let Some(row) = rows.next()? {
                campaigns.push(parse_campaign_row(row)?);
            }
            Ok(campaigns)
        })
    }

    fn add_member(
        &self,
        email_id: &str,
        full_name: &str,
        campaign_id: &str,
    ) -> StoreResult<Member> {
        let member = Member::new(email_id, full_name, campaign_id);
        member.validate()?;

        self.write_op("member_add", |tx| {
            require_row(
                tx,
                "Campaigns",
                "Id",
                &member.campaign_id,
                member.campaign_id.clone(),
            )?;
            tx.execute(
                "INSERT INTO Members (EmailId, FullName, CampaignId) VALUES (?1, ?2, ?3);",
                params![member.email_id, member.full_name, member.campaign_id],
            )?;
            Ok(())
        })?;

        Ok(member)
    }

    fn update_member_name(
        &self,
        campaign_id: &str,
        email_id: &str,
        full_name: &str,
    ) -> StoreResult<bool> {
        require_non_empty("Members", "FullName", full_name)?;

        self.write_op("member_rename", |tx| {
            let changed = tx.execute(
                "UPDATE Members SET FullName = ?3 WHERE CampaignId = ?1 AND EmailId = ?2;",
                params![campaign_id, email_id, full_name],
            )?;
            Ok(changed > 0)
        })
    }

    fn remove_member(&self, campaign_id: &str, email_id: &str) -> StoreResult<()> {
        self.write_op("member_remove", |tx| {
            tx.execute(
                "DELETE FROM Members WHERE CampaignId = ?1 AND EmailId = ?2;",
                params![campaign_id, email_id],
            )?;
            Ok(())
        })
    }

    fn list_members_by_campaign(&self, campaign_id: &str) -> StoreResult<Vec<Member>> {
        self.read_op(|conn| {
            let mut stmt = conn.prepare(
                "SELECT EmailId, FullName, CampaignId
                 FROM Members
                 WHERE CampaignId = ?1
                 ORDER BY rowid ASC;",
            )?;
            let mut rows = stmt.query(params![campaign_id])?;
            let mut members = Vec::new();
            while let Some(row) = rows.next()? {
                members.push(parse_member_row(row)?);
            }
            Ok(members)
        })
    }
}

impl SqliteStore {
    fn insert_campaign(
        &self,
        op: &'static str,
        campaign: Campaign,
        check_duplicate: bool,
    ) -> StoreResult<Campaign> {
        campaign.validate()?;

        self.write_op(op, |tx| {
            if check_duplicate && row_exists(tx, "Campaigns", "Id", &campaign.id)? {
                return Err(StoreError::DuplicateKey {
                    table: "Campaigns",
                    key: campaign.id.clone(),
                });
            }
            require_row(
                tx,
                "Users",
                "Id",
                &campaign.user_id,
                campaign.user_id.to_string(),
            )?;
            tx.execute(
                "INSERT INTO Campaigns (Id, Title, MemberListId, UserId, VideoTag, ImageTag)
                 VALUES (?1, ?2, ?3, ?4, NULL, NULL);",
                params![
                    campaign.id,
                    campaign.title,
                    campaign.member_list_id,
                    campaign.user_id
                ],
            )?;
            Ok(())
        })?;

        Ok(campaign)
    }
}

fn execute_cascade(tx: &Transaction<'_>, root: &'static str, key: &dyn ToSql) -> StoreResult<usize> {
    let mut removed = 0;
    for sql in cascade_delete_plan(root, "Id = ?1") {
        removed += tx.execute(&sql, params![key])?;
    }
    Ok(removed)
}

fn row_exists(
    conn: &Connection,
    table: &'static str,
    pk_column: &'static str,
    key: &dyn ToSql,
) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {pk_column} = ?1);"),
        params![key],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn require_row(
    conn: &Connection,
    table: &'static str,
    pk_column: &'static str,
    key: &dyn ToSql,
    display_key: String,
) -> StoreResult<()> {
    if !row_exists(conn, table, pk_column, key)? {
        return Err(StoreError::MissingReference {
            table,
            key: display_key,
        });
    }
    Ok(())
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == ErrorCode::DatabaseBusy || inner.code == ErrorCode::DatabaseLocked
    )
}

fn parse_user_row(row: &Row<'_>) -> StoreResult<User> {
    let user = User {
        id: row.get("Id")?,
        username: row.get("Username")?,
        email: row.get("Email")?,
        last_synced: row.get("LastSynced")?,
    };
    user.validate()?;
    Ok(user)
}

fn parse_session_row(row: &Row<'_>) -> StoreResult<UserSession> {
    let id_text: String = row.get("Id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in UserSessions.Id"))
    })?;

    let session = UserSession {
        id,
        user_id: row.get("UserId")?,
        access_token: row.get("AccessToken")?,
        dc: row.get("Dc")?,
    };
    session.validate()?;
    Ok(session)
}

fn parse_campaign_row(row: &Row<'_>) -> StoreResult<Campaign> {
    let campaign = Campaign {
        id: row.get("Id")?,
        title: row.get("Title")?,
        member_list_id: row.get("MemberListId")?,
        user_id: row.get("UserId")?,
        video_tag: row.get("VideoTag")?,
        image_tag: row.get("ImageTag")?,
    };
    campaign.validate()?;
    Ok(campaign)
}

fn parse_member_row(row: &Row<'_>) -> StoreResult<Member> {
    let member = Member {
        email_id: row.get("EmailId")?,
        full_name: row.get("FullName")?,
        campaign_id: row.get("CampaignId")?,
    };
    member.validate()?;
    Ok(member)
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected = latest_version();
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual != expected {
        return Err(StoreError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        });
    }

    for &(table, columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
