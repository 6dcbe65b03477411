//! Repository for the profile/session cache and the pending operation log.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use aasanify_core::practice::{PracticeStoreTrait, SessionRecord, UserProfile};
use aasanify_core::sync::{PendingKind, PendingOperation, PROFILE_KEY};
use aasanify_core::StoreError;

use crate::db;

const LAST_SYNC_META: &str = "last_sync_at";

fn kind_to_db(kind: PendingKind) -> &'static str {
    match kind {
        PendingKind::Profile => "profile",
        PendingKind::Session => "session",
    }
}

fn kind_from_db(value: &str) -> Option<PendingKind> {
    match value {
        "profile" => Some(PendingKind::Profile),
        "session" => Some(PendingKind::Session),
        _ => None,
    }
}

/// Durable local cache plus pending operation log on one SQLite database.
///
/// A single connection behind a mutex serializes writers; every mutation is
/// a whole-record replace committed in a transaction, which is the
/// atomic-per-key primitive shared by the UI write path and the sync pull
/// phase. Reads never depend on connectivity.
pub struct SqlitePracticeStore {
    conn: Mutex<Connection>,
}

impl SqlitePracticeStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = db::open(path.as_ref()).map_err(StoreError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = db::open_in_memory().map_err(StoreError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("practice store lock poisoned")
    }
}

fn read_profile(conn: &Connection) -> Result<Option<UserProfile>, StoreError> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM profile WHERE id = 1", [], |row| row.get(0))
        .optional()
        .map_err(StoreError::backend)?;
    match body {
        Some(body) => Ok(Some(
            serde_json::from_str(&body).map_err(|e| StoreError::corrupt(PROFILE_KEY, e))?,
        )),
        None => Ok(None),
    }
}

fn write_profile(conn: &Connection, profile: &UserProfile) -> Result<(), StoreError> {
    let body = serde_json::to_string(profile).map_err(StoreError::backend)?;
    conn.execute(
        "INSERT INTO profile (id, body) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET body = excluded.body",
        params![body],
    )
    .map_err(StoreError::backend)?;
    Ok(())
}

fn read_session(conn: &Connection, date: NaiveDate) -> Result<Option<SessionRecord>, StoreError> {
    let key = date.to_string();
    let body: Option<String> = conn
        .query_row("SELECT body FROM sessions WHERE date = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(StoreError::backend)?;
    match body {
        Some(body) => Ok(Some(
            serde_json::from_str(&body).map_err(|e| StoreError::corrupt(key, e))?,
        )),
        None => Ok(None),
    }
}

fn write_session(
    conn: &Connection,
    date: NaiveDate,
    record: &SessionRecord,
) -> Result<(), StoreError> {
    let body = serde_json::to_string(record).map_err(StoreError::backend)?;
    conn.execute(
        "INSERT INTO sessions (date, body) VALUES (?1, ?2)
         ON CONFLICT(date) DO UPDATE SET body = excluded.body",
        params![date.to_string(), body],
    )
    .map_err(StoreError::backend)?;
    Ok(())
}

/// Upsert a pending entry. A conflicting `(kind, key)` keeps its rowid (and
/// thus its queue slot) and first-enqueue timestamp; only the revision moves.
fn enqueue_op(conn: &Connection, kind: PendingKind, key: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO pending_ops (kind, key, enqueued_at, revision) VALUES (?1, ?2, ?3, 1)
         ON CONFLICT(kind, key) DO UPDATE SET revision = revision + 1",
        params![kind_to_db(kind), key, Utc::now().to_rfc3339()],
    )
    .map_err(StoreError::backend)?;
    Ok(())
}

impl PracticeStoreTrait for SqlitePracticeStore {
    fn get_profile(&self) -> Result<Option<UserProfile>, StoreError> {
        read_profile(&self.lock())
    }

    fn put_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        write_profile(&self.lock(), profile)
    }

    fn get_session(&self, date: NaiveDate) -> Result<Option<SessionRecord>, StoreError> {
        read_session(&self.lock(), date)
    }

    fn put_session(&self, date: NaiveDate, record: &SessionRecord) -> Result<(), StoreError> {
        write_session(&self.lock(), date, record)
    }

    fn all_sessions(&self) -> Result<BTreeMap<NaiveDate, SessionRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT date, body FROM sessions ORDER BY date")
            .map_err(StoreError::backend)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(StoreError::backend)?;

        let mut sessions = BTreeMap::new();
        for row in rows {
            let (key, body) = row.map_err(StoreError::backend)?;
            let date: NaiveDate = key
                .parse()
                .map_err(|e| StoreError::corrupt(key.clone(), e))?;
            let record =
                serde_json::from_str(&body).map_err(|e| StoreError::corrupt(key.clone(), e))?;
            sessions.insert(date, record);
        }
        Ok(sessions)
    }

    fn record_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::backend)?;
        write_profile(&tx, profile)?;
        enqueue_op(&tx, PendingKind::Profile, PROFILE_KEY)?;
        tx.commit().map_err(StoreError::backend)
    }

    fn record_session(&self, date: NaiveDate, record: &SessionRecord) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::backend)?;
        write_session(&tx, date, record)?;
        enqueue_op(&tx, PendingKind::Session, &date.to_string())?;
        tx.commit().map_err(StoreError::backend)
    }

    fn enqueue(&self, kind: PendingKind, key: &str) -> Result<(), StoreError> {
        enqueue_op(&self.lock(), kind, key)
    }

    fn pending(&self) -> Result<Vec<PendingOperation>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT kind, key, enqueued_at, revision FROM pending_ops ORDER BY rowid",
            )
            .map_err(StoreError::backend)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(StoreError::backend)?;

        let mut pending = Vec::new();
        for row in rows {
            let (kind, key, enqueued_at, revision) = row.map_err(StoreError::backend)?;
            let kind = kind_from_db(&kind).ok_or_else(|| {
                StoreError::corrupt(key.clone(), format!("unknown pending kind {kind:?}"))
            })?;
            let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_at)
                .map_err(|e| StoreError::corrupt(key.clone(), e))?
                .with_timezone(&Utc);
            pending.push(PendingOperation {
                kind,
                key,
                enqueued_at,
                revision,
            });
        }
        Ok(pending)
    }

    fn acknowledge(&self, op: &PendingOperation) -> Result<bool, StoreError> {
        let affected = self
            .lock()
            .execute(
                "DELETE FROM pending_ops WHERE kind = ?1 AND key = ?2 AND revision = ?3",
                params![kind_to_db(op.kind), op.key, op.revision],
            )
            .map_err(StoreError::backend)?;
        Ok(affected > 0)
    }

    fn remove_pending(&self, kind: PendingKind, key: &str) -> Result<(), StoreError> {
        self.lock()
            .execute(
                "DELETE FROM pending_ops WHERE kind = ?1 AND key = ?2",
                params![kind_to_db(kind), key],
            )
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn last_sync(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let value: Option<String> = self
            .lock()
            .query_row(
                "SELECT value FROM meta WHERE name = ?1",
                params![LAST_SYNC_META],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::backend)?;
        match value {
            Some(value) => Ok(Some(
                DateTime::parse_from_rfc3339(&value)
                    .map_err(|e| StoreError::corrupt(LAST_SYNC_META, e))?
                    .with_timezone(&Utc),
            )),
            None => Ok(None),
        }
    }

    fn set_last_sync(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.lock()
            .execute(
                "INSERT INTO meta (name, value) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value",
                params![LAST_SYNC_META, at.to_rfc3339()],
            )
            .map_err(StoreError::backend)?;
        Ok(())
    }
}
