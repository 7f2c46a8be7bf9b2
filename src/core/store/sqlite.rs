//! SQLite store backend for persistent indexes.

use super::{
    Item, ItemId, ItemStatus, NewItem, Root, RootId, RootScanState, Store, ThumbStatus,
};
use crate::core::metadata::MetadataRecord;
use crate::error::StoreError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ITEM_COLUMNS: &str = "id, root_id, relative_path, filename, size, mtime, status, \
                            taken_at, thumb_status, content_hash";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS roots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1
    );
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        root_id INTEGER NOT NULL REFERENCES roots(id),
        relative_path TEXT NOT NULL,
        filename TEXT NOT NULL,
        size INTEGER NOT NULL,
        mtime INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        taken_at TEXT,
        thumb_status TEXT NOT NULL DEFAULT 'none',
        content_hash TEXT,
        UNIQUE (root_id, relative_path)
    );
    CREATE INDEX IF NOT EXISTS idx_items_root ON items(root_id);
    CREATE TABLE IF NOT EXISTS metadata (
        item_id INTEGER PRIMARY KEY REFERENCES items(id),
        camera_make TEXT,
        camera_model TEXT,
        lens TEXT,
        iso INTEGER,
        f_number REAL,
        exposure_time TEXT,
        focal_length REAL,
        gps_latitude REAL,
        gps_longitude REAL,
        taken_at TEXT,
        orientation INTEGER,
        width INTEGER,
        height INTEGER
    );
    CREATE TABLE IF NOT EXISTS root_scan_state (
        root_id INTEGER PRIMARY KEY REFERENCES roots(id),
        consecutive_unavailable INTEGER NOT NULL,
        last_scan_at INTEGER
    );
";

/// SQLite-backed persistent store
///
/// One connection behind a mutex; WAL mode so readers in other processes
/// are not blocked by indexing writes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create a store database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, path.to_path_buf())
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn to_timestamp(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs() as i64
    }

    fn from_timestamp(timestamp: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(timestamp.max(0) as u64)
    }

    fn format_datetime(value: Option<NaiveDateTime>) -> Option<String> {
        value.map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
    }

    fn parse_datetime(value: Option<String>) -> Option<NaiveDateTime> {
        value.and_then(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).ok())
    }

    fn row_to_root(row: &Row<'_>) -> rusqlite::Result<Root> {
        Ok(Root {
            id: RootId(row.get(0)?),
            path: PathBuf::from(row.get::<_, String>(1)?),
            name: row.get(2)?,
            enabled: row.get::<_, i64>(3)? != 0,
        })
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            id: ItemId(row.get(0)?),
            root_id: RootId(row.get(1)?),
            relative_path: row.get(2)?,
            filename: row.get(3)?,
            size: row.get::<_, i64>(4)?.max(0) as u64,
            mtime: row.get(5)?,
            status: ItemStatus::parse(&row.get::<_, String>(6)?),
            taken_at: Self::parse_datetime(row.get(7)?),
            thumb_status: ThumbStatus::parse(&row.get::<_, String>(8)?),
            content_hash: row.get(9)?,
        })
    }

    fn query_items(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Item>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let items = stmt
            .query_map(params, Self::row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn write_metadata(
        conn: &Connection,
        id: ItemId,
        record: &MetadataRecord,
    ) -> Result<(), StoreError> {
        conn.execute(
            "INSERT OR REPLACE INTO metadata
             (item_id, camera_make, camera_model, lens, iso, f_number, exposure_time,
              focal_length, gps_latitude, gps_longitude, taken_at, orientation, width, height)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id.0,
                record.camera_make,
                record.camera_model,
                record.lens,
                record.iso.map(i64::from),
                record.f_number,
                record.exposure_time,
                record.focal_length,
                record.gps_latitude,
                record.gps_longitude,
                Self::format_datetime(record.taken_at),
                record.orientation.map(i64::from),
                record.width.map(i64::from),
                record.height.map(i64::from),
            ],
        )?;
        Ok(())
    }

    fn ensure_changed(id: ItemId, rows: usize) -> Result<(), StoreError> {
        if rows == 0 {
            Err(StoreError::ItemNotFound { id: id.0 })
        } else {
            Ok(())
        }
    }
}

impl Store for SqliteStore {
    fn add_root(&self, path: &Path, name: &str, enabled: bool) -> Result<Root, StoreError> {
        let conn = self.lock()?;
        let path_str = path.to_string_lossy();

        conn.execute(
            "INSERT OR IGNORE INTO roots (path, name, enabled) VALUES (?, ?, ?)",
            params![path_str, name, enabled as i64],
        )?;

        let root = conn.query_row(
            "SELECT id, path, name, enabled FROM roots WHERE path = ?",
            [&path_str],
            Self::row_to_root,
        )?;
        Ok(root)
    }

    fn set_root_enabled(&self, id: RootId, enabled: bool) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE roots SET enabled = ? WHERE id = ?",
            params![enabled as i64, id.0],
        )?;
        Ok(())
    }

    fn roots(&self) -> Result<Vec<Root>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, path, name, enabled FROM roots ORDER BY id")?;
        let roots = stmt
            .query_map([], Self::row_to_root)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(roots)
    }

    fn root(&self, id: RootId) -> Result<Option<Root>, StoreError> {
        let conn = self.lock()?;
        let root = conn
            .query_row(
                "SELECT id, path, name, enabled FROM roots WHERE id = ?",
                [id.0],
                Self::row_to_root,
            )
            .optional()?;
        Ok(root)
    }

    fn items_for_root(&self, root_id: RootId) -> Result<Vec<Item>, StoreError> {
        let conn = self.lock()?;
        Self::query_items(
            &conn,
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE root_id = ? ORDER BY id"),
            [root_id.0],
        )
    }

    fn find_item(
        &self,
        root_id: RootId,
        relative_path: &str,
    ) -> Result<Option<Item>, StoreError> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM items WHERE root_id = ? AND relative_path = ?"
                ),
                params![root_id.0, relative_path],
                Self::row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"),
                [id.0],
                Self::row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    fn insert_item(&self, item: NewItem) -> Result<ItemId, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO items (root_id, relative_path, filename, size, mtime, status, thumb_status)
             VALUES (?, ?, ?, ?, ?, 'active', 'none')",
            params![
                item.root_id.0,
                item.relative_path,
                item.filename,
                item.size as i64,
                item.mtime,
            ],
        )?;
        Ok(ItemId(conn.last_insert_rowid()))
    }

    fn update_file_stamp(&self, id: ItemId, size: u64, mtime: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE items SET size = ?, mtime = ?, content_hash = NULL WHERE id = ?",
            params![size as i64, mtime, id.0],
        )?;
        Self::ensure_changed(id, rows)
    }

    fn set_status(&self, id: ItemId, status: ItemStatus) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE items SET status = ? WHERE id = ?",
            params![status.as_str(), id.0],
        )?;
        Self::ensure_changed(id, rows)
    }

    fn set_thumb_status(&self, id: ItemId, status: ThumbStatus) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE items SET thumb_status = ? WHERE id = ?",
            params![status.as_str(), id.0],
        )?;
        Self::ensure_changed(id, rows)
    }

    fn set_content_hash(&self, id: ItemId, hash: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE items SET content_hash = ? WHERE id = ?",
            params![hash, id.0],
        )?;
        Self::ensure_changed(id, rows)
    }

    fn metadata(&self, id: ItemId) -> Result<Option<MetadataRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT camera_make, camera_model, lens, iso, f_number, exposure_time,
                        focal_length, gps_latitude, gps_longitude, taken_at, orientation,
                        width, height
                 FROM metadata WHERE item_id = ?",
                [id.0],
                |row| {
                    Ok(MetadataRecord {
                        camera_make: row.get(0)?,
                        camera_model: row.get(1)?,
                        lens: row.get(2)?,
                        iso: row.get::<_, Option<i64>>(3)?.map(|v| v as u32),
                        f_number: row.get(4)?,
                        exposure_time: row.get(5)?,
                        focal_length: row.get(6)?,
                        gps_latitude: row.get(7)?,
                        gps_longitude: row.get(8)?,
                        taken_at: Self::parse_datetime(row.get(9)?),
                        orientation: row.get::<_, Option<i64>>(10)?.map(|v| v as u16),
                        width: row.get::<_, Option<i64>>(11)?.map(|v| v as u32),
                        height: row.get::<_, Option<i64>>(12)?.map(|v| v as u32),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn upsert_metadata(&self, id: ItemId, record: &MetadataRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::write_metadata(&conn, id, record)
    }

    fn commit_indexed(
        &self,
        id: ItemId,
        record: &MetadataRecord,
        taken_at: Option<NaiveDateTime>,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE items SET taken_at = ?, thumb_status = 'ready' WHERE id = ?",
            params![Self::format_datetime(taken_at), id.0],
        )?;
        Self::ensure_changed(id, rows)?;
        Self::write_metadata(&tx, id, record)?;

        tx.commit()?;
        Ok(())
    }

    fn items_needing_index(&self) -> Result<Vec<Item>, StoreError> {
        let conn = self.lock()?;
        Self::query_items(
            &conn,
            &format!(
                "SELECT {ITEM_COLUMNS} FROM items
                 WHERE status = 'active' AND (thumb_status != 'ready' OR taken_at IS NULL)
                   AND root_id IN (SELECT id FROM roots WHERE enabled = 1)
                 ORDER BY id"
            ),
            params![],
        )
    }

    fn scan_state(&self, root_id: RootId) -> Result<Option<RootScanState>, StoreError> {
        let conn = self.lock()?;
        let state = conn
            .query_row(
                "SELECT consecutive_unavailable, last_scan_at FROM root_scan_state
                 WHERE root_id = ?",
                [root_id.0],
                |row| {
                    Ok(RootScanState {
                        root_id,
                        consecutive_unavailable: row.get::<_, i64>(0)?.max(0) as u32,
                        last_scan_at: row.get::<_, Option<i64>>(1)?.map(Self::from_timestamp),
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    fn set_scan_state(&self, state: &RootScanState) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO root_scan_state (root_id, consecutive_unavailable, last_scan_at)
             VALUES (?, ?, ?)",
            params![
                state.root_id.0,
                i64::from(state.consecutive_unavailable),
                state.last_scan_at.map(Self::to_timestamp),
            ],
        )?;
        Ok(())
    }
}
