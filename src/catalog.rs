//! Gallery Vault - Catalog
//!
//! SQLite store for books (items), series (collections), tags and global
//! settings. Everything the access checks and listings consult lives here;
//! page bytes live in the vault directory.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, types::Value, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

// ═══════════════════════════════════════════════════════════════════════════
// MODEL
// ═══════════════════════════════════════════════════════════════════════════

/// Reading progress of an item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub last_page: u32,
    pub total_pages: u32,
    pub last_read: Option<DateTime<Utc>>,
}

/// Reference to the collection an item belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub id: i64,
    pub title: String,
}

/// One imported book
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    /// Row id (0 until inserted)
    pub id: i64,
    /// Display title
    pub title: String,
    /// Directory name under the vault root; identifies the item in requests
    pub path: String,
    /// Cover image, relative to the item directory
    pub cover_path: String,
    pub description: String,
    pub locked: bool,
    pub hidden: bool,
    pub cover_masked: bool,
    pub favorite: bool,
    /// Never leaves the process
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub progress: ReadingProgress,
    pub tags: Vec<String>,
    pub collection: Option<CollectionRef>,
}

/// Listing sort keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "name_asc")]
    TitleAsc,
    #[serde(rename = "name_desc")]
    TitleDesc,
    #[serde(rename = "date_asc")]
    LastReadAsc,
    #[serde(rename = "date_desc")]
    LastReadDesc,
}

impl SortKey {
    fn order_clause(self) -> &'static str {
        match self {
            SortKey::TitleAsc => "i.title ASC, i.id ASC",
            SortKey::TitleDesc => "i.title DESC, i.id DESC",
            SortKey::LastReadAsc => "i.last_read_time ASC, i.id ASC",
            SortKey::LastReadDesc => "i.last_read_time DESC, i.id DESC",
        }
    }
}

/// Listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFilter {
    /// Case-insensitive substring of the title
    pub query: String,
    /// Item must carry every one of these tags
    pub tags: Vec<String>,
    pub only_favorite: bool,
    pub collection_id: Option<i64>,
    pub sort: SortKey,
    /// 1-based page number
    pub page: u32,
    /// 0 disables pagination
    pub page_size: u32,
    /// Set by the access layer, never by clients
    #[serde(skip)]
    pub include_hidden: bool,
}

/// Tag with the number of items carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub name: String,
    pub count: u32,
}

/// Result of a tag rename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRename {
    Renamed,
    Merged,
}

/// Collection with its item count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub count: u32,
    /// Path of the first item by title, used for the collection preview
    pub cover_item: Option<String>,
}

/// Dashboard statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_items: u32,
    pub total_collections: u32,
    pub total_tags: u32,
    pub top_tags: Vec<TagCount>,
    pub recently_read: Vec<StoredItem>,
}

// ═══════════════════════════════════════════════════════════════════════════
// CATALOG
// ═══════════════════════════════════════════════════════════════════════════

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        path TEXT NOT NULL UNIQUE COLLATE NOCASE,
        cover_path TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        collection_id INTEGER REFERENCES collections(id) ON DELETE SET NULL,
        is_locked INTEGER NOT NULL DEFAULT 0,
        password_hash TEXT NOT NULL DEFAULT '',
        is_hidden INTEGER NOT NULL DEFAULT 0,
        mask_cover INTEGER NOT NULL DEFAULT 0,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        last_page INTEGER NOT NULL DEFAULT 0,
        total_pages INTEGER NOT NULL DEFAULT 0,
        last_read_time INTEGER,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS item_tags (
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (item_id, tag_id)
    );

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_items_title ON items(title);
    CREATE INDEX IF NOT EXISTS idx_items_last_read ON items(last_read_time);
    CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection_id);
    CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tag_id);
"#;

const ITEM_SELECT: &str = "SELECT i.id, i.title, i.path, i.cover_path, i.description, \
     i.collection_id, c.title, i.is_locked, i.password_hash, i.is_hidden, i.mask_cover, \
     i.is_favorite, i.last_page, i.total_pages, i.last_read_time \
     FROM items i LEFT JOIN collections c ON c.id = i.collection_id";

/// Catalog - SQLite store for item metadata and settings
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    /// Open (or create) the catalog file
    pub fn open(path: &Path) -> VaultResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Catalog that lives only as long as the process
    pub fn open_in_memory() -> VaultResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> VaultResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SETTINGS
    // ═══════════════════════════════════════════════════════════════════════

    /// Read a global setting
    pub fn get_setting(&self, key: &str) -> VaultResult<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Create or overwrite a global setting
    pub fn set_setting(&self, key: &str, value: &str) -> VaultResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ITEMS
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a new item, failing if its path is already cataloged
    pub fn insert_item(&self, item: &StoredItem) -> VaultResult<i64> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO items (title, path, cover_path, description, collection_id, is_locked,
                                password_hash, is_hidden, mask_cover, is_favorite, last_page,
                                total_pages, last_read_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                item.title,
                item.path,
                item.cover_path,
                item.description,
                item.collection.as_ref().map(|c| c.id),
                item.locked,
                item.password_hash.as_deref().unwrap_or(""),
                item.hidden,
                item.cover_masked,
                item.favorite,
                item.progress.last_page,
                item.progress.total_pages,
                item.progress.last_read.map(|t| t.timestamp()),
                Utc::now().to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(VaultError::DuplicateItem(item.path.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        drop(conn);

        if !item.tags.is_empty() {
            self.set_tags(id, &item.tags)?;
        }
        Ok(id)
    }

    /// Insert or update an item, tags included
    pub fn save_item(&self, item: &StoredItem) -> VaultResult<i64> {
        if item.id <= 0 {
            return self.insert_item(item);
        }

        let updated = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE items SET title = ?2, path = ?3, cover_path = ?4, description = ?5,
                     collection_id = ?6, is_locked = ?7, password_hash = ?8, is_hidden = ?9,
                     mask_cover = ?10, is_favorite = ?11, last_page = ?12, total_pages = ?13,
                     last_read_time = ?14
                 WHERE id = ?1",
                params![
                    item.id,
                    item.title,
                    item.path,
                    item.cover_path,
                    item.description,
                    item.collection.as_ref().map(|c| c.id),
                    item.locked,
                    item.password_hash.as_deref().unwrap_or(""),
                    item.hidden,
                    item.cover_masked,
                    item.favorite,
                    item.progress.last_page,
                    item.progress.total_pages,
                    item.progress.last_read.map(|t| t.timestamp()),
                ],
            )?
        };

        if updated == 0 {
            return Err(VaultError::ItemNotFound(item.id.to_string()));
        }

        self.set_tags(item.id, &item.tags)?;
        Ok(item.id)
    }

    /// Get an item by row id
    pub fn get_item(&self, id: i64) -> VaultResult<StoredItem> {
        let conn = self.conn.lock();
        let sql = format!("{} WHERE i.id = ?1", ITEM_SELECT);

        let mut item = conn
            .query_row(&sql, params![id], row_to_item)
            .optional()?
            .ok_or_else(|| VaultError::ItemNotFound(id.to_string()))?;

        item.tags = load_tags(&conn, item.id)?;
        Ok(item)
    }

    /// Look an item up by its directory name (case-insensitive)
    pub fn find_by_path(&self, path: &str) -> VaultResult<Option<StoredItem>> {
        let conn = self.conn.lock();
        let sql = format!("{} WHERE i.path = ?1", ITEM_SELECT);

        let item = conn.query_row(&sql, params![path], row_to_item).optional()?;
        match item {
            Some(mut item) => {
                item.tags = load_tags(&conn, item.id)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// Remove an item and its tag links
    pub fn delete_item(&self, id: i64) -> VaultResult<()> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;

        if removed == 0 {
            return Err(VaultError::ItemNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Query items
    pub fn find(&self, filter: &ItemFilter) -> VaultResult<Vec<StoredItem>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.include_hidden {
            clauses.push("i.is_hidden = 0".into());
        }

        let query = filter.query.trim();
        if !query.is_empty() {
            clauses.push("LOWER(i.title) LIKE ?".into());
            values.push(Value::Text(format!("%{}%", query.to_lowercase())));
        }

        if filter.only_favorite {
            clauses.push("i.is_favorite = 1".into());
        }

        let tags = normalize_tags(&filter.tags);
        if !tags.is_empty() {
            let placeholders = vec!["?"; tags.len()].join(", ");
            clauses.push(format!(
                "i.id IN (SELECT it.item_id FROM item_tags it JOIN tags t ON t.id = it.tag_id
                          WHERE t.name IN ({}) GROUP BY it.item_id
                          HAVING COUNT(DISTINCT t.id) = ?)",
                placeholders
            ));
            values.extend(tags.iter().cloned().map(Value::Text));
            values.push(Value::Integer(tags.len() as i64));
        }

        if let Some(collection_id) = filter.collection_id {
            clauses.push("i.collection_id = ?".into());
            values.push(Value::Integer(collection_id));
        }

        let mut sql = ITEM_SELECT.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(filter.sort.order_clause());

        if filter.page_size > 0 {
            let offset = (filter.page.max(1) - 1) as i64 * filter.page_size as i64;
            sql.push_str(" LIMIT ? OFFSET ?");
            values.push(Value::Integer(filter.page_size as i64));
            values.push(Value::Integer(offset));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_item)?;

        let mut items = Vec::new();
        for row in rows {
            let mut item = row?;
            item.tags = load_tags(&conn, item.id)?;
            items.push(item);
        }

        Ok(items)
    }

    /// Record that a page was read now
    pub fn update_progress(&self, id: i64, last_page: u32) -> VaultResult<()> {
        self.update_one(
            "UPDATE items SET last_page = ?2, last_read_time = ?3 WHERE id = ?1",
            params![id, last_page, Utc::now().timestamp()],
            id,
        )
    }

    /// Point the cover at another page (relative to the item directory)
    pub fn set_cover(&self, id: i64, cover_path: &str) -> VaultResult<()> {
        self.update_one(
            "UPDATE items SET cover_path = ?2 WHERE id = ?1",
            params![id, cover_path],
            id,
        )
    }

    /// Update the page count
    pub fn set_total_pages(&self, id: i64, total_pages: u32) -> VaultResult<()> {
        self.update_one(
            "UPDATE items SET total_pages = ?2 WHERE id = ?1",
            params![id, total_pages],
            id,
        )
    }

    /// Set (`Some`) or clear (`None`) the per-item password
    pub fn set_lock(&self, id: i64, password_hash: Option<&str>) -> VaultResult<()> {
        self.update_one(
            "UPDATE items SET is_locked = ?2, password_hash = ?3 WHERE id = ?1",
            params![id, password_hash.is_some(), password_hash.unwrap_or("")],
            id,
        )
    }

    /// Toggle the favorite flag, returning the new value
    pub fn toggle_favorite(&self, id: i64) -> VaultResult<bool> {
        let mut item = self.get_item(id)?;
        item.favorite = !item.favorite;
        self.update_one(
            "UPDATE items SET is_favorite = ?2 WHERE id = ?1",
            params![id, item.favorite],
            id,
        )?;
        Ok(item.favorite)
    }

    fn update_one(&self, sql: &str, params: impl rusqlite::Params, id: i64) -> VaultResult<()> {
        let conn = self.conn.lock();
        if conn.execute(sql, params)? == 0 {
            return Err(VaultError::ItemNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Number of cataloged items
    pub fn count(&self) -> VaultResult<u32> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u32)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TAGS
    // ═══════════════════════════════════════════════════════════════════════

    /// Replace the tags of an item
    pub fn set_tags(&self, item_id: i64, names: &[String]) -> VaultResult<()> {
        let names = normalize_tags(names);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM item_tags WHERE item_id = ?1", params![item_id])?;

        for name in &names {
            tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
            let tag_id: i64 =
                tx.query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| row.get(0))?;
            tx.execute(
                "INSERT OR IGNORE INTO item_tags (item_id, tag_id) VALUES (?1, ?2)",
                params![item_id, tag_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Every tag with its usage count, by name
    pub fn list_tags(&self) -> VaultResult<Vec<TagCount>> {
        self.tag_counts("ORDER BY t.name ASC", None)
    }

    fn tag_counts(&self, order: &str, limit: Option<u32>) -> VaultResult<Vec<TagCount>> {
        let conn = self.conn.lock();
        let mut sql = format!(
            "SELECT t.name, COUNT(it.item_id) AS count FROM tags t
             LEFT JOIN item_tags it ON it.tag_id = t.id
             GROUP BY t.id {}",
            order
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(TagCount {
                name: row.get(0)?,
                count: row.get::<_, i64>(1)? as u32,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Rename a tag; merges into the target when it already exists
    pub fn rename_tag(&self, old_name: &str, new_name: &str) -> VaultResult<TagRename> {
        let old_name = old_name.trim().to_lowercase();
        let new_name = new_name.trim().to_lowercase();
        if old_name.is_empty() || new_name.is_empty() {
            return Err(VaultError::InvalidInput("tag names must not be empty".into()));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let old_id: i64 = tx
            .query_row("SELECT id FROM tags WHERE name = ?1", params![old_name], |row| row.get(0))
            .optional()?
            .ok_or_else(|| VaultError::TagNotFound(old_name.clone()))?;

        let target_id: Option<i64> = tx
            .query_row("SELECT id FROM tags WHERE name = ?1", params![new_name], |row| row.get(0))
            .optional()?;

        let outcome = match target_id {
            Some(target_id) if target_id == old_id => TagRename::Renamed,
            Some(target_id) => {
                tx.execute(
                    "INSERT OR IGNORE INTO item_tags (item_id, tag_id)
                     SELECT item_id, ?2 FROM item_tags WHERE tag_id = ?1",
                    params![old_id, target_id],
                )?;
                tx.execute("DELETE FROM tags WHERE id = ?1", params![old_id])?;
                TagRename::Merged
            }
            None => {
                tx.execute("UPDATE tags SET name = ?2 WHERE id = ?1", params![old_id, new_name])?;
                TagRename::Renamed
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Delete a tag everywhere
    pub fn delete_tag(&self, name: &str) -> VaultResult<()> {
        let name = name.trim().to_lowercase();
        let conn = self.conn.lock();
        if conn.execute("DELETE FROM tags WHERE name = ?1", params![name])? == 0 {
            return Err(VaultError::TagNotFound(name));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COLLECTIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a collection with a unique title
    pub fn create_collection(&self, title: &str, description: &str) -> VaultResult<i64> {
        let title = title.trim();
        if title.is_empty() {
            return Err(VaultError::InvalidInput("collection title must not be empty".into()));
        }

        let conn = self.conn.lock();
        match conn.execute(
            "INSERT INTO collections (title, description) VALUES (?1, ?2)",
            params![title, description],
        ) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(VaultError::DuplicateCollection(title.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Collections with item counts; hidden items are skipped unless asked
    pub fn list_collections(&self, include_hidden: bool) -> VaultResult<Vec<CollectionSummary>> {
        let conn = self.conn.lock();
        let hidden_clause = if include_hidden { "" } else { "AND i.is_hidden = 0" };

        let sql = format!(
            "SELECT c.id, c.title, c.description,
                    (SELECT COUNT(*) FROM items i WHERE i.collection_id = c.id {hidden}),
                    (SELECT i.path FROM items i WHERE i.collection_id = c.id {hidden}
                     ORDER BY i.title ASC LIMIT 1)
             FROM collections c ORDER BY c.title ASC",
            hidden = hidden_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(CollectionSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                count: row.get::<_, i64>(3)? as u32,
                cover_item: row.get(4)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Attach an item to a collection, or detach it with `None`
    pub fn assign_collection(&self, item_id: i64, collection_id: Option<i64>) -> VaultResult<()> {
        if let Some(collection_id) = collection_id {
            let conn = self.conn.lock();
            let exists: Option<i64> = conn
                .query_row("SELECT id FROM collections WHERE id = ?1", params![collection_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Err(VaultError::CollectionNotFound(collection_id.to_string()));
            }
        }

        self.update_one(
            "UPDATE items SET collection_id = ?2 WHERE id = ?1",
            params![item_id, collection_id],
            item_id,
        )
    }

    /// Delete a collection; its items stay, detached
    pub fn delete_collection(&self, collection_id: i64) -> VaultResult<()> {
        let conn = self.conn.lock();
        if conn.execute("DELETE FROM collections WHERE id = ?1", params![collection_id])? == 0 {
            return Err(VaultError::CollectionNotFound(collection_id.to_string()));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STATISTICS
    // ═══════════════════════════════════════════════════════════════════════

    /// Totals, the ten most used tags and the five most recently read items
    pub fn stats(&self, include_hidden: bool) -> VaultResult<CatalogStats> {
        let (total_items, total_collections, total_tags) = {
            let conn = self.conn.lock();
            let count = |table: &str| -> VaultResult<u32> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n as u32)
            };
            (count("items")?, count("collections")?, count("tags")?)
        };

        let top_tags = self.tag_counts("ORDER BY count DESC, t.name ASC", Some(10))?;
        let recently_read = self.find(&ItemFilter {
            sort: SortKey::LastReadDesc,
            page: 1,
            page_size: 5,
            include_hidden,
            ..Default::default()
        })?;

        Ok(CatalogStats {
            total_items,
            total_collections,
            total_tags,
            top_tags,
            recently_read,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredItem> {
    let collection_id: Option<i64> = row.get(5)?;
    let collection_title: Option<String> = row.get(6)?;
    let password_hash: String = row.get(8)?;
    let last_read: Option<i64> = row.get(14)?;

    Ok(StoredItem {
        id: row.get(0)?,
        title: row.get(1)?,
        path: row.get(2)?,
        cover_path: row.get(3)?,
        description: row.get(4)?,
        collection: collection_id
            .zip(collection_title)
            .map(|(id, title)| CollectionRef { id, title }),
        locked: row.get(7)?,
        password_hash: if password_hash.is_empty() { None } else { Some(password_hash) },
        hidden: row.get(9)?,
        cover_masked: row.get(10)?,
        favorite: row.get(11)?,
        progress: ReadingProgress {
            last_page: row.get::<_, i64>(12)?.max(0) as u32,
            total_pages: row.get::<_, i64>(13)?.max(0) as u32,
            last_read: last_read.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        },
        tags: Vec::new(),
    })
}

fn load_tags(conn: &Connection, item_id: i64) -> VaultResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM tags t JOIN item_tags it ON it.tag_id = t.id
         WHERE it.item_id = ?1 ORDER BY t.name ASC",
    )?;
    let rows = stmt.query_map(params![item_id], |row| row.get(0))?;
    rows.collect::<Result<Vec<String>, _>>().map_err(Into::into)
}

/// Trim, lowercase, drop empties and duplicates
pub fn normalize_tags(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let clean = name.trim().to_lowercase();
        if !clean.is_empty() && !out.contains(&clean) {
            out.push(clean);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> StoredItem {
        StoredItem {
            title: title.into(),
            path: title.into(),
            cover_path: "001.jpg".into(),
            ..Default::default()
        }
    }

    fn titles(items: &[StoredItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_insert_and_lookup() {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.insert_item(&item("Naruto")).unwrap();

        let found = catalog.find_by_path("naruto").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.cover_path, "001.jpg");
        assert!(catalog.find_by_path("Bleach").unwrap().is_none());
    }

    #[test]
    fn test_unique_path() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_item(&item("Naruto")).unwrap();

        assert!(matches!(
            catalog.insert_item(&item("Naruto")),
            Err(VaultError::DuplicateItem(_))
        ));
    }

    #[test]
    fn test_save_item_updates_fields_and_tags() {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.insert_item(&item("Naruto")).unwrap();

        let mut stored = catalog.get_item(id).unwrap();
        stored.description = "ninja".into();
        stored.favorite = true;
        stored.tags = vec!["Action".into(), " action ".into(), "".into(), "Shonen".into()];
        catalog.save_item(&stored).unwrap();

        let reloaded = catalog.get_item(id).unwrap();
        assert_eq!(reloaded.description, "ninja");
        assert!(reloaded.favorite);
        assert_eq!(reloaded.tags, vec!["action", "shonen"]);
    }

    #[test]
    fn test_settings() {
        let catalog = Catalog::open_in_memory().unwrap();
        assert_eq!(catalog.get_setting("master_hash").unwrap(), None);

        catalog.set_setting("master_hash", "a").unwrap();
        catalog.set_setting("master_hash", "b").unwrap();
        assert_eq!(catalog.get_setting("master_hash").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_find_hides_hidden_items() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.insert_item(&item("Visible")).unwrap();
        catalog
            .insert_item(&StoredItem {
                hidden: true,
                ..item("Secret")
            })
            .unwrap();

        let public = catalog.find(&ItemFilter::default()).unwrap();
        assert_eq!(titles(&public), vec!["Visible"]);

        let all = catalog
            .find(&ItemFilter {
                include_hidden: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&all), vec!["Secret", "Visible"]);
    }

    #[test]
    fn test_find_filters() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.insert_item(&item("Alpha Story")).unwrap();
        let b = catalog.insert_item(&item("Beta Story")).unwrap();
        catalog.insert_item(&item("Gamma")).unwrap();

        catalog.set_tags(a, &["action".into(), "drama".into()]).unwrap();
        catalog.set_tags(b, &["action".into()]).unwrap();
        catalog.toggle_favorite(b).unwrap();

        let by_query = catalog
            .find(&ItemFilter {
                query: "STORY".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&by_query), vec!["Alpha Story", "Beta Story"]);

        let all_tags = catalog
            .find(&ItemFilter {
                tags: vec!["Action".into(), "drama".into()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&all_tags), vec!["Alpha Story"]);

        let favorites = catalog
            .find(&ItemFilter {
                only_favorite: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&favorites), vec!["Beta Story"]);

        let desc = catalog
            .find(&ItemFilter {
                sort: SortKey::TitleDesc,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&desc), vec!["Gamma", "Beta Story", "Alpha Story"]);
    }

    #[test]
    fn test_pagination() {
        let catalog = Catalog::open_in_memory().unwrap();
        for title in ["A", "B", "C", "D", "E"] {
            catalog.insert_item(&item(title)).unwrap();
        }

        let page = |page| {
            catalog
                .find(&ItemFilter {
                    page,
                    page_size: 2,
                    ..Default::default()
                })
                .unwrap()
        };
        assert_eq!(titles(&page(1)), vec!["A", "B"]);
        assert_eq!(titles(&page(3)), vec!["E"]);
        assert!(page(4).is_empty());
        assert_eq!(titles(&page(0)), vec!["A", "B"]);
    }

    #[test]
    fn test_sort_by_last_read() {
        let catalog = Catalog::open_in_memory().unwrap();
        let old = catalog.insert_item(&item("Old")).unwrap();
        let new = catalog.insert_item(&item("New")).unwrap();

        let mut stored = catalog.get_item(old).unwrap();
        stored.progress.last_read = DateTime::<Utc>::from_timestamp(1_000, 0);
        catalog.save_item(&stored).unwrap();

        let mut stored = catalog.get_item(new).unwrap();
        stored.progress.last_read = DateTime::<Utc>::from_timestamp(2_000, 0);
        catalog.save_item(&stored).unwrap();

        let recent = catalog
            .find(&ItemFilter {
                sort: SortKey::LastReadDesc,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(titles(&recent), vec!["New", "Old"]);
    }

    #[test]
    fn test_progress() {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.insert_item(&item("Book")).unwrap();

        catalog.update_progress(id, 12).unwrap();
        let stored = catalog.get_item(id).unwrap();
        assert_eq!(stored.progress.last_page, 12);
        assert!(stored.progress.last_read.is_some());

        assert!(matches!(
            catalog.update_progress(999, 1),
            Err(VaultError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_lock_fields() {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.insert_item(&item("Book")).unwrap();

        catalog.set_lock(id, Some("hash")).unwrap();
        let stored = catalog.get_item(id).unwrap();
        assert!(stored.locked);
        assert_eq!(stored.password_hash.as_deref(), Some("hash"));

        catalog.set_lock(id, None).unwrap();
        let stored = catalog.get_item(id).unwrap();
        assert!(!stored.locked);
        assert_eq!(stored.password_hash, None);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let stored = StoredItem {
            password_hash: Some("secret-hash".into()),
            ..item("Book")
        };
        let json = serde_json::to_string(&stored).unwrap();
        assert!(!json.contains("secret-hash"));
    }

    #[test]
    fn test_tags_rename_merge_delete() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.insert_item(&item("A")).unwrap();
        let b = catalog.insert_item(&item("B")).unwrap();
        catalog.set_tags(a, &["actionn".into()]).unwrap();
        catalog.set_tags(b, &["action".into(), "actionn".into()]).unwrap();

        assert_eq!(
            catalog.list_tags().unwrap(),
            vec![
                TagCount { name: "action".into(), count: 1 },
                TagCount { name: "actionn".into(), count: 2 },
            ]
        );

        assert_eq!(catalog.rename_tag("Actionn", "Action").unwrap(), TagRename::Merged);
        assert_eq!(
            catalog.list_tags().unwrap(),
            vec![TagCount { name: "action".into(), count: 2 }]
        );

        assert_eq!(catalog.rename_tag("action", "adventure").unwrap(), TagRename::Renamed);
        assert_eq!(catalog.get_item(a).unwrap().tags, vec!["adventure"]);

        catalog.delete_tag("adventure").unwrap();
        assert!(catalog.get_item(a).unwrap().tags.is_empty());
        assert!(matches!(catalog.delete_tag("adventure"), Err(VaultError::TagNotFound(_))));
    }

    #[test]
    fn test_collections_detach_on_delete() {
        let catalog = Catalog::open_in_memory().unwrap();
        let series = catalog.create_collection("Naruto", "ninja").unwrap();
        let vol1 = catalog.insert_item(&item("Naruto 01")).unwrap();
        let vol2 = catalog.insert_item(&item("Naruto 02")).unwrap();

        catalog.assign_collection(vol1, Some(series)).unwrap();
        catalog.assign_collection(vol2, Some(series)).unwrap();

        assert!(matches!(
            catalog.create_collection("Naruto", ""),
            Err(VaultError::DuplicateCollection(_))
        ));

        let summaries = catalog.list_collections(false).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].cover_item.as_deref(), Some("Naruto 01"));

        let in_series = catalog
            .find(&ItemFilter {
                collection_id: Some(series),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(in_series.len(), 2);
        assert_eq!(in_series[0].collection.as_ref().unwrap().title, "Naruto");

        catalog.delete_collection(series).unwrap();
        assert_eq!(catalog.count().unwrap(), 2);
        assert_eq!(catalog.get_item(vol1).unwrap().collection, None);

        assert!(matches!(
            catalog.assign_collection(vol1, Some(series)),
            Err(VaultError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_delete_item_removes_tag_links() {
        let catalog = Catalog::open_in_memory().unwrap();
        let id = catalog.insert_item(&item("Book")).unwrap();
        catalog.set_tags(id, &["drama".into()]).unwrap();

        catalog.delete_item(id).unwrap();
        assert_eq!(
            catalog.list_tags().unwrap(),
            vec![TagCount { name: "drama".into(), count: 0 }]
        );
        assert!(matches!(catalog.delete_item(id), Err(VaultError::ItemNotFound(_))));
    }

    #[test]
    fn test_stats() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.insert_item(&item("A")).unwrap();
        catalog.insert_item(&item("B")).unwrap();
        catalog.create_collection("S", "").unwrap();
        catalog.set_tags(a, &["x".into(), "y".into()]).unwrap();
        catalog.update_progress(a, 3).unwrap();

        let stats = catalog.stats(false).unwrap();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.total_collections, 1);
        assert_eq!(stats.total_tags, 2);
        assert_eq!(stats.top_tags.len(), 2);
        assert_eq!(stats.recently_read[0].title, "A");
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/library.db");

        {
            let catalog = Catalog::open(&db_path).unwrap();
            catalog.insert_item(&item("Persisted")).unwrap();
        }

        let catalog = Catalog::open(&db_path).unwrap();
        assert!(catalog.find_by_path("Persisted").unwrap().is_some());
    }
}
