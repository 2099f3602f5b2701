//! SQLite tag store implementation

use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqlitePool, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use taggable_domain::{
    Clock, Localized, ScopePredicate, StoreError, StoreTx, SubjectRef, SystemClock, Tag,
    TagDraft, TagId, TagPatch, TagStore, TaggingConfig,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// How long a unit of work waits for another process holding the write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

type TagRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    i64,
    String,
    String,
    Option<String>,
);

/// Validated physical table names
#[derive(Debug, Clone)]
struct Tables {
    tags: String,
    taggables: String,
}

impl Tables {
    fn from_config(config: &TaggingConfig) -> Result<Self, StoreError> {
        Ok(Self {
            tags: checked_identifier(&config.tags_table)?,
            taggables: checked_identifier(&config.taggables_table)?,
        })
    }

    fn tag_columns(&self) -> &'static str {
        r#"t.id, t.slug, t.name, t.description, t."group", t.sort_order, t.created_at, t.updated_at, t.deleted_at"#
    }

    /// Live association rows of one subject, with the candidate id bound to `c.value`
    fn live_links(&self) -> String {
        format!(
            "FROM {} a JOIN {} t ON t.id = a.tag_id \
             WHERE a.subject_type = ? AND a.subject_id = c.value AND t.deleted_at IS NULL",
            self.taggables, self.tags
        )
    }
}

fn checked_identifier(name: &str) -> Result<String, StoreError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(StoreError::Config(format!("Invalid table name: {:?}", name)))
    }
}

fn map_db_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::UniqueViolation(db.message().to_string())
        }
        _ => StoreError::Database(e.to_string()),
    }
}

fn format_time(at: OffsetDateTime) -> Result<String, StoreError> {
    at.format(&Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_time(raw: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_localized(raw: &str) -> Result<Localized, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn tag_from_row(row: TagRow) -> Result<Tag, StoreError> {
    let (id, slug, name, description, group, sort_order, created_at, updated_at, deleted_at) = row;
    Ok(Tag {
        id: TagId(id),
        slug,
        name: parse_localized(&name)?,
        description: description.as_deref().map(parse_localized).transpose()?,
        group,
        sort_order,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
        deleted_at: deleted_at.as_deref().map(parse_time).transpose()?,
    })
}

/// JSON path for one locale key of a localized column
fn locale_path(locale: &str) -> String {
    format!("$.\"{}\"", locale.replace('"', ""))
}

/// SQLite-backed tag store
pub struct SqliteTagStore {
    pool: SqlitePool,
    tables: Arc<Tables>,
    clock: Arc<dyn Clock>,
}

impl SqliteTagStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub async fn new(db_path: impl AsRef<Path>, config: &TaggingConfig) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        Self::connect(&db_url, config).await
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory(config: &TaggingConfig) -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:", config).await
    }

    /// Use a different clock for timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn connect(db_url: &str, config: &TaggingConfig) -> Result<Self, StoreError> {
        let tables = Tables::from_config(config)?;

        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(map_db_err)?
            .busy_timeout(BUSY_TIMEOUT);

        // A single connection serializes units of work; SQLite allows one writer anyway
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(map_db_err)?;

        let store = Self {
            pool,
            tables: Arc::new(tables),
            clock: Arc::new(SystemClock),
        };
        store.run_migrations().await?;

        tracing::debug!(url = %db_url, "Opened tag store");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let Tables { tags, taggables } = self.tables.as_ref();

        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {tags} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    slug TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT,
                    "group" TEXT,
                    sort_order INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    deleted_at TEXT
                )
                "#
            ),
            format!(
                r#"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_{tags}_live_slug
                ON {tags}(slug) WHERE deleted_at IS NULL
                "#
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {taggables} (
                    tag_id INTEGER NOT NULL REFERENCES {tags}(id) ON DELETE CASCADE,
                    subject_type TEXT NOT NULL,
                    subject_id TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(tag_id, subject_id, subject_type)
                )
                "#
            ),
            format!(
                r#"
                CREATE INDEX IF NOT EXISTS idx_{taggables}_subject
                ON {taggables}(subject_type, subject_id)
                "#
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_db_err)?;
        }

        Ok(())
    }
}

#[async_trait]
impl TagStore for SqliteTagStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        // Take the write lock up front so a second process waits instead of
        // failing to upgrade a read lock mid-unit
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(map_db_err)?;
        Ok(Box::new(SqliteTx {
            tx,
            tables: Arc::clone(&self.tables),
            clock: Arc::clone(&self.clock),
        }))
    }
}

struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
    tables: Arc<Tables>,
    clock: Arc<dyn Clock>,
}

impl SqliteTx {
    async fn fetch_tag(&mut self, id: TagId, live_only: bool) -> Result<Option<Tag>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} t WHERE t.id = ?{}",
            self.tables.tag_columns(),
            self.tables.tags,
            if live_only { " AND t.deleted_at IS NULL" } else { "" }
        );
        let row: Option<TagRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        row.map(tag_from_row).transpose()
    }

    async fn fetch_tags(&mut self, sql: &str, binds: &[Option<String>]) -> Result<Vec<Tag>, StoreError> {
        let mut query = sqlx::query_as::<_, TagRow>(sql);
        for bind in binds {
            query = query.bind(bind.clone());
        }
        let rows = query.fetch_all(&mut *self.tx).await.map_err(map_db_err)?;
        rows.into_iter().map(tag_from_row).collect()
    }
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn find_by_slug(&mut self, slug: &str) -> Result<Option<Tag>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} t WHERE t.slug = ? AND t.deleted_at IS NULL",
            self.tables.tag_columns(),
            self.tables.tags
        );
        let mut tags = self.fetch_tags(&sql, &[Some(slug.to_string())]).await?;
        Ok(tags.pop())
    }

    async fn find_by_name(
        &mut self,
        locale: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<Option<Tag>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM {} t
            WHERE t.deleted_at IS NULL
              AND json_extract(t.name, ?) = ?
              AND (? IS NULL OR t."group" = ?)
            ORDER BY t.sort_order, t.id
            LIMIT 1
            "#,
            self.tables.tag_columns(),
            self.tables.tags
        );
        let group = group.map(str::to_string);
        let mut tags = self
            .fetch_tags(
                &sql,
                &[
                    Some(locale_path(locale)),
                    Some(name.to_string()),
                    group.clone(),
                    group,
                ],
            )
            .await?;
        Ok(tags.pop())
    }

    async fn find_by_ids(&mut self, ids: &[TagId]) -> Result<Vec<Tag>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {} t WHERE t.deleted_at IS NULL \
             AND t.id IN (SELECT value FROM json_each(?))",
            self.tables.tag_columns(),
            self.tables.tags
        );
        self.fetch_tags(&sql, &[Some(to_json(ids)?)]).await
    }

    async fn get_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError> {
        self.fetch_tag(id, false).await
    }

    async fn list_tags(&mut self, group: Option<&str>) -> Result<Vec<Tag>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM {} t
            WHERE t.deleted_at IS NULL AND (? IS NULL OR t."group" = ?)
            ORDER BY t.sort_order, t.id
            "#,
            self.tables.tag_columns(),
            self.tables.tags
        );
        let group = group.map(str::to_string);
        self.fetch_tags(&sql, &[group.clone(), group]).await
    }

    async fn insert_tag(&mut self, draft: &TagDraft) -> Result<Tag, StoreError> {
        let now = self.clock.now();
        let stamp = format_time(now)?;
        let description = draft.description.as_ref().map(to_json).transpose()?;

        let sql = format!(
            r#"
            INSERT INTO {tags} (slug, name, description, "group", sort_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, COALESCE(?, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM {tags})), ?, ?)
            RETURNING id, sort_order
            "#,
            tags = self.tables.tags
        );
        let (id, sort_order): (i64, i64) = sqlx::query_as(&sql)
            .bind(&draft.slug)
            .bind(to_json(&draft.name)?)
            .bind(description)
            .bind(&draft.group)
            .bind(draft.sort_order)
            .bind(&stamp)
            .bind(&stamp)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        Ok(Tag {
            id: TagId(id),
            slug: draft.slug.clone(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            group: draft.group.clone(),
            sort_order,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    async fn update_tag(
        &mut self,
        id: TagId,
        patch: &TagPatch,
    ) -> Result<Option<Tag>, StoreError> {
        let Some(mut tag) = self.fetch_tag(id, true).await? else {
            return Ok(None);
        };
        patch.apply_to(&mut tag);
        tag.updated_at = self.clock.now();

        let sql = format!(
            r#"
            UPDATE {} SET name = ?, description = ?, "group" = ?, sort_order = ?, updated_at = ?
            WHERE id = ?
            "#,
            self.tables.tags
        );
        sqlx::query(&sql)
            .bind(to_json(&tag.name)?)
            .bind(tag.description.as_ref().map(to_json).transpose()?)
            .bind(&tag.group)
            .bind(tag.sort_order)
            .bind(format_time(tag.updated_at)?)
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        Ok(Some(tag))
    }

    async fn soft_delete_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError> {
        let Some(mut tag) = self.fetch_tag(id, true).await? else {
            return Ok(None);
        };
        let now = self.clock.now();
        let stamp = format_time(now)?;

        let sql = format!(
            "UPDATE {} SET deleted_at = ?, updated_at = ? WHERE id = ?",
            self.tables.tags
        );
        sqlx::query(&sql)
            .bind(&stamp)
            .bind(&stamp)
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        let sql = format!("DELETE FROM {} WHERE tag_id = ?", self.tables.taggables);
        sqlx::query(&sql)
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        tag.deleted_at = Some(now);
        tag.updated_at = now;
        Ok(Some(tag))
    }

    async fn restore_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError> {
        let Some(mut tag) = self.fetch_tag(id, false).await? else {
            return Ok(None);
        };
        if !tag.is_deleted() {
            return Ok(None);
        }
        let now = self.clock.now();

        let sql = format!(
            "UPDATE {} SET deleted_at = NULL, updated_at = ? WHERE id = ?",
            self.tables.tags
        );
        sqlx::query(&sql)
            .bind(format_time(now)?)
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        tag.deleted_at = None;
        tag.updated_at = now;
        Ok(Some(tag))
    }

    async fn list_associations(&mut self, subject: &SubjectRef) -> Result<Vec<TagId>, StoreError> {
        Ok(self
            .list_subject_tags(subject)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect())
    }

    async fn list_subject_tags(&mut self, subject: &SubjectRef) -> Result<Vec<Tag>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM {} a JOIN {} t ON t.id = a.tag_id
            WHERE a.subject_type = ? AND a.subject_id = ? AND t.deleted_at IS NULL
            ORDER BY t.sort_order, t.id
            "#,
            self.tables.tag_columns(),
            self.tables.taggables,
            self.tables.tags
        );
        self.fetch_tags(
            &sql,
            &[
                Some(subject.subject_type.clone()),
                Some(subject.subject_id.clone()),
            ],
        )
        .await
    }

    async fn list_entries(
        &mut self,
        tag_id: TagId,
        subject_type: &str,
    ) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT subject_id FROM {} WHERE tag_id = ? AND subject_type = ? ORDER BY subject_id",
            self.tables.taggables
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(tag_id.0)
            .bind(subject_type)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn attach(&mut self, subject: &SubjectRef, ids: &[TagId]) -> Result<(), StoreError> {
        let stamp = format_time(self.clock.now())?;
        let sql = format!(
            r#"
            INSERT OR IGNORE INTO {} (tag_id, subject_type, subject_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            self.tables.taggables
        );
        for id in ids {
            sqlx::query(&sql)
                .bind(id.0)
                .bind(&subject.subject_type)
                .bind(&subject.subject_id)
                .bind(&stamp)
                .bind(&stamp)
                .execute(&mut *self.tx)
                .await
                .map_err(map_db_err)?;
        }
        Ok(())
    }

    async fn detach(&mut self, subject: &SubjectRef, ids: &[TagId]) -> Result<(), StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE subject_type = ? AND subject_id = ? \
             AND tag_id IN (SELECT value FROM json_each(?))",
            self.tables.taggables
        );
        sqlx::query(&sql)
            .bind(&subject.subject_type)
            .bind(&subject.subject_id)
            .bind(to_json(ids)?)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn detach_all(&mut self, subject: &SubjectRef) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE subject_type = ? AND subject_id = ?",
            self.tables.taggables
        );
        let result = sqlx::query(&sql)
            .bind(&subject.subject_type)
            .bind(&subject.subject_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected())
    }

    async fn filter_subjects(
        &mut self,
        subject_type: &str,
        candidates: &[String],
        predicate: &ScopePredicate,
    ) -> Result<Vec<String>, StoreError> {
        let links = self.tables.live_links();
        let group_clause = r#" AND t."group" = ?"#;

        let (condition, tag_ids, group, required) = match predicate {
            ScopePredicate::Nothing => return Ok(Vec::new()),
            ScopePredicate::WithoutAny => (format!("NOT EXISTS (SELECT 1 {links})"), None, None, None),
            ScopePredicate::All { tag_ids, group } => {
                let distinct: std::collections::HashSet<&TagId> = tag_ids.iter().collect();
                (
                    format!(
                        "(SELECT COUNT(DISTINCT a.tag_id) {links} \
                         AND a.tag_id IN (SELECT value FROM json_each(?)){}) = ?",
                        if group.is_some() { group_clause } else { "" }
                    ),
                    Some(tag_ids),
                    group.as_ref(),
                    Some(distinct.len() as i64),
                )
            }
            ScopePredicate::Any { tag_ids, group } | ScopePredicate::None { tag_ids, group } => {
                let negate = if matches!(predicate, ScopePredicate::None { .. }) {
                    "NOT "
                } else {
                    ""
                };
                (
                    format!(
                        "{negate}EXISTS (SELECT 1 {links} \
                         AND a.tag_id IN (SELECT value FROM json_each(?)){})",
                        if group.is_some() { group_clause } else { "" }
                    ),
                    Some(tag_ids),
                    group.as_ref(),
                    None,
                )
            }
        };

        let sql = format!(
            "SELECT c.value FROM json_each(?) c WHERE {} ORDER BY c.key",
            condition
        );
        let mut query = sqlx::query_as::<_, (String,)>(&sql)
            .bind(to_json(candidates)?)
            .bind(subject_type);
        if let Some(tag_ids) = tag_ids {
            query = query.bind(to_json(tag_ids)?);
        }
        if let Some(group) = group {
            query = query.bind(group);
        }
        if let Some(required) = required {
            query = query.bind(required);
        }

        let rows = query.fetch_all(&mut *self.tx).await.map_err(map_db_err)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_db_err)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(map_db_err)
    }
}
