use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
    },
    Executor, Row, Sqlite,
};

use crate::types::{Content, ContentKind, MediaKind, Status, Submission, SubmissionId};

type Pool = sqlx::Pool<Sqlite>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Means ID allocation is broken somehow.
    #[error("submission {0} already exists")]
    DuplicateId(SubmissionId),
    #[error("submission {id} is malformed in the database: {reason}")]
    Corrupt { id: SubmissionId, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub struct Database {
    pool: Pool,
}

impl Database {
    /// Open (creating if necessary) the database at this `sqlite:` URL.
    pub async fn new(url: &str) -> Result<Database, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // Every write hits the disk before we tell anyone it happened.
            .synchronous(SqliteSynchronous::Full)
            .pragma("cache_size", "-32768")
            .busy_timeout(Duration::from_secs(600));

        let pool = SqlitePoolOptions::new()
            .max_connections(32)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    /// A database that lives only as long as this object. For tests.
    pub async fn new_in_memory() -> Result<Database, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Single connection that never gets recycled, or the data is gone.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    async fn init(pool: Pool) -> Result<Database, StoreError> {
        // SUBMISSIONS:
        // id (unique primary key, never reused)
        // kind ("text", "photo", "video" or "animation")
        // text (only for "text")
        // media_ref (Telegram file ID, only for media)
        // caption (only for media, may be empty)
        // status ("pending", "approved" or "rejected")
        // created_at (date+time in UTC)
        // decided_at (date+time in UTC, NULL while pending)
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS submissions (
                    id INTEGER PRIMARY KEY NOT NULL,
                    kind TEXT NOT NULL,
                    text TEXT NULL,
                    media_ref TEXT NULL,
                    caption TEXT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL,
                    decided_at TEXT NULL,
                    CHECK ((kind = 'text') = (text IS NOT NULL)),
                    CHECK ((kind = 'text') = (media_ref IS NULL))
                ) STRICT;",
        ))
        .await?;

        // ID_SEQUENCE:
        // name (unique primary key, name of the table the IDs are for)
        // value (last ID handed out)
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS id_sequence (
                    name TEXT PRIMARY KEY NOT NULL,
                    value INTEGER NOT NULL
                ) STRICT;",
        ))
        .await?;

        // Make sure the sequence is never behind what's actually in the table.
        // "WHERE true" is required by SQLite's parser for an upsert from a SELECT.
        pool.execute(sqlx::query(
            "INSERT INTO id_sequence(name, value)
                SELECT 'submissions', COALESCE(MAX(id), 0) FROM submissions WHERE true
            ON CONFLICT(name) DO
                UPDATE SET value=MAX(value, excluded.value);",
        ))
        .await?;

        Ok(Database { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Allocate an ID for a new submission. Each call returns a bigger number than every call
    /// before it, including calls made by previous runs of the bot.
    pub async fn next_id(&self) -> Result<SubmissionId, StoreError> {
        let id = sqlx::query(
            "UPDATE id_sequence SET value=value + 1
            WHERE name='submissions'
            RETURNING value;",
        )
        .map(|row: SqliteRow| row.get::<i64, _>("value"))
        .fetch_one(&self.pool)
        .await?;

        Ok(SubmissionId(id))
    }

    /// Store a new submission as pending under this ID.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateId`] if something already has this ID.
    pub async fn save(&self, id: SubmissionId, content: &Content) -> Result<(), StoreError> {
        let (text, media_ref, caption) = match content {
            Content::Text { text } => (Some(text.as_str()), None, None),
            Content::Media {
                media_ref, caption, ..
            } => (None, Some(media_ref.as_str()), Some(caption.as_str())),
        };

        let result = sqlx::query(
            "INSERT INTO submissions(id, kind, text, media_ref, caption, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?);",
        )
        .bind(id.0)
        .bind(content.kind().as_str())
        .bind(text)
        .bind(media_ref)
        .bind(caption)
        .bind(Status::Pending.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StoreError::DuplicateId(id));
            }
            Err(e) => return Err(e.into()),
        }

        // In case this ID didn't come from `next_id`, don't ever hand it out later.
        sqlx::query("UPDATE id_sequence SET value=MAX(value, ?) WHERE name='submissions';")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Returns [`None`] if there's no submission with this ID.
    pub async fn load(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        sqlx::query(
            "SELECT id, kind, text, media_ref, caption, status, created_at, decided_at
            FROM submissions WHERE id=?;",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| submission_from_row(id, &row))
        .transpose()
    }

    /// Overwrite the status of a submission, whatever it was. Does nothing if there's no such
    /// submission.
    pub async fn update_status(&self, id: SubmissionId, status: Status) -> Result<(), StoreError> {
        let decided_at = status.is_terminal().then(Utc::now);

        sqlx::query("UPDATE submissions SET status=?, decided_at=? WHERE id=?;")
            .bind(status.as_str())
            .bind(decided_at)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Set the status of a submission to `to`, but only if it's currently `from`.
    ///
    /// Returns `true` if the submission was changed.
    pub async fn transition_status(
        &self,
        id: SubmissionId,
        from: Status,
        to: Status,
    ) -> Result<bool, StoreError> {
        let decided_at = to.is_terminal().then(Utc::now);

        let result = sqlx::query(
            "UPDATE submissions SET status=?, decided_at=?
            WHERE id=? AND status=?;",
        )
        .bind(to.as_str())
        .bind(decided_at)
        .bind(id.0)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn submission_from_row(id: SubmissionId, row: &SqliteRow) -> Result<Submission, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt { id, reason };

    let kind: ContentKind = row
        .try_get::<String, _>("kind")?
        .parse()
        .map_err(|e| corrupt(format!("{e}")))?;
    let status: Status = row
        .try_get::<String, _>("status")?
        .parse()
        .map_err(|e| corrupt(format!("{e}")))?;

    let text: Option<String> = row.try_get("text")?;
    let media_ref: Option<String> = row.try_get("media_ref")?;
    let caption: Option<String> = row.try_get("caption")?;

    let media_kind = match kind {
        ContentKind::Text => None,
        ContentKind::Photo => Some(MediaKind::Photo),
        ContentKind::Video => Some(MediaKind::Video),
        ContentKind::Animation => Some(MediaKind::Animation),
    };

    let content = match (media_kind, text, media_ref) {
        (None, Some(text), None) => Content::Text { text },
        (Some(kind), None, Some(media_ref)) => Content::Media {
            kind,
            media_ref,
            caption: caption.unwrap_or_default(),
        },
        _ => return Err(corrupt(format!("payload columns don't match kind {kind}"))),
    };

    Ok(Submission {
        id: SubmissionId(row.try_get("id")?),
        content,
        status,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        decided_at: row.try_get::<Option<DateTime<Utc>>, _>("decided_at")?,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn ids_go_up() {
        let db = Database::new_in_memory().await.unwrap();

        let mut last = SubmissionId(0);
        for _ in 0..20 {
            let id = db.next_id().await.unwrap();
            assert!(id > last, "{id} came after {last}");
            last = id;
        }
    }

    #[tokio::test]
    async fn ids_survive_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("submissions.sqlite").display());

        let db = Database::new(&url).await.unwrap();
        let first = db.next_id().await.unwrap();
        db.save(first, &Content::text("hi")).await.unwrap();
        // Allocated but never saved. Still must not be reused.
        let second = db.next_id().await.unwrap();
        db.close().await;

        let db = Database::new(&url).await.unwrap();
        let third = db.next_id().await.unwrap();
        assert!(third > second);
        assert!(second > first);

        let loaded = db.load(first).await.unwrap().unwrap();
        assert_eq!(loaded.content, Content::text("hi"));
        db.close().await;
    }

    #[tokio::test]
    async fn explicit_ids_are_never_handed_out() {
        let db = Database::new_in_memory().await.unwrap();

        db.save(SubmissionId(50), &Content::text("from elsewhere"))
            .await
            .unwrap();
        assert_eq!(db.next_id().await.unwrap(), SubmissionId(51));
    }

    #[tokio::test]
    async fn save_and_load() {
        let db = Database::new_in_memory().await.unwrap();

        let id = db.next_id().await.unwrap();
        let content = Content::media(MediaKind::Video, "abc123", "");
        db.save(id, &content).await.unwrap();

        let submission = db.load(id).await.unwrap().unwrap();
        assert_eq!(submission.id, id);
        assert_eq!(submission.content, content);
        assert_eq!(submission.status, Status::Pending);
        assert_eq!(submission.decided_at, None);

        assert_eq!(db.load(SubmissionId(9999)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_ids() {
        let db = Database::new_in_memory().await.unwrap();

        let id = db.next_id().await.unwrap();
        db.save(id, &Content::text("first")).await.unwrap();

        let result = db.save(id, &Content::text("second")).await;
        assert!(matches!(result, Err(StoreError::DuplicateId(x)) if x == id));

        // The original is untouched.
        let submission = db.load(id).await.unwrap().unwrap();
        assert_eq!(submission.content, Content::text("first"));
    }

    #[tokio::test]
    async fn status_updates() {
        let db = Database::new_in_memory().await.unwrap();

        let id = db.next_id().await.unwrap();
        let content = Content::media(MediaKind::Photo, "photo_ref", "look at this");
        db.save(id, &content).await.unwrap();

        db.update_status(id, Status::Rejected).await.unwrap();
        let submission = db.load(id).await.unwrap().unwrap();
        assert_eq!(submission.status, Status::Rejected);
        assert_eq!(submission.content, content);
        assert!(submission.decided_at.is_some());

        // Plain overwrite doesn't care about the current status.
        db.update_status(id, Status::Approved).await.unwrap();
        assert_eq!(
            db.load(id).await.unwrap().unwrap().status,
            Status::Approved
        );

        // Nothing to update, nothing happens.
        db.update_status(SubmissionId(9999), Status::Approved)
            .await
            .unwrap();
        assert_eq!(db.load(SubmissionId(9999)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn transitions_only_from_expected_status() {
        let db = Database::new_in_memory().await.unwrap();

        let id = db.next_id().await.unwrap();
        db.save(id, &Content::text("hello")).await.unwrap();

        assert!(db
            .transition_status(id, Status::Pending, Status::Approved)
            .await
            .unwrap());
        assert!(!db
            .transition_status(id, Status::Pending, Status::Rejected)
            .await
            .unwrap());
        assert!(!db
            .transition_status(SubmissionId(9999), Status::Pending, Status::Rejected)
            .await
            .unwrap());

        assert_eq!(
            db.load(id).await.unwrap().unwrap().status,
            Status::Approved
        );
    }
}
