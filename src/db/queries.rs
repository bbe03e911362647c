use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{NewQueuedPost, QueueKind, QueuedPost, Session, User};

// ========== Queue ==========

/// Insert a post into the queue its routing picks, ignoring duplicates.
///
/// Returns the internal id of the new row, or `None` when the `post_id` was
/// already queued.
pub async fn enqueue(pool: &SqlitePool, post: &NewQueuedPost) -> Result<Option<i64>> {
    enqueue_into(pool, post.queue_kind(), post).await
}

/// Insert a post into a specific queue, ignoring duplicates.
pub async fn enqueue_into(
    pool: &SqlitePool,
    kind: QueueKind,
    post: &NewQueuedPost,
) -> Result<Option<i64>> {
    let attachments =
        serde_json::to_string(&post.attachments).context("Failed to encode attachments")?;
    let links = post
        .links
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("Failed to encode links")?;

    let result = sqlx::query(&format!(
        r"
        INSERT OR IGNORE INTO {}
            (post_id, author, author_link, message, attachments, provider, is_explicit, links)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
        kind.table()
    ))
    .bind(&post.post_id)
    .bind(&post.author)
    .bind(&post.author_link)
    .bind(&post.message)
    .bind(&attachments)
    .bind(&post.provider)
    .bind(post.is_explicit)
    .bind(&links)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to enqueue post into {}", kind.as_str()))?;

    if result.rows_affected() == 0 {
        Ok(None)
    } else {
        Ok(Some(result.last_insert_rowid()))
    }
}

/// Check whether a `post_id` is already queued.
pub async fn post_exists(pool: &SqlitePool, kind: QueueKind, post_id: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(&format!(
        "SELECT id FROM {} WHERE post_id = ? LIMIT 1",
        kind.table()
    ))
    .bind(post_id)
    .fetch_optional(pool)
    .await
    .context("Failed to check queued post")?;

    Ok(row.is_some())
}

/// Oldest entry of one queue.
pub async fn queue_head(pool: &SqlitePool, kind: QueueKind) -> Result<Option<QueuedPost>> {
    sqlx::query_as(&format!(
        "SELECT * FROM {} ORDER BY id ASC LIMIT 1",
        kind.table()
    ))
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to read head of {} queue", kind.as_str()))
}

/// Next candidate for publishing: any boosted entry before all default
/// entries, lowest internal id first. The row stays queued until
/// [`remove_post`] is called.
pub async fn dequeue(pool: &SqlitePool) -> Result<Option<(QueueKind, QueuedPost)>> {
    for kind in QueueKind::ALL {
        if let Some(post) = queue_head(pool, kind).await? {
            return Ok(Some((kind, post)));
        }
    }
    Ok(None)
}

/// Delete a queue row by internal id.
pub async fn remove_post(pool: &SqlitePool, kind: QueueKind, id: i64) -> Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table()))
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to remove post {id} from {} queue", kind.as_str()))?;

    Ok(())
}

/// Number of entries in one queue.
pub async fn count_queued(pool: &SqlitePool, kind: QueueKind) -> Result<i64> {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", kind.table()))
        .fetch_one(pool)
        .await
        .context("Failed to count queued posts")
}

// ========== Users ==========

/// Get a user by email.
pub async fn get_user(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT email, password_hash FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user")
}

/// Register a user. Returns `false` if the email already exists.
pub async fn add_user(pool: &SqlitePool, email: &str, password_hash: &str) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO users (email, password_hash) VALUES (?, ?)")
        .bind(email)
        .bind(password_hash)
        .execute(pool)
        .await
        .context("Failed to add user")?;

    Ok(result.rows_affected() > 0)
}

// ========== Sessions ==========

/// Create a new session.
pub async fn create_session(
    pool: &SqlitePool,
    cookie: &str,
    email: &str,
    token: &str,
    expires_at: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO sessions (cookie, email, token, expires_at)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(cookie)
    .bind(email)
    .bind(token)
    .bind(expires_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(result.last_insert_rowid())
}

/// Get a session by its cookie value.
pub async fn get_session_by_cookie(pool: &SqlitePool, cookie: &str) -> Result<Option<Session>> {
    sqlx::query_as("SELECT * FROM sessions WHERE cookie = ?")
        .bind(cookie)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch session by cookie")
}

/// Delete a session.
pub async fn delete_session(pool: &SqlitePool, cookie: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE cookie = ?")
        .bind(cookie)
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(())
}

/// Delete every session whose expiry has passed.
pub async fn delete_expired_sessions(pool: &SqlitePool, now: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}
