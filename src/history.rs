//! Persisted conversation contexts.
//!
//! Turns are append-only rows in `chat_history`, grouped by a free-form
//! context name. A context exists iff at least one turn references it;
//! there is no separate context record. The "active context" state machine
//! (switch/new/delete guards) lives with the console, not here.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One turn as presented to the request builder: role plus content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

pub struct ContextStore {
    pool: SqlitePool,
}

impl ContextStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one immutable turn. A storage failure is printed and the
    /// turn is lost; the caller is never blocked on it.
    pub async fn append_turn(&self, context_name: &str, role: Role, content: &str) {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO chat_history (context_name, role, content, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(context_name)
        .bind(role.as_str())
        .bind(content)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            eprintln!("Error adding message to context '{}': {}", context_name, e);
        }
    }

    /// The most recent `limit` turns (all, when `None`) in chronological
    /// order, oldest first. Storage hands back the newest-first page, so
    /// the result is reversed before returning. Ordering is by rowid:
    /// strictly creation order, unlike second-granularity timestamps.
    pub async fn get_history(&self, context_name: &str, limit: Option<usize>) -> Result<Vec<Turn>> {
        let rows = match limit {
            Some(n) => {
                sqlx::query(
                    "SELECT role, content FROM chat_history \
                     WHERE context_name = ? ORDER BY id DESC LIMIT ?",
                )
                .bind(context_name)
                .bind(n as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT role, content FROM chat_history \
                     WHERE context_name = ? ORDER BY id DESC",
                )
                .bind(context_name)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut turns: Vec<Turn> = rows
            .into_iter()
            .filter_map(|row| {
                let role_str: String = row.get("role");
                let role = Role::parse(&role_str)?;
                Some(Turn {
                    role,
                    content: row.get("content"),
                })
            })
            .collect();

        turns.reverse();
        Ok(turns)
    }

    /// Distinct context names with at least one turn, sorted.
    pub async fn list_contexts(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT context_name FROM chat_history ORDER BY context_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    pub async fn context_exists(&self, context_name: &str) -> bool {
        let row: Result<Option<i64>, sqlx::Error> =
            sqlx::query_scalar("SELECT 1 FROM chat_history WHERE context_name = ? LIMIT 1")
                .bind(context_name)
                .fetch_optional(&self.pool)
                .await;
        matches!(row, Ok(Some(_)))
    }

    /// Delete all turns for a name. Idempotent: deleting a name with zero
    /// turns still succeeds.
    pub async fn delete_context(&self, context_name: &str) -> bool {
        let result = sqlx::query("DELETE FROM chat_history WHERE context_name = ?")
            .bind(context_name)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => true,
            Err(e) => {
                eprintln!("Error deleting context '{}': {}", context_name, e);
                false
            }
        }
    }

    /// Delete every turn in every context.
    pub async fn purge(&self) -> bool {
        match sqlx::query("DELETE FROM chat_history").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                eprintln!("Error purging chat history: {}", e);
                false
            }
        }
    }
}
