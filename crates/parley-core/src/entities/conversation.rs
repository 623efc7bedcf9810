use std::future::Future;

use uuid::Uuid;

use crate::entities::{Conversation, SqliteStore, decode_ts, encode_ts, now};

type ConversationRow = (String, String, String, String, String);

pub trait ConversationStore: Send + Sync + 'static {
    /// Insert a new conversation; the store assigns its id and timestamps.
    fn create_conversation(
        &self,
        session_id: &str,
        title: &str,
    ) -> impl Future<Output = Result<Conversation, sqlx::Error>> + Send;

    fn get_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Conversation>, sqlx::Error>> + Send;

    /// Conversations owned by `session_id`, most recently updated first.
    fn list_conversations(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<Conversation>, sqlx::Error>> + Send;

    /// Replace the title and bump `updated_at`.  `None` if `id` is unknown.
    fn rename_conversation(
        &self,
        id: &str,
        title: &str,
    ) -> impl Future<Output = Result<Option<Conversation>, sqlx::Error>> + Send;

    /// Delete the conversation row only.  Returns `false` if it did not exist.
    fn delete_conversation(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

fn from_row(
    (id, session_id, title, created_at, updated_at): ConversationRow,
) -> Result<Conversation, sqlx::Error> {
    Ok(Conversation {
        id,
        session_id,
        title,
        created_at: decode_ts(&created_at)?,
        updated_at: decode_ts(&updated_at)?,
    })
}

impl ConversationStore for SqliteStore {
    async fn create_conversation(
        &self,
        session_id: &str,
        title: &str,
    ) -> Result<Conversation, sqlx::Error> {
        let ts = now();
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_owned(),
            title: title.to_owned(),
            created_at: ts,
            updated_at: ts,
        };
        let stamp = encode_ts(&ts);
        sqlx::query(
            "INSERT INTO conversations (id, session_id, title, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&conversation.id)
        .bind(&conversation.session_id)
        .bind(&conversation.title)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&self.pool)
        .await?;
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        let row: Option<ConversationRow> = sqlx::query_as(
            "SELECT id, session_id, title, created_at, updated_at \
             FROM conversations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).transpose()
    }

    async fn list_conversations(&self, session_id: &str) -> Result<Vec<Conversation>, sqlx::Error> {
        let rows: Vec<ConversationRow> = sqlx::query_as(
            "SELECT id, session_id, title, created_at, updated_at \
             FROM conversations WHERE session_id = ?1 ORDER BY updated_at DESC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn rename_conversation(
        &self,
        id: &str,
        title: &str,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        let updated_at = encode_ts(&now());
        let row: Option<ConversationRow> = sqlx::query_as(
            "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3 \
             RETURNING id, session_id, title, created_at, updated_at",
        )
        .bind(title)
        .bind(&updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).transpose()
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
