use std::future::Future;

use uuid::Uuid;

use crate::entities::{Message, Role, SqliteStore, decode_ts, encode_ts, now};

type MessageRow = (String, String, String, String, String);

pub trait MessageStore: Send + Sync + 'static {
    /// Append one turn; the store assigns its id and creation timestamp.
    fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> impl Future<Output = Result<Message, sqlx::Error>> + Send;

    /// Every message of a conversation, oldest first.  Equal timestamps keep
    /// insertion order.
    fn list_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<Message>, sqlx::Error>> + Send;

    fn count_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;

    /// Remove every message of a conversation.  Returns how many were removed.
    fn delete_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

fn from_row(
    (id, conversation_id, role, content, created_at): MessageRow,
) -> Result<Message, sqlx::Error> {
    let role = role
        .parse::<Role>()
        .map_err(|e| sqlx::Error::Decode(format!("unknown message role '{role}': {e}").into()))?;
    Ok(Message {
        id,
        conversation_id,
        role,
        content,
        created_at: decode_ts(&created_at)?,
    })
}

impl MessageStore for SqliteStore {
    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, sqlx::Error> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_owned(),
            role,
            content: content.to_owned(),
            created_at: now(),
        };
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(encode_ts(&message.created_at))
        .execute(&self.pool)
        .await?;
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, conversation_id, role, content, created_at \
             FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn count_messages(&self, conversation_id: &str) -> Result<u64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = ?1")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn delete_messages(&self, conversation_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
