use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::debug;
use cinemastar_booking::{BookingError, BookingResult, ConversationState, ConversationStore};

/// Conversation state kept in Redis as one JSON string per conversation.
///
/// Every save refreshes the key's TTL, so idle conversations expire on
/// their own and `evict_idle` has nothing to do.
#[derive(Clone)]
pub struct RedisConversationStore {
    client: redis::Client,
    ttl_seconds: u64,
}

impl RedisConversationStore {
    pub fn new(connection_string: &str, ttl_seconds: u64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, ttl_seconds })
    }

    async fn connection(&self) -> BookingResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error)
    }
}

fn conversation_key(conversation_id: &str) -> String {
    format!("conversation:{}", conversation_id)
}

fn store_error(err: redis::RedisError) -> BookingError {
    BookingError::Store(err.to_string())
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn load(&self, conversation_id: &str) -> BookingResult<Option<ConversationState>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .get(conversation_key(conversation_id))
            .await
            .map_err(store_error)?;

        payload
            .map(|raw| serde_json::from_str(&raw).map_err(|e| BookingError::Store(e.to_string())))
            .transpose()
    }

    async fn save(&self, conversation_id: &str, state: &ConversationState) -> BookingResult<()> {
        let payload = serde_json::to_string(state).map_err(|e| BookingError::Store(e.to_string()))?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(conversation_key(conversation_id), payload, self.ttl_seconds)
            .await
            .map_err(store_error)?;
        debug!("Conversation {} saved (ttl {}s)", conversation_id, self.ttl_seconds);
        Ok(())
    }

    async fn remove(&self, conversation_id: &str) -> BookingResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(conversation_key(conversation_id))
            .await
            .map_err(store_error)
    }

    async fn evict_idle(&self, _cutoff: DateTime<Utc>) -> BookingResult<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_key() {
        assert_eq!(conversation_key("12345"), "conversation:12345");
    }

    #[test]
    fn test_client_rejects_malformed_url() {
        assert!(RedisConversationStore::new("not a redis url", 900).is_err());
        assert!(RedisConversationStore::new("redis://127.0.0.1:6379/", 900).is_ok());
    }
}
