use async_trait::async_trait;
use podium_core::repository::KeyValueStore;
use podium_core::{CoreError, CoreResult};
use redis::AsyncCommands;
use tracing::debug;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)
    }
}

fn unavailable(err: redis::RedisError) -> CoreError {
    tracing::error!("Redis error: {}", err);
    CoreError::UnavailableError(format!("Redis: {}", err))
}

#[async_trait]
impl KeyValueStore for RedisClient {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(unavailable)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(unavailable)?;
        debug!("Cached {} for {}s", key, ttl_seconds);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(unavailable)
    }

    async fn take_if_equals(&self, key: &str, expected: &str) -> CoreResult<bool> {
        let mut conn = self.connection().await?;
        // Compare and delete in one server-side step so a code can only be
        // consumed once.
        let script = redis::Script::new(r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end
        "#);

        let deleted: i64 = script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(deleted == 1)
    }

    async fn ping(&self) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
