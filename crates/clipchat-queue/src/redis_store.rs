//! Redis binding of [`KvStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::QueueResult;
use crate::kv::{Field, KvStore};

/// Compare-and-set over hash fields.
///
/// ARGV: guard count, then (field, expected) pairs, then (field, value) pairs.
const GUARDED_HSET: &str = r#"
local guards = tonumber(ARGV[1])
for i = 0, guards - 1 do
  local current = redis.call('HGET', KEYS[1], ARGV[2 + i * 2])
  if not current then current = '' end
  if current ~= ARGV[3 + i * 2] then return 0 end
end
local first = 2 + guards * 2
if first <= #ARGV then
  redis.call('HSET', KEYS[1], unpack(ARGV, first))
end
return 1
"#;

/// Redis-backed store sharing one multiplexed connection per process.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
    guarded_set: Script,
}

impl RedisStore {
    /// Create a store. No connection is made until first use or [`init`](Self::init).
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            guarded_set: Script::new(GUARDED_HSET),
        })
    }

    /// Open the shared connection and check that the server answers.
    pub async fn init(&self) -> QueueResult<()> {
        self.ping().await?;
        info!("Redis store ready");
        Ok(())
    }

    async fn connection(&self) -> QueueResult<MultiplexedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!("Opening multiplexed Redis connection");
                self.client.get_multiplexed_async_connection().await
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn hash_get_all(&self, key: &str) -> QueueResult<HashMap<String, String>> {
        let mut conn = self.connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hash_set(&self, key: &str, fields: &[Field<'_>]) -> QueueResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        conn.hset_multiple::<_, _, _, ()>(key, fields).await?;
        Ok(())
    }

    async fn hash_set_guarded(
        &self,
        key: &str,
        guards: &[Field<'_>],
        fields: &[Field<'_>],
    ) -> QueueResult<bool> {
        let mut conn = self.connection().await?;

        let mut invocation = self.guarded_set.prepare_invoke();
        invocation.key(key).arg(guards.len());
        for (field, expected) in guards {
            invocation.arg(*field).arg(expected);
        }
        for (field, value) in fields {
            invocation.arg(*field).arg(value);
        }

        let applied: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(applied == 1)
    }

    async fn list_push_front(&self, key: &str, value: &str) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.lpush(key, value).await?;
        Ok(len)
    }

    async fn list_push_front_bounded(&self, key: &str, value: &str, bound: usize) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let stop = bound.max(1) as isize - 1;

        let _: () = redis::pipe()
            .atomic()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, stop)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_pop_back(&self, key: &str) -> QueueResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.rpop(key, None).await?;
        Ok(value)
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> QueueResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let values: Vec<String> = conn.lrange(key, start, stop).await?;
        Ok(values)
    }

    async fn list_len(&self, key: &str) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.llen(key).await?;
        Ok(len)
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
