use redis::Client as RedisClient;
use std::sync::Arc;

use crate::cache::keys::rate_limit_key;

/// 速率限制计数操作
pub struct RateLimitCacheOperations;

impl RateLimitCacheOperations {
    /// 记录一次请求，返回当前窗口内的请求数
    pub async fn hit(
        redis: &Arc<RedisClient>,
        client_ip: &str,
        window_secs: u64,
    ) -> Result<i64, redis::RedisError> {
        let key = rate_limit_key(client_ip);
        let mut conn = redis.get_multiplexed_async_connection().await?;

        // 固定窗口：SET NX 与 INCR 在同一事务里，计数键总带过期时间
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("EX")
            .arg(window_secs.max(1))
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    /// 计数键剩余秒数，-1 表示没有过期时间，-2 表示不存在
    pub async fn ttl(redis: &Arc<RedisClient>, client_ip: &str) -> Result<i64, redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        redis::cmd("TTL")
            .arg(rate_limit_key(client_ip))
            .query_async(&mut conn)
            .await
    }
}
