use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;

use crate::cache::keys::revoked_token_key;

/// 令牌注销操作
pub struct TokenCacheOperations;

impl TokenCacheOperations {
    /// 注销令牌，保留到令牌自然过期为止
    pub async fn revoke_token(
        redis: &Arc<RedisClient>,
        token: &str,
        expires_at: i64,
    ) -> Result<(), redis::RedisError> {
        let ttl = expires_at - chrono::Utc::now().timestamp();
        if ttl <= 0 {
            return Ok(());
        }

        let mut conn = redis.get_multiplexed_async_connection().await?;
        let _: () = conn
            .set_ex(revoked_token_key(token), expires_at, ttl as u64)
            .await?;

        tracing::debug!("Token revoked until {}", expires_at);
        Ok(())
    }

    /// 检查令牌是否已注销
    pub async fn is_revoked(
        redis: &Arc<RedisClient>,
        token: &str,
    ) -> Result<bool, redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let exists: bool = conn.exists(revoked_token_key(token)).await?;
        Ok(exists)
    }
}
