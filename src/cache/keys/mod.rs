/// 缓存键生成函数
use sha2::{Digest, Sha256};

/// 已注销令牌键前缀
const REVOKED_TOKEN_PREFIX: &str = "token:revoked:";

/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 生成已注销令牌键，令牌本身不落入 Redis
pub fn revoked_token_key(token: &str) -> String {
    format!("{}{:x}", REVOKED_TOKEN_PREFIX, Sha256::digest(token.as_bytes()))
}

/// 生成限流计数键
pub fn rate_limit_key(client_ip: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, client_ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_key_hides_token() {
        let key = revoked_token_key("abc.def.ghi");
        assert!(key.starts_with(REVOKED_TOKEN_PREFIX));
        assert!(!key.contains("abc.def.ghi"));
        assert_eq!(key.len(), REVOKED_TOKEN_PREFIX.len() + 64);
        assert_eq!(key, revoked_token_key("abc.def.ghi"));
    }

    #[test]
    fn rate_limit_key_per_ip() {
        assert_eq!(rate_limit_key("10.0.0.1"), "rate_limit:10.0.0.1");
    }
}
