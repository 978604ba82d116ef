// 缓存模块：令牌注销与请求限流

pub mod keys;
pub mod operations;

pub use operations::{RateLimitCacheOperations, TokenCacheOperations};
