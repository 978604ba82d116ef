/// 缓存操作

pub mod rate_limit;
pub mod token;

pub use rate_limit::RateLimitCacheOperations;
pub use token::TokenCacheOperations;
