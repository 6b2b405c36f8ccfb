pub mod cache;
pub mod llm;
pub mod providers;
pub mod rate_limiter;
pub mod resolvers;
pub mod sqlite;
