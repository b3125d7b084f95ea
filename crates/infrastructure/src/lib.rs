//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_model_store;
mod in_memory_policy_cache;
mod postgres_model_store;
mod redis_policy_cache;

#[cfg(test)]
mod chunked_actions;
#[cfg(test)]
mod eager_relations;

pub use in_memory_model_store::InMemoryModelStore;
pub use in_memory_policy_cache::InMemoryPolicyCache;
pub use postgres_model_store::PostgresModelStore;
pub use redis_policy_cache::RedisPolicyCache;
