mod model_store;
mod policy_cache;

pub use model_store::{ModelReader, ModelStore, StoreTransaction};
pub use policy_cache::PolicyCache;
