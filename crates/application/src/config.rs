/// Pipeline configuration passed explicitly to the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestifyConfig {
    /// Use case-sensitive `LIKE` for search instead of `ILIKE`.
    pub search_case_sensitive: bool,
    /// Write action log entries for store/update/delete.
    pub log_repository_mutations: bool,
    /// Write action log entries for repository actions.
    pub log_actions: bool,
    /// Batch size used when an action runs over many models.
    pub action_chunk_size: usize,
    /// TTL of memoized policy answers; `None` disables the policy cache.
    pub policy_cache_ttl_seconds: Option<u32>,
    /// Upper bound for `perPage`.
    pub max_per_page: usize,
    /// Only advanced filters the requester may see can be applied.
    pub enforce_filter_visibility: bool,
}

impl Default for RestifyConfig {
    fn default() -> Self {
        Self {
            search_case_sensitive: false,
            log_repository_mutations: true,
            log_actions: true,
            action_chunk_size: 200,
            policy_cache_ttl_seconds: None,
            max_per_page: 100,
            enforce_filter_visibility: true,
        }
    }
}
