use std::collections::BTreeMap;
use std::sync::Arc;

use restify_core::{AppError, AppResult};

use super::{Relation, Repository};
use crate::filters::SortDefinition;

/// Builder validating repository declarations before they are served.
#[derive(Default)]
pub struct RepositoryRegistryBuilder {
    repositories: Vec<Arc<dyn Repository>>,
}

impl RepositoryRegistryBuilder {
    /// Adds a repository.
    #[must_use]
    pub fn register(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repositories.push(repository);
        self
    }

    /// Validates uri keys and relation targets and builds the registry.
    pub fn build(self) -> AppResult<RepositoryRegistry> {
        let mut repositories: BTreeMap<String, Arc<dyn Repository>> = BTreeMap::new();
        for repository in self.repositories {
            let uri_key = repository.uri_key().to_owned();
            if uri_key.trim().is_empty() {
                return Err(AppError::Internal(format!(
                    "repository for table '{}' has an empty uri key",
                    repository.table()
                )));
            }
            if repositories.insert(uri_key.clone(), repository).is_some() {
                return Err(AppError::Internal(format!(
                    "repository uri key '{uri_key}' is registered twice"
                )));
            }
        }

        for repository in repositories.values() {
            let relations = repository.relations();
            for relation in &relations {
                if !repositories.contains_key(relation.repository()) {
                    return Err(AppError::Internal(format!(
                        "relation '{}' of repository '{}' targets unknown repository '{}'",
                        relation.name(),
                        repository.uri_key(),
                        relation.repository()
                    )));
                }
            }

            for (key, definition) in repository.sort_fields() {
                let relation = match &definition {
                    SortDefinition::Related { relation, .. } => Some(relation.as_str()),
                    SortDefinition::Filter(filter) => filter.relation(),
                    SortDefinition::Column(_) | SortDefinition::Callback(_) => None,
                };
                if let Some(relation) = relation
                    && !relations
                        .iter()
                        .any(|candidate| candidate.name() == relation && candidate.is_to_one())
                {
                    return Err(AppError::Internal(format!(
                        "sort '{key}' of repository '{}' uses '{relation}', which is not a to-one relation",
                        repository.uri_key()
                    )));
                }
            }
        }

        Ok(RepositoryRegistry { repositories })
    }
}

/// Registry mapping uri keys to repositories, built once at startup.
#[derive(Clone, Default)]
pub struct RepositoryRegistry {
    repositories: BTreeMap<String, Arc<dyn Repository>>,
}

impl RepositoryRegistry {
    /// Starts a registry builder.
    #[must_use]
    pub fn builder() -> RepositoryRegistryBuilder {
        RepositoryRegistryBuilder::default()
    }

    /// Resolves a repository by uri key.
    pub fn resolve(&self, uri_key: &str) -> AppResult<Arc<dyn Repository>> {
        self.repositories
            .get(uri_key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("repository '{uri_key}' does not exist")))
    }

    /// Resolves the repository a relation targets.
    pub fn related(&self, relation: &Relation) -> AppResult<Arc<dyn Repository>> {
        self.repositories
            .get(relation.repository())
            .cloned()
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "relation '{}' targets unknown repository '{}'",
                    relation.name(),
                    relation.repository()
                ))
            })
    }

    /// Returns registered uri keys in order.
    #[must_use]
    pub fn uri_keys(&self) -> Vec<String> {
        self.repositories.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use restify_core::AppError;

    use super::RepositoryRegistry;
    use crate::filters::SortDefinition;
    use crate::repository::{Relation, Repository};

    struct Posts;

    impl Repository for Posts {
        fn uri_key(&self) -> &str {
            "posts"
        }

        fn table(&self) -> &str {
            "posts"
        }

        fn relations(&self) -> Vec<Relation> {
            vec![
                Relation::belongs_to("owner", "users", "user_id"),
                Relation::has_many("comments", "comments", "post_id"),
            ]
        }

        fn sort_fields(&self) -> Vec<(String, SortDefinition)> {
            vec![(
                "owner.name".to_owned(),
                SortDefinition::related("owner", "name"),
            )]
        }
    }

    struct Users;

    impl Repository for Users {
        fn uri_key(&self) -> &str {
            "users"
        }

        fn table(&self) -> &str {
            "users"
        }
    }

    #[test]
    fn build_rejects_unknown_relation_targets() {
        let result = RepositoryRegistry::builder()
            .register(Arc::new(Posts))
            .register(Arc::new(Users))
            .build();

        assert!(matches!(result, Err(AppError::Internal(message)) if message.contains("comments")));
    }

    #[test]
    fn resolve_unknown_key_is_not_found() {
        let registry = RepositoryRegistry::builder()
            .register(Arc::new(Users))
            .build()
            .unwrap_or_else(|_| unreachable!());

        assert!(matches!(registry.resolve("ghosts"), Err(AppError::NotFound(_))));
        assert_eq!(registry.uri_keys(), vec!["users".to_owned()]);
    }
}
