use serde::{Deserialize, Serialize};

/// Policy capability checked before a repository operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    /// Gate for any access to the repository.
    AllowRestify,
    /// Listing models.
    ViewAny,
    /// Reading one model.
    Show,
    /// Creating one model.
    Store,
    /// Creating models in bulk.
    StoreBulk,
    /// Updating one model.
    Update,
    /// Updating models in bulk.
    UpdateBulk,
    /// Deleting one model.
    Delete,
    /// Deleting models in bulk.
    DeleteBulk,
    /// Attaching related models through the named relation.
    Attach(String),
    /// Detaching related models through the named relation.
    Detach(String),
    /// Synchronizing related models through the named relation.
    Sync(String),
}

impl Ability {
    /// Returns the policy method name used in logs and cache keys.
    #[must_use]
    pub fn method_name(&self) -> String {
        match self {
            Self::AllowRestify => "allowRestify".to_owned(),
            Self::ViewAny => "allowRestify.viewAny".to_owned(),
            Self::Show => "show".to_owned(),
            Self::Store => "store".to_owned(),
            Self::StoreBulk => "storeBulk".to_owned(),
            Self::Update => "update".to_owned(),
            Self::UpdateBulk => "updateBulk".to_owned(),
            Self::Delete => "delete".to_owned(),
            Self::DeleteBulk => "deleteBulk".to_owned(),
            Self::Attach(relation) => format!("attach.{relation}"),
            Self::Detach(relation) => format!("detach.{relation}"),
            Self::Sync(relation) => format!("sync.{relation}"),
        }
    }

    /// Returns whether the ability is evaluated against a concrete model.
    #[must_use]
    pub fn is_model_bound(&self) -> bool {
        !matches!(
            self,
            Self::AllowRestify | Self::ViewAny | Self::Store | Self::StoreBulk
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Ability;

    #[test]
    fn relation_abilities_embed_relation_name() {
        assert_eq!(Ability::Attach("roles".to_owned()).method_name(), "attach.roles");
        assert_ne!(
            Ability::Attach("roles".to_owned()).method_name(),
            Ability::Detach("roles".to_owned()).method_name()
        );
    }

    #[test]
    fn store_is_not_model_bound() {
        assert!(!Ability::Store.is_model_bound());
        assert!(Ability::Update.is_model_bound());
    }
}
