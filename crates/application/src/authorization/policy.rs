use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use restify_core::{AppResult, UserIdentity};
use restify_domain::{Ability, Model};

/// Authorization object answering per-ability checks for a repository.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Returns whether the viewer holds the ability, optionally for one model.
    async fn allows(
        &self,
        viewer: Option<&UserIdentity>,
        ability: &Ability,
        model: Option<&Model>,
    ) -> AppResult<bool>;
}

/// Rule closure of a [`RulePolicy`].
pub type PolicyRule = Arc<dyn Fn(Option<&UserIdentity>, Option<&Model>) -> bool + Send + Sync>;

/// Policy assembled from per-ability closures.
///
/// Abilities without a rule are denied, except `AllowRestify` and `ViewAny` which default to
/// allowed.
#[derive(Clone, Default)]
pub struct RulePolicy {
    rules: HashMap<String, PolicyRule>,
}

impl RulePolicy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the rule for an ability.
    #[must_use]
    pub fn rule<F>(mut self, ability: Ability, rule: F) -> Self
    where
        F: Fn(Option<&UserIdentity>, Option<&Model>) -> bool + Send + Sync + 'static,
    {
        self.rules.insert(ability.method_name(), Arc::new(rule));
        self
    }

    /// Allows an ability unconditionally.
    #[must_use]
    pub fn allow(self, ability: Ability) -> Self {
        self.rule(ability, |_, _| true)
    }

    /// Allows an ability for authenticated viewers.
    #[must_use]
    pub fn allow_authenticated(self, ability: Ability) -> Self {
        self.rule(ability, |viewer, _| viewer.is_some())
    }
}

#[async_trait]
impl Policy for RulePolicy {
    async fn allows(
        &self,
        viewer: Option<&UserIdentity>,
        ability: &Ability,
        model: Option<&Model>,
    ) -> AppResult<bool> {
        Ok(match self.rules.get(ability.method_name().as_str()) {
            Some(rule) => rule(viewer, model),
            None => matches!(ability, Ability::AllowRestify | Ability::ViewAny),
        })
    }
}
