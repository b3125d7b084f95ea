use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::RestifyRequest;

/// Predicate deciding whether a request may see a declared unit.
pub type SeePredicate = Arc<dyn Fn(&RestifyRequest) -> bool + Send + Sync>;

/// Visibility gate shared by filters, fields, actions and getters.
#[derive(Clone, Default)]
pub struct Visibility {
    predicate: Option<SeePredicate>,
}

impl Visibility {
    /// Visible to every request.
    #[must_use]
    pub fn always() -> Self {
        Self::default()
    }

    /// Visible when the predicate holds.
    #[must_use]
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&RestifyRequest) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(predicate)),
        }
    }

    /// Returns whether the request may see the unit.
    #[must_use]
    pub fn allows(&self, request: &RestifyRequest) -> bool {
        self.predicate
            .as_ref()
            .is_none_or(|predicate| predicate(request))
    }
}

impl Debug for Visibility {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Visibility")
            .field("restricted", &self.predicate.is_some())
            .finish()
    }
}
