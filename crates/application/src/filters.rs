//! Filter units the search pipeline applies to a [`crate::ModelQuery`].

mod advanced;
mod matches;
mod searchable;
mod sortable;
mod visibility;

#[cfg(test)]
mod tests;

pub use advanced::{
    AdvancedFilter, BooleanFilter, CallbackFilter, FilterApply, FilterKind, FilterOption,
    IntegerFilter, SelectFilter, TimestampFilter,
};
pub use matches::{MatchCallback, MatchDefinition, MatchFilter, Matchable, typed_condition};
pub use searchable::SearchableFilter;
pub use sortable::{SortCallback, SortDefinition, SortableFilter};
pub use visibility::{SeePredicate, Visibility};
