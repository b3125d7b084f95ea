//! Resolution and execution of repository actions and getters.

mod action_dispatcher;
mod getter_dispatcher;
mod resolution;

#[cfg(test)]
mod tests;

pub use action_dispatcher::{ActionDispatcher, RepositorySelection};
pub use getter_dispatcher::GetterDispatcher;
pub use resolution::{available_actions, available_getters, resolve_action, resolve_getter};
