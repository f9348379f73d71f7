//! Mock storage implementations for testing.
//!
//! Both stores keep everything in memory behind `tokio::sync::RwLock` and
//! expose failure toggles so callers can exercise error paths.

mod command_store;
mod cursor_store;

pub use command_store::{MockCommandStore, StoreCall};
pub use cursor_store::MockCursorStore;

#[cfg(test)]
mod tests;
