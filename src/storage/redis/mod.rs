//! Redis storage implementations.

mod command_store;
mod cursor_store;

pub use command_store::RedisCommandStore;
pub use cursor_store::{RedisCursorStore, DEFAULT_CURSOR_KEY};
