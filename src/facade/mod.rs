pub mod store;

pub use store::{ScopeStore, SharedScopeStore, lock_store};
