pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, ScopeError};
pub use types::{ScopeId, ScopeStats, SizeProfile};
pub use value::{FromValue, Value};
