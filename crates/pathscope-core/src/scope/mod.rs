//! Scope compilation: expressions to query fragments.

mod compiler;
mod value;

pub use compiler::{RuntimeParams, ScopeCompiler};
pub use value::{safe_value, SafeValue};
