//! Type definitions for permset storage.

mod ids;
mod permissions;
mod principals;

pub use ids::*;
pub use permissions::*;
pub use principals::*;
