//! Systems - logic that operates on components

mod falling;
mod formation;
mod vertical;

pub use falling::*;
pub use formation::*;
pub use vertical::*;
