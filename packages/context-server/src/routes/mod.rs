// HTTP routes
pub mod context;
pub mod health;

pub use context::*;
pub use health::*;
