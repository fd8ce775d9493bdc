//! Request handlers.

pub mod edit;
pub mod health;
pub mod history;
pub mod jobs;

pub use edit::*;
pub use health::*;
pub use history::*;
pub use jobs::*;
