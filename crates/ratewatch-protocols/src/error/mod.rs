//! Error types for the collaborator layer.

mod fetch;
mod messaging;

pub use fetch::*;
pub use messaging::*;
