// Document lifecycle hooks, executed ring by ring around store calls

pub mod context;
pub mod error;
pub mod implementations;
pub mod pipeline;
pub mod traits;

pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use traits::*;
