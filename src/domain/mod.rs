pub mod chunking;
pub mod entities;
pub mod errors;
pub mod index;
pub mod ports;

pub use entities::*;
pub use errors::{DomainError, Result};
pub use index::VectorIndex;
