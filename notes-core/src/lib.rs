//! Notes Core - Entity Types
//!
//! Data structures, input validation and the error hierarchy shared by the
//! storage and API crates. No I/O lives here.

mod entities;
mod error;
pub mod validation;

pub use entities::*;
pub use error::*;
