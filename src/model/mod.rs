//! Data model and value types for formulas
//!
//! Values, their static types and the provider that supplies concrete math.

pub mod provider;
pub mod types;
pub mod value;

pub use provider::{StandardProvider, ValueProvider};
pub use types::TypeInfo;
pub use value::{HostValue, Value};
