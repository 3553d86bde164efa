//! Schema-driven record engine.
//!
//! Turns a table schema into field validation rules, computed-field
//! definitions, and the codec between in-memory records and their persisted
//! encoded form.

pub mod codec;
pub mod config;
pub mod error;
pub mod formula;
pub mod lookup;
pub mod registry;
pub mod schema;
pub mod validate;
pub mod value;

pub use codec::Record;
