//! Asynchronous side of the record engine.
//!
//! Wraps the pure rules of `sheetdb-core` with the backend seam
//! ([`source::DataSource`]), lookup option loading, image reachability
//! checks, table operations, and the record form controller.

pub mod error;
pub mod form;
pub mod lookup;
pub mod media;
pub mod registry;
pub mod source;
pub mod tables;

pub use error::{EngineError, Result, SourceError};
pub use form::{ExistingRecord, FormController, FormState, SubmitOutcome};
pub use lookup::LookupResolver;
pub use media::{HttpImageProbe, ImageProbe, MediaError, MediaValidator, Url};
pub use source::{DataSource, Fixture, FixtureTable, ImageUpload, InMemoryDataSource};
pub use tables::{Grid, GridRow, TableService};
