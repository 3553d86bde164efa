//! Record form controller.
//!
//! Drives one row edit at a time through an explicit state machine:
//!
//! ```text
//! Closed -> Opening -> Ready -> Validating -> Submitting -> Closed
//!                        ^          |             |
//!                        +-- ReadyWithErrors <----+
//! ```
//!
//! Synchronous field validation always finishes before any image check
//! starts. Every open/close bumps a generation counter; results of
//! asynchronous steps that come back under a stale generation are dropped.
//! The state lock is never held across an await point.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;

use sheetdb_core::codec::{self, Record};
use sheetdb_core::config::EngineConfig;
use sheetdb_core::error::{FieldError, ValidationErrors};
use sheetdb_core::lookup::LookupOption;
use sheetdb_core::schema::{DataType, Row, RowId, TableId, TableSchema};
use sheetdb_core::validate::{self, RecordContext};

use crate::error::{EngineError, Result};
use crate::lookup::LookupResolver;
use crate::media::MediaValidator;
use crate::registry;
use crate::source::{DataSource, ImageUpload};

/// Lifecycle state of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Closed,
    Opening,
    Ready,
    Validating,
    Submitting,
    ReadyWithErrors,
}

impl FormState {
    /// Lower-case state name for logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormState::Closed => "closed",
            FormState::Opening => "opening",
            FormState::Ready => "ready",
            FormState::Validating => "validating",
            FormState::Submitting => "submitting",
            FormState::ReadyWithErrors => "ready with errors",
        }
    }

    /// Returns `true` while a submit is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, FormState::Validating | FormState::Submitting)
    }

    fn accepts_edits(&self) -> bool {
        matches!(self, FormState::Ready | FormState::ReadyWithErrors)
    }
}

/// Existing row opened for editing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingRecord {
    pub row_id: RowId,
    pub record: Record,
}

impl ExistingRecord {
    /// Decodes a persisted row for editing.
    pub fn from_row(row: &Row) -> Self {
        Self {
            row_id: row.id,
            record: codec::decode_row(row),
        }
    }
}

/// Result of a submit attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Record stored; the form is closed
    Submitted(Row),
    /// Validation failed; errors are attached to the fields
    Invalid(ValidationErrors),
    /// Another submit was already in flight
    Ignored,
    /// The form was cancelled while checks were running
    Discarded,
}

struct Session {
    table: TableId,
    schema: TableSchema,
    row_id: Option<RowId>,
    values: Record,
    errors: BTreeMap<String, FieldError>,
    context: RecordContext,
    /// Field name -> URL produced by our own upload
    trusted_images: HashMap<String, String>,
    submit_error: Option<String>,
}

impl Session {
    fn is_trusted(&self, field: &str, url: &str) -> bool {
        self.trusted_images.get(field).is_some_and(|u| u == url)
    }
}

struct Inner {
    state: FormState,
    generation: u64,
    table: Option<TableId>,
    session: Option<Session>,
}

impl Inner {
    fn close(&mut self) {
        self.state = FormState::Closed;
        self.generation += 1;
        self.table = None;
        self.session = None;
    }
}

/// Validates and submits one row at a time.
pub struct FormController {
    source: Arc<dyn DataSource>,
    resolver: LookupResolver,
    media: Arc<MediaValidator>,
    inner: Mutex<Inner>,
}

impl FormController {
    /// Creates a controller with an explicit media validator.
    pub fn new(source: Arc<dyn DataSource>, media: Arc<MediaValidator>) -> Self {
        Self {
            resolver: LookupResolver::new(source.clone()),
            source,
            media,
            inner: Mutex::new(Inner {
                state: FormState::Closed,
                generation: 0,
                table: None,
                session: None,
            }),
        }
    }

    /// Creates a controller that checks images over HTTP.
    pub fn with_config(source: Arc<dyn DataSource>, config: &EngineConfig) -> Self {
        Self::new(source, Arc::new(MediaValidator::http(config)))
    }

    /// Opens the form for a new record (`existing = None`) or an existing one.
    ///
    /// Loads the schema first; the key registry and lookup options then load
    /// concurrently and degrade to empty on failure. Unset fields get their
    /// type's default value.
    ///
    /// # Returns
    /// The state after opening: `Ready`, or `Closed` if the form was
    /// cancelled while loading.
    ///
    /// # Errors
    /// `FormAlreadyOpen` unless the form is closed; `SchemaLoad` when the
    /// table's columns cannot be loaded.
    pub async fn open(&self, table: TableId, existing: Option<ExistingRecord>) -> Result<FormState> {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != FormState::Closed {
                return Err(EngineError::FormAlreadyOpen {
                    table: inner.table.unwrap_or(table),
                });
            }
            inner.generation += 1;
            inner.state = FormState::Opening;
            inner.table = Some(table);
            inner.generation
        };
        tracing::debug!("Opening form for table {}", table);

        let columns = match self.source.fetch_columns(table).await {
            Ok(columns) => columns,
            Err(source) => {
                let mut inner = self.inner.lock();
                if inner.generation == generation {
                    inner.close();
                }
                return Err(EngineError::SchemaLoad { table, source });
            }
        };
        let schema = TableSchema::new(table, columns);

        let (key_registry, lookup_options) = tokio::join!(
            registry::build_registry(self.source.as_ref(), &schema),
            self.resolver.resolve_for_schema(&schema)
        );

        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != FormState::Opening {
            tracing::debug!("Form for table {} closed while opening, discarding", table);
            return Ok(inner.state);
        }

        let original_key = existing.as_ref().and_then(|e| {
            schema
                .primary_column()
                .and_then(|key| e.record.get(&key.name).cloned())
        });
        let context = RecordContext {
            is_new_record: existing.is_none(),
            lookup_options,
            registry: key_registry,
            original_key,
        };

        let mut values = Record::new();
        for column in &schema.columns {
            let current = existing
                .as_ref()
                .and_then(|e| e.record.get(&column.name))
                .filter(|v| !v.is_null())
                .cloned();
            values.insert(
                column.name.clone(),
                current.unwrap_or_else(|| validate::default_value(column)),
            );
        }

        inner.session = Some(Session {
            table,
            schema,
            row_id: existing.map(|e| e.row_id),
            values,
            errors: BTreeMap::new(),
            context,
            trusted_images: HashMap::new(),
            submit_error: None,
        });
        inner.state = FormState::Ready;
        tracing::debug!("Form for table {} ready", table);
        Ok(FormState::Ready)
    }

    /// Sets one field and re-runs only that field's validator.
    ///
    /// Setting the primary key while editing is ignored: the key stays
    /// pinned to its original value.
    ///
    /// # Returns
    /// The field's error after the change, if any.
    pub fn set_field(&self, name: &str, value: Value) -> Result<Option<FieldError>> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        if state == FormState::Closed {
            return Err(EngineError::FormNotOpen);
        }
        if !state.accepts_edits() {
            return Err(EngineError::NotEditable {
                state: state.as_str(),
            });
        }
        let session = inner.session.as_mut().ok_or(EngineError::FormNotOpen)?;
        let column = session
            .schema
            .column(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownField(name.to_string()))?;

        if session.context.is_pinned(&column) {
            tracing::debug!("Ignoring edit of pinned key '{}'", name);
            return Ok(None);
        }

        if column.data_type == DataType::Image {
            let still_trusted = value.as_str().is_some_and(|url| session.is_trusted(name, url));
            if !still_trusted {
                session.trusted_images.remove(name);
            }
        }

        let result = validate::validate_field(&column, &value, &session.context.field(&column));
        session.values.insert(name.to_string(), value);
        let error = match result {
            Ok(_) => {
                session.errors.remove(name);
                None
            }
            Err(e) => {
                session.errors.insert(name.to_string(), e.clone());
                Some(e)
            }
        };
        if session.errors.is_empty() {
            inner.state = FormState::Ready;
        }
        Ok(error)
    }

    /// Uploads an image and stores its URL in an IMAGE field as trusted.
    ///
    /// Trusted URLs skip the reachability check on submit until the field
    /// is set to something else.
    pub async fn upload_image(&self, field: &str, upload: ImageUpload) -> Result<String> {
        let generation = {
            let inner = self.inner.lock();
            match inner.state {
                FormState::Closed => return Err(EngineError::FormNotOpen),
                state if !state.accepts_edits() => {
                    return Err(EngineError::NotEditable {
                        state: state.as_str(),
                    })
                }
                _ => {}
            }
            let session = inner.session.as_ref().ok_or(EngineError::FormNotOpen)?;
            let column = session
                .schema
                .column(field)
                .ok_or_else(|| EngineError::UnknownField(field.to_string()))?;
            if column.data_type != DataType::Image {
                return Err(EngineError::NotAnImageField(field.to_string()));
            }
            inner.generation
        };

        let url = self.source.upload_image(upload).await?;

        let mut inner = self.inner.lock();
        if inner.generation != generation || !inner.state.accepts_edits() {
            tracing::debug!("Form closed during upload, dropping {}", url);
            return Err(EngineError::FormNotOpen);
        }
        let session = inner.session.as_mut().ok_or(EngineError::FormNotOpen)?;
        session
            .values
            .insert(field.to_string(), Value::String(url.clone()));
        session
            .trusted_images
            .insert(field.to_string(), url.clone());
        session.errors.remove(field);
        if session.errors.is_empty() {
            inner.state = FormState::Ready;
        }
        Ok(url)
    }

    /// Validates and submits the record.
    ///
    /// Runs every field validator first; on failure the form moves to
    /// `ReadyWithErrors` without starting any image checks. Then every
    /// untrusted, non-empty IMAGE value is verified. Only when both phases
    /// pass is the coerced record encoded and written.
    ///
    /// # Returns
    /// `Ignored` if a submit is already in flight, `Discarded` if the form
    /// was cancelled while image checks ran.
    ///
    /// # Errors
    /// `FormNotOpen` when nothing is open; `Submit` when the backend rejects
    /// the write (the form stays open with the message attached).
    pub async fn submit(&self) -> Result<SubmitOutcome> {
        let (generation, table, row_id, record, image_checks) = {
            let mut inner = self.inner.lock();
            match inner.state {
                FormState::Closed | FormState::Opening => return Err(EngineError::FormNotOpen),
                FormState::Validating | FormState::Submitting => {
                    tracing::debug!("Submit already in flight, ignoring");
                    return Ok(SubmitOutcome::Ignored);
                }
                FormState::Ready | FormState::ReadyWithErrors => {}
            }
            inner.state = FormState::Validating;
            let generation = inner.generation;
            let session = inner.session.as_mut().ok_or(EngineError::FormNotOpen)?;
            session.submit_error = None;

            match validate::validate_record(&session.schema, &session.values, &session.context) {
                Err(errors) => {
                    session.errors = errors
                        .iter()
                        .map(|e| (e.field().to_string(), e.clone()))
                        .collect();
                    if let Some(first) = errors.first() {
                        tracing::debug!("Validation failed at '{}': {}", first.field(), first);
                    }
                    inner.state = FormState::ReadyWithErrors;
                    return Ok(SubmitOutcome::Invalid(errors));
                }
                Ok(record) => {
                    session.errors.clear();
                    let checks: Vec<(String, String)> = session
                        .schema
                        .columns
                        .iter()
                        .filter(|c| c.data_type == DataType::Image)
                        .filter_map(|c| {
                            let url = record.get(&c.name)?.as_str()?;
                            (!url.is_empty() && !session.is_trusted(&c.name, url))
                                .then(|| (c.name.clone(), url.to_string()))
                        })
                        .collect();
                    (generation, session.table, session.row_id, record, checks)
                }
            }
        };

        if !image_checks.is_empty() {
            let results = join_all(image_checks.into_iter().map(|(field, url)| async move {
                let result = self.media.verify(&url).await;
                (field, url, result)
            }))
            .await;

            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != FormState::Validating {
                tracing::debug!("Form closed during image checks, discarding results");
                return Ok(SubmitOutcome::Discarded);
            }
            let failures: Vec<FieldError> = results
                .into_iter()
                .filter_map(|(field, url, result)| {
                    result.err().map(|e| FieldError::UnreachableResource {
                        field,
                        url,
                        reason: e.to_string(),
                    })
                })
                .collect();
            if !failures.is_empty() {
                let errors = ValidationErrors::from(failures);
                if let Some(session) = inner.session.as_mut() {
                    session.errors = errors
                        .iter()
                        .map(|e| (e.field().to_string(), e.clone()))
                        .collect();
                }
                inner.state = FormState::ReadyWithErrors;
                return Ok(SubmitOutcome::Invalid(errors));
            }
            inner.state = FormState::Submitting;
        } else {
            self.inner.lock().state = FormState::Submitting;
        }

        let encoded = codec::encode(&record);
        let result = match row_id {
            Some(row) => self.source.update_row(row, encoded).await,
            None => self.source.create_row(table, encoded).await,
        };

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return Ok(SubmitOutcome::Discarded);
        }
        match result {
            Ok(row) => {
                tracing::info!("Submitted row {} to table {}", row.id, table);
                inner.close();
                Ok(SubmitOutcome::Submitted(row))
            }
            Err(e) => {
                tracing::warn!("Submit to table {} failed: {}", table, e);
                let message = e.to_string();
                if let Some(session) = inner.session.as_mut() {
                    session.submit_error = Some(message.clone());
                }
                inner.state = FormState::ReadyWithErrors;
                Err(EngineError::Submit(message))
            }
        }
    }

    /// Discards the form without side effects.
    ///
    /// Has no effect once the write is in flight.
    ///
    /// # Returns
    /// `true` if the form was closed by this call.
    pub fn cancel(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            FormState::Closed | FormState::Submitting => false,
            _ => {
                tracing::debug!("Form cancelled in state {}", inner.state.as_str());
                inner.close();
                true
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> FormState {
        self.inner.lock().state
    }

    /// Returns `true` while validation or the write is in flight.
    pub fn is_submitting(&self) -> bool {
        self.inner.lock().state.is_busy()
    }

    /// Table being edited.
    pub fn table(&self) -> Option<TableId> {
        self.inner.lock().table
    }

    /// Schema snapshot taken at open.
    pub fn schema(&self) -> Option<TableSchema> {
        self.inner.lock().session.as_ref().map(|s| s.schema.clone())
    }

    /// Current field values.
    pub fn values(&self) -> Record {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.values.clone())
            .unwrap_or_default()
    }

    /// Current field errors keyed by field name.
    pub fn errors(&self) -> BTreeMap<String, FieldError> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.errors.clone())
            .unwrap_or_default()
    }

    /// Error attached to one field.
    pub fn field_error(&self, name: &str) -> Option<FieldError> {
        self.inner
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.errors.get(name).cloned())
    }

    /// Message of the last backend submit failure.
    pub fn submit_error(&self) -> Option<String> {
        self.inner
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.submit_error.clone())
    }

    /// Options loaded for a LOOKUP field.
    pub fn lookup_options(&self, name: &str) -> Vec<LookupOption> {
        self.inner
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.context.lookup_options.get(name).cloned())
            .unwrap_or_default()
    }

    /// Returns `true` if the field holds a URL from our own upload.
    pub fn is_trusted_image(&self, name: &str) -> bool {
        self.inner.lock().session.as_ref().is_some_and(|s| {
            s.values
                .get(name)
                .and_then(Value::as_str)
                .is_some_and(|url| s.is_trusted(name, url))
        })
    }
}
