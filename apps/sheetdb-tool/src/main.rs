//! CLI tool for inspecting tables and submitting records.
//!
//! Loads a JSON fixture into an in-memory data source and runs one command
//! against it:
//! - Column and row inspection
//! - Lookup option resolution
//! - Column creation checks
//! - Record submission through the form controller
//!
//! Results are printed as JSON on stdout; logs go to stderr (`RUST_LOG`).

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::Parser;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use sheetdb_core::config::EngineConfig;
use sheetdb_core::schema::ColumnSpec;
use sheetdb_runtime::{
    DataSource, ExistingRecord, Fixture, FormController, ImageProbe, InMemoryDataSource,
    LookupResolver, MediaValidator, SubmitOutcome, TableService, Url,
};

use cli::{Cli, Commands};

/// Probe that accepts every URL.
struct AcceptAll;

#[async_trait]
impl ImageProbe for AcceptAll {
    async fn probe(&self, _url: &Url) -> Result<(), String> {
        Ok(())
    }
}

fn load_fixture(path: &Path) -> anyhow::Result<Fixture> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid fixture {}", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    EngineConfig::from_json(&text).with_context(|| format!("Invalid config {}", path.display()))
}

/// Splits `name=value`, parsing the value as JSON and falling back to text.
fn parse_assignment(raw: &str) -> anyhow::Result<(String, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Expected name=value, got '{}'", raw);
    };
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}

fn print(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn submit(
    source: Arc<InMemoryDataSource>,
    config: &EngineConfig,
    table: u64,
    row: Option<u64>,
    fields: &[String],
    skip_image_check: bool,
) -> anyhow::Result<Value> {
    let media = if skip_image_check {
        MediaValidator::new(Arc::new(AcceptAll), config)
    } else {
        MediaValidator::http(config)
    };
    let form = FormController::new(source.clone(), Arc::new(media));

    let existing = match row {
        Some(id) => {
            let rows = source.fetch_rows(table).await?;
            let row = rows
                .iter()
                .find(|r| r.id == id)
                .with_context(|| format!("Row {} not found in table {}", id, table))?;
            Some(ExistingRecord::from_row(row))
        }
        None => None,
    };

    form.open(table, existing).await?;
    for raw in fields {
        let (name, value) = parse_assignment(raw)?;
        if let Some(error) = form.set_field(&name, value)? {
            tracing::debug!("Field '{}' invalid: {}", name, error);
        }
    }

    let result = match form.submit().await? {
        SubmitOutcome::Submitted(row) => {
            let record = sheetdb_core::codec::decode_row(&row);
            json!({ "status": "submitted", "row": row, "record": record })
        }
        SubmitOutcome::Invalid(errors) => json!({
            "status": "invalid",
            "errors": errors,
        }),
        SubmitOutcome::Ignored | SubmitOutcome::Discarded => json!({ "status": "discarded" }),
    };
    Ok(result)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let fixture = load_fixture(&cli.fixture)?;
    let config = load_config(cli.config.as_deref())?;
    let source = Arc::new(InMemoryDataSource::from_fixture(&fixture)?);
    tracing::debug!("Loaded {} tables from fixture", source.tables().len());
    let tables = TableService::new(source.clone(), config.clone());

    match cli.command {
        Commands::Columns { table } => {
            let schema = tables.load_schema(table).await?;
            print(&schema.columns)
        }
        Commands::Rows { table } => {
            let grid = tables.load_grid(table).await?;
            print(&grid.rows)
        }
        Commands::Lookup { table, display } => {
            let options = LookupResolver::new(source).resolve(table, display).await;
            print(&options)
        }
        Commands::AddColumn { table, spec } => {
            let spec: ColumnSpec = serde_json::from_str(&spec).context("Invalid column spec")?;
            let column = tables.create_column(table, spec).await?;
            print(&column)
        }
        Commands::Submit {
            table,
            row,
            fields,
            skip_image_check,
        } => {
            let result = submit(source, &config, table, row, &fields, skip_image_check).await?;
            print(&result)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = r#"{
        "tables": [
            {
                "id": 1,
                "name": "products",
                "columns": [
                    {"name": "Id", "dataType": "INTEGER", "isPrimary": true, "isAutoGenerated": true},
                    {"name": "Name", "dataType": "TEXT", "isNullable": false},
                    {"name": "Price", "dataType": "REAL"}
                ],
                "rows": [{"Name": "Widget", "Price": 2.5}]
            }
        ]
    }"#;

    fn fixture_source() -> Arc<InMemoryDataSource> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        let fixture = load_fixture(file.path()).unwrap();
        Arc::new(InMemoryDataSource::from_fixture(&fixture).unwrap())
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("Price=2.5").unwrap(),
            ("Price".to_string(), json!(2.5))
        );
        assert_eq!(
            parse_assignment("Name=Widget=2").unwrap(),
            ("Name".to_string(), json!("Widget=2"))
        );
        assert!(parse_assignment("Name").is_err());
    }

    #[tokio::test]
    async fn test_sample_fixture_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/workspace.json");
        let fixture = load_fixture(&path).unwrap();
        let source = InMemoryDataSource::from_fixture(&fixture).unwrap();
        let products = source.records(2);
        assert_eq!(products[0]["Id"], 1);
        assert_eq!(products[0]["Total"], 5);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[tokio::test]
    async fn test_submit_new_and_invalid() {
        let source = fixture_source();
        let config = EngineConfig::default();

        let result = submit(
            source.clone(),
            &config,
            1,
            None,
            &["Name=Gadget".to_string(), "Price=4".to_string()],
            true,
        )
        .await
        .unwrap();
        assert_eq!(result["status"], "submitted");
        assert_eq!(result["record"]["Id"], 2);

        let result = submit(source.clone(), &config, 1, None, &[], true)
            .await
            .unwrap();
        assert_eq!(result["status"], "invalid");
        assert_eq!(result["errors"]["errors"][0]["kind"], "required");
        assert_eq!(source.records(1).len(), 2);
    }
}
