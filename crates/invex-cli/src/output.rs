//! Result sinks writing accepted extraction results to CSV, JSON or XML.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use tracing::debug;

use invex_core::FieldValue;
use invex_core::controller::ExtractionResult;
use invex_core::models::config::OutputFormat;

/// Persists extraction results in one serialization format.
pub trait ResultSink {
    /// File extension, without the dot.
    fn extension(&self) -> &'static str;

    fn write_to(
        &self,
        results: &[ExtractionResult],
        date_format: &str,
        path: &Path,
    ) -> anyhow::Result<()>;

    /// Write `results` to `<name>.<extension>` and return that path.
    fn write(
        &self,
        results: &[ExtractionResult],
        name: &str,
        date_format: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = PathBuf::from(format!("{}.{}", name, self.extension()));
        self.write_to(results, date_format, &path)?;
        debug!("Wrote {} results to {}", results.len(), path.display());
        Ok(path)
    }
}

/// Sink for a configured format; `none` has no sink.
pub fn sink_for(format: OutputFormat) -> Option<Box<dyn ResultSink>> {
    match format {
        OutputFormat::None => None,
        OutputFormat::Csv => Some(Box::new(CsvSink)),
        OutputFormat::Json => Some(Box::new(JsonSink)),
        OutputFormat::Xml => Some(Box::new(XmlSink)),
    }
}

/// Field names across all results, in first-seen order.
fn columns(results: &[ExtractionResult]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for result in results {
        for name in result.fields.keys() {
            if !columns.contains(&name.as_str()) {
                columns.push(name);
            }
        }
    }
    columns
}

pub struct JsonSink;

impl JsonSink {
    fn to_value(value: &FieldValue, date_format: &str) -> Value {
        match value {
            FieldValue::Amount(amount) => amount
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(amount.to_string())),
            other => Value::String(other.render(date_format)),
        }
    }
}

impl ResultSink for JsonSink {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn write_to(
        &self,
        results: &[ExtractionResult],
        date_format: &str,
        path: &Path,
    ) -> anyhow::Result<()> {
        let records: Vec<Value> = results
            .iter()
            .map(|result| {
                let record: Map<String, Value> = result
                    .fields
                    .iter()
                    .map(|(name, value)| (name.clone(), Self::to_value(value, date_format)))
                    .collect();
                Value::Object(record)
            })
            .collect();

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &records)?;
        writer.flush()?;
        Ok(())
    }
}

pub struct CsvSink;

impl ResultSink for CsvSink {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn write_to(
        &self,
        results: &[ExtractionResult],
        date_format: &str,
        path: &Path,
    ) -> anyhow::Result<()> {
        let columns = columns(results);
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&columns)?;

        for result in results {
            let row: Vec<String> = columns
                .iter()
                .map(|column| {
                    result
                        .fields
                        .get(*column)
                        .map(|v| v.render(date_format))
                        .unwrap_or_default()
                })
                .collect();
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

pub struct XmlSink;

impl ResultSink for XmlSink {
    fn extension(&self) -> &'static str {
        "xml"
    }

    fn write_to(
        &self,
        results: &[ExtractionResult],
        date_format: &str,
        path: &Path,
    ) -> anyhow::Result<()> {
        let mut writer = Writer::new_with_indent(BufWriter::new(File::create(path)?), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("invoices")))?;

        for result in results {
            writer.write_event(Event::Start(BytesStart::new("invoice")))?;
            for (name, value) in &result.fields {
                let mut field = BytesStart::new("field");
                field.push_attribute(("name", name.as_str()));
                writer.write_event(Event::Start(field))?;
                writer.write_event(Event::Text(BytesText::new(&value.render(date_format))))?;
                writer.write_event(Event::End(BytesEnd::new("field")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("invoice")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("invoices")))?;
        writer.into_inner().flush()?;
        Ok(())
    }
}
