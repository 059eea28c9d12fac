//! Decoding of fetched objects into records.

use serde_json::{Map, Value};

use stowage_core::{Error, Result};

/// One decoded row, field name to value.
pub type Record = Map<String, Value>;

/// Object formats the extractor understands, chosen by key extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Csv,
}

impl PayloadFormat {
    /// Detect the format from the key's extension, ignoring case.
    pub fn from_key(key: &str) -> Option<Self> {
        let (_, ext) = key.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Decode an object body into records.
///
/// JSON bodies must be an array of objects or a single object. CSV bodies
/// must start with a header row; every value is kept as text and empty cells
/// become `null`, leaving type conversion to the landing table's columns.
pub fn decode(format: PayloadFormat, body: &[u8]) -> Result<Vec<Record>> {
    match format {
        PayloadFormat::Json => decode_json(body),
        PayloadFormat::Csv => decode_csv(body),
    }
}

fn decode_json(body: &[u8]) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::Payload(format!("invalid JSON: {}", e)))?;

    match value {
        Value::Object(record) => Ok(vec![record]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(Error::Payload(format!(
                    "element {} is {}, expected an object",
                    idx,
                    kind_of(&other)
                ))),
            })
            .collect(),
        other => Err(Error::Payload(format!(
            "top-level JSON is {}, expected an array or object",
            kind_of(&other)
        ))),
    }
}

fn decode_csv(body: &[u8]) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|e| Error::Payload(format!("invalid CSV header: {}", e)))?
        .clone();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| Error::Payload(format!("invalid CSV row {}: {}", line + 1, e)))?;
        let record = headers
            .iter()
            .zip(row.iter())
            .map(|(field, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (field.to_string(), value)
            })
            .collect();
        records.push(record);
    }
    Ok(records)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
