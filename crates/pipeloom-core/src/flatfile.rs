//! Flat-file uploads
//!
//! Reads CSV, TSV, JSON array and JSON-lines files into a [`Table`]
//! description plus the parsed rows, so an uploaded file can be previewed
//! and dropped onto the pipeline canvas like any database table.

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{Error, Result};
use crate::schema::{Column, Table};

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma separated values with a header row
    Csv,
    /// Tab separated values with a header row
    Tsv,
    /// A JSON array of objects
    Json,
    /// One JSON object per line
    JsonLines,
}

impl FileFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::JsonLines),
            other => Err(Error::FlatFile {
                file: path.display().to_string(),
                message: format!("unsupported file type '.{}'", other),
            }),
        }
    }
}

/// A parsed upload
#[derive(Debug, Clone, PartialEq)]
pub struct FlatFile {
    /// Inferred table description
    pub table: Table,
    /// Parsed rows, one JSON object each
    pub rows: Vec<Value>,
}

impl FlatFile {
    /// Read and parse a file, guessing the format from its extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload");
        tracing::info!(file = %path.display(), ?format, "Importing flat file");
        Self::parse(name, &contents, format)
    }

    /// Parse file contents
    pub fn parse(name: &str, contents: &str, format: FileFormat) -> Result<Self> {
        let (headers, rows) = match format {
            FileFormat::Csv => parse_delimited(contents, b',')?,
            FileFormat::Tsv => parse_delimited(contents, b'\t')?,
            FileFormat::Json => {
                let value: Value = serde_json::from_str(contents)?;
                let Value::Array(items) = value else {
                    return Err(Error::FlatFile {
                        file: name.to_string(),
                        message: "expected a JSON array of objects".to_string(),
                    });
                };
                objects(name, items)?
            }
            FileFormat::JsonLines => {
                let items = contents
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(serde_json::from_str)
                    .collect::<std::result::Result<Vec<Value>, _>>()?;
                objects(name, items)?
            }
        };

        let columns = headers
            .iter()
            .map(|h| Column::new(h.clone(), infer_type(rows.iter().filter_map(|r| r.get(h)))))
            .collect();

        Ok(Self {
            table: Table::new(table_name(name), columns),
            rows,
        })
    }

    /// First `limit` rows
    pub fn preview(&self, limit: usize) -> &[Value] {
        &self.rows[..self.rows.len().min(limit)]
    }
}

fn parse_delimited(contents: &str, delimiter: u8) -> Result<(Vec<String>, Vec<Value>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(contents.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            row.insert(header.clone(), scalar(cell));
        }
        rows.push(Value::Object(row));
    }
    Ok((headers, rows))
}

/// Collect the header set (first-seen order) from a list of objects
fn objects(name: &str, items: Vec<Value>) -> Result<(Vec<String>, Vec<Value>)> {
    let mut headers: Vec<String> = Vec::new();
    for item in &items {
        let Some(obj) = item.as_object() else {
            return Err(Error::FlatFile {
                file: name.to_string(),
                message: "every record must be a JSON object".to_string(),
            });
        };
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    Ok((headers, items))
}

fn scalar(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(n);
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn infer_type<'a>(values: impl Iterator<Item = &'a Value>) -> &'static str {
    let mut kind: Option<&'static str> = None;
    for value in values {
        let this = match value {
            Value::Null => continue,
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "int",
            Value::Number(_) => "decimal",
            Value::String(_) => "text",
            Value::Array(_) | Value::Object(_) => "json",
        };
        kind = Some(match (kind, this) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some("int"), "decimal") | (Some("decimal"), "int") => "decimal",
            _ => "text",
        });
    }
    kind.unwrap_or("text")
}

fn table_name(stem: &str) -> String {
    let name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("orders.csv", FileFormat::Csv)]
    #[case("ORDERS.TSV", FileFormat::Tsv)]
    #[case("data.json", FileFormat::Json)]
    #[case("events.ndjson", FileFormat::JsonLines)]
    fn test_format_from_path(#[case] path: &str, #[case] expected: FileFormat) {
        assert_eq!(FileFormat::from_path(Path::new(path)).unwrap(), expected);
    }

    #[test]
    fn test_xlsx_is_rejected() {
        let err = FileFormat::from_path(Path::new("book.xlsx")).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn test_parse_csv_infers_types() {
        let csv = "id,name,price,active,note\n1,Widget,9.99,true,\n2,Gadget,15,false,fragile\n";
        let file = FlatFile::parse("Q3 Orders", csv, FileFormat::Csv).unwrap();
        assert_eq!(file.table.name, "q3_orders");
        let types: Vec<(&str, &str)> = file
            .table
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.data_type.as_str()))
            .collect();
        assert_eq!(
            types,
            vec![
                ("id", "int"),
                ("name", "text"),
                ("price", "decimal"),
                ("active", "boolean"),
                ("note", "text"),
            ]
        );
        assert_eq!(file.rows.len(), 2);
        assert_eq!(file.rows[0]["note"], Value::Null);
        assert_eq!(file.rows[1]["price"], 15);
    }

    #[test]
    fn test_parse_tsv() {
        let tsv = "a\tb\n1\tx\n";
        let file = FlatFile::parse("t", tsv, FileFormat::Tsv).unwrap();
        assert_eq!(file.table.columns.len(), 2);
        assert_eq!(file.rows[0]["b"], "x");
    }

    #[test]
    fn test_parse_json_array_unions_keys() {
        let json = r#"[{"id": 1, "name": "a"}, {"id": 2, "email": "b@example.com"}]"#;
        let file = FlatFile::parse("people", json, FileFormat::Json).unwrap();
        let names: Vec<&str> = file.table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email"]);
    }

    #[test]
    fn test_parse_json_rejects_non_array() {
        assert!(FlatFile::parse("x", r#"{"id": 1}"#, FileFormat::Json).is_err());
        assert!(FlatFile::parse("x", "[1, 2]", FileFormat::Json).is_err());
    }

    #[test]
    fn test_parse_jsonl_skips_blank_lines() {
        let jsonl = "{\"a\":1}\n\n{\"a\":2.5}\n";
        let file = FlatFile::parse("x", jsonl, FileFormat::JsonLines).unwrap();
        assert_eq!(file.rows.len(), 2);
        assert_eq!(file.table.columns[0].data_type, "decimal");
    }

    #[test]
    fn test_preview_is_bounded() {
        let csv: String = std::iter::once("n\n".to_string())
            .chain((0..100).map(|i| format!("{}\n", i)))
            .collect();
        let file = FlatFile::parse("nums", &csv, FileFormat::Csv).unwrap();
        assert_eq!(file.preview(50).len(), 50);
        assert_eq!(file.preview(500).len(), 100);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        std::fs::write(&path, "id,email\n1,a@example.com\n").unwrap();
        let file = FlatFile::load(&path).unwrap();
        assert_eq!(file.table.name, "customers");
        assert_eq!(file.rows.len(), 1);
    }
}
