//! CSV export of table contents and query results

use crate::error::AppError;
use crate::rows::RowSet;
use chrono::Local;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Header row, then one line per row. NULL is written as an empty field.
    pub fn render(data: &RowSet) -> String {
        let mut output = String::new();
        push_record(&mut output, data.columns.iter().map(|c| Some(c.as_str())));
        for row in &data.rows {
            push_record(&mut output, row.iter().map(|v| v.as_deref()));
        }
        output
    }

    /// Write `data` to `<dir>/<name>_<timestamp>.csv`.
    pub fn export(&self, name: &str, data: &RowSet) -> Result<PathBuf, AppError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!(
            "{}_{}.csv",
            safe_file_name(name),
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        fs::write(&path, Self::render(data))?;

        info!("Exported {} rows to {}", data.rows.len(), path.display());
        Ok(path)
    }
}

fn push_record<'a>(output: &mut String, fields: impl Iterator<Item = Option<&'a str>>) {
    let line: Vec<Cow<'a, str>> = fields.map(|f| csv_field(f.unwrap_or(""))).collect();
    output.push_str(&line.join(","));
    output.push_str("\r\n");
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn products() -> RowSet {
        RowSet {
            columns: vec!["id".into(), "name".into(), "price".into()],
            rows: vec![
                vec![Some("1".into()), Some("Milk, 1l".into()), Some("2.5".into())],
                vec![Some("2".into()), Some("\"Borodinsky\" bread".into()), None],
            ],
        }
    }

    #[test]
    fn test_render_quotes_and_nulls() {
        assert_eq!(
            CsvExporter::render(&products()),
            "id,name,price\r\n\
             1,\"Milk, 1l\",2.5\r\n\
             2,\"\"\"Borodinsky\"\" bread\",\r\n"
        );
    }

    #[test]
    fn test_multiline_value_is_quoted() {
        assert_eq!(csv_field("line one\nline two"), "\"line one\nline two\"");
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field(""), "");
    }

    #[test]
    fn test_empty_result_has_header_only() {
        let data = RowSet {
            columns: vec!["avg".into()],
            rows: vec![],
        };
        assert_eq!(CsvExporter::render(&data), "avg\r\n");
    }

    #[test]
    fn test_export_writes_file() {
        let tmp = TempDir::new().unwrap();
        let exporter = CsvExporter::new(tmp.path().join("exports"));

        let path = exporter.export("Товар", &products()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Товар_") && name.ends_with(".csv"));
        assert_eq!(fs::read_to_string(&path).unwrap(), CsvExporter::render(&products()));
    }

    #[test]
    fn test_unsafe_names_are_cleaned() {
        assert_eq!(safe_file_name("../etc/passwd"), "___etc_passwd");
        assert_eq!(safe_file_name("Custom query 1"), "Custom_query_1");
        assert_eq!(safe_file_name(""), "export");
    }
}
