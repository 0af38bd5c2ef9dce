//! Result rendering
//!
//! Renders query rows as JSON, CSV, or an aligned text table. CSV and table
//! output use one column per discovered top-level field; nested values are
//! written as JSON text.

use serde_json::Value;

use crate::config::{OutputConfig, OutputFormat};
use crate::index::columns;

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output was not flushed: {0}")]
    Flush(String),

    #[error("CSV output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Render `rows` in the configured format
pub fn render(rows: &[Value], config: &OutputConfig) -> Result<String, OutputError> {
    match config.format {
        OutputFormat::Json => render_json(rows, config.pretty),
        OutputFormat::Csv => render_csv(rows),
        OutputFormat::Table => Ok(render_table(rows)),
    }
}

pub fn render_json(rows: &[Value], pretty: bool) -> Result<String, OutputError> {
    let text = if pretty {
        serde_json::to_string_pretty(rows)?
    } else {
        serde_json::to_string(rows)?
    };
    Ok(text + "\n")
}

/// Header and cell text for every row. Non-object rows get a single
/// `value` column.
fn tabulate(rows: &[Value]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut headers = columns(rows);
    if headers.is_empty() || rows.iter().any(|r| !r.is_object()) {
        headers.insert(0, "value".to_string());
    }

    let cells = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| match row {
                    Value::Object(map) => map.get(h).map(cell_text).unwrap_or_default(),
                    other if h == "value" => cell_text(other),
                    _ => String::new(),
                })
                .collect()
        })
        .collect();

    (headers, cells)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_csv(rows: &[Value]) -> Result<String, OutputError> {
    let (headers, cells) = tabulate(rows);
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(&headers)?;
    for row in cells {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| OutputError::Flush(e.error().to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn render_table(rows: &[Value]) -> String {
    let (headers, cells) = tabulate(rows);
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&headers));
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&format!("({} rows)\n", cells.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_csv_nested_values_as_json() {
        let rows = vec![json!({"a": 1, "b": {"c": 2}}), json!({"a": "x,y"})];
        let text = render_csv(&rows).unwrap();
        assert_eq!(text, "a,b\n1,\"{\"\"c\"\":2}\"\n\"x,y\",\n");
    }

    #[test]
    fn test_scalar_rows_use_value_column() {
        let rows = vec![json!(1), json!("two")];
        assert_eq!(render_csv(&rows).unwrap(), "value\n1\ntwo\n");
    }

    #[test]
    fn test_table_alignment() {
        let rows = vec![json!({"name": "alpha", "n": 1}), json!({"name": "b", "n": 22})];
        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "n   name");
        assert_eq!(lines[1], "---------");
        assert_eq!(lines[2], "1   alpha");
        assert_eq!(lines[3], "22  b");
        assert_eq!(lines[4], "(2 rows)");
    }

    #[test]
    fn test_render_json_compact() {
        let config = OutputConfig {
            format: OutputFormat::Json,
            pretty: false,
        };
        assert_eq!(render(&[json!({"a": 1})], &config).unwrap(), "[{\"a\":1}]\n");
    }
}
