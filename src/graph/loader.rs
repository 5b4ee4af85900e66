//! Reading module records from disk
//!
//! Two layouts are accepted: a JSON array of records, or newline-delimited
//! JSON with one record per line.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use super::ModuleRecord;

/// Load module records from a file, preserving file order
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<ModuleRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read module records: {}", path.display()))?;

    let records = parse_records(&content)
        .with_context(|| format!("Failed to parse module records: {}", path.display()))?;

    debug!("Loaded {} module records from {}", records.len(), path.display());

    Ok(records)
}

/// Parse module records from a JSON array or NDJSON text
pub fn parse_records(content: &str) -> Result<Vec<ModuleRecord>> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content).context("Invalid JSON array of module records");
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid module record on line {}", index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_json_array() {
        let records = parse_records(r#"[{ "id": 1, "entry": true, "deps": { "./2": 2 } }, { "id": 2 }]"#)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].entry);
        assert_eq!(records[1].id.as_str(), "2");
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let records = parse_records("{\"id\":\"a\"}\n\n{\"id\":\"b\"}\n").unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let err = parse_records("{\"id\":\"a\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id":"main","entry":true,"source":"run()"}}"#).unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size(), 5);
    }
}
