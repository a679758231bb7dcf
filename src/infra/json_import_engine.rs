use crate::app::ports::{ErrorReport, ImportEngine, RowError};
use crate::constants;
use crate::error::{ImportError, Result};
use crate::types::Row;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Import engine that persists the rows as a JSON file for a downstream loader.
///
/// Rows without an `sku` are reported back as row errors and left out of the file.
pub struct JsonFileImportEngine {
    output_dir: PathBuf,
    profile: String,
    last_output: Mutex<Option<PathBuf>>,
}

impl JsonFileImportEngine {
    pub fn new(output_dir: impl Into<PathBuf>, profile: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            profile: profile.to_string(),
            last_output: Mutex::new(None),
        }
    }

    /// Path of the file written by the most recent import.
    pub fn last_output(&self) -> Option<PathBuf> {
        self.last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn persist(&self, rows: &[Row]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{timestamp}.json", self.profile);
        let filepath = Path::new(&self.output_dir).join(filename);

        let json_content = serde_json::to_string_pretty(rows)?;
        fs::write(&filepath, json_content)?;

        Ok(filepath)
    }
}

impl ImportEngine for JsonFileImportEngine {
    fn import(&self, rows: Vec<Row>) -> Result<ErrorReport> {
        let mut report = ErrorReport::clean(rows.len());
        let mut accepted = Vec::with_capacity(rows.len());

        for (index, row) in rows.into_iter().enumerate() {
            match row.get(constants::SKU) {
                Some(sku) if !sku.is_empty() => accepted.push(row),
                _ => report.errors.push(RowError {
                    row: Some(index + 1),
                    message: "Row is missing the sku column".to_string(),
                }),
            }
        }

        let path = self.persist(&accepted).map_err(|e| ImportError::Engine {
            message: format!("cannot write {} rows to {}: {}", accepted.len(), self.output_dir.display(), e),
        })?;
        info!("💾 Saved {} rows to {}", accepted.len(), path.display());
        *self
            .last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(path);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rows_without_sku_are_reported() {
        let dir = tempdir().unwrap();
        let engine = JsonFileImportEngine::new(dir.path(), "feed");

        let good: Row = [("sku".to_string(), "A".to_string())].into_iter().collect();
        let bad: Row = [("name".to_string(), "No sku".to_string())].into_iter().collect();
        let report = engine.import(vec![good, bad]).unwrap();

        assert_eq!(report.rows_received, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, Some(2));

        let written = fs::read_to_string(engine.last_output().unwrap()).unwrap();
        let rows: Vec<Row> = serde_json::from_str(&written).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_unwritable_output_is_an_engine_error() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("not-a-dir");
        fs::write(&blocked, "file in the way").unwrap();
        let engine = JsonFileImportEngine::new(&blocked, "feed");

        let row: Row = [("sku".to_string(), "A".to_string())].into_iter().collect();
        let err = engine.import(vec![row]).unwrap_err();

        assert!(matches!(err, ImportError::Engine { .. }));
        assert!(engine.last_output().is_none());
    }
}
