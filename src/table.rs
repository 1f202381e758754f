use std::path::PathBuf;
use std::sync::Arc;

use crate::csv::{ParsedCsv, Row};

/// Headers and rows of the currently loaded file. Rows are shared behind an
/// `Arc` so background jobs can read them while the session keeps going.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    path: PathBuf,
    headers: Arc<Vec<String>>,
    rows: Arc<Vec<Row>>,
}

impl RowStore {
    pub fn new(path: PathBuf, parsed: ParsedCsv) -> Self {
        Self {
            path,
            headers: Arc::new(parsed.headers),
            rows: Arc::new(parsed.rows),
        }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }

    pub fn headers(&self) -> &Arc<Vec<String>> {
        &self.headers
    }

    pub fn rows(&self) -> &Arc<Vec<Row>> {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ncols(&self) -> usize {
        self.headers.len()
    }
}
