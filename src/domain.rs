use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;

pub const HELP_TEXT: &str = "dv - CSV visualizer

  o            open a CSV file
  /            search the table (live, Esc clears)
  s            sort by selected column (asc / desc)
  i            generate insights for the loaded data
  c / C        copy cell / row to the clipboard
  h j k l      move (arrow keys work too)
  PgUp / PgDn  move a page
  g / G        first / last row
  0 / $        first / last column
  ?            show this help
  Esc          close popup
  q            quit";

pub const DEFAULT_INSIGHTS_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_INSIGHTS_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug)]
pub enum DVError {
    IoError(Error),
    FileReadError(Error),
    ParseError(String),
    InsightServiceError(String),
    ConfigError(String),
    FileNotFound,
    PermissionDenied,
    InvalidFileType,
}

impl fmt::Display for DVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DVError::IoError(e) => write!(f, "IO error: {e}"),
            DVError::FileReadError(e) => write!(f, "Could not read the file: {e}"),
            DVError::ParseError(msg) => write!(
                f,
                "Could not parse the CSV file. Please check its format. ({msg})"
            ),
            DVError::InsightServiceError(msg) => {
                write!(f, "Failed to generate insights. {msg}")
            }
            DVError::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            DVError::FileNotFound => write!(f, "File not found"),
            DVError::PermissionDenied => write!(f, "Permission denied"),
            DVError::InvalidFileType => write!(f, "Invalid file type. Please open a .csv file."),
        }
    }
}

impl std::error::Error for DVError {}

impl From<Error> for DVError {
    fn from(err: Error) -> Self {
        DVError::IoError(err)
    }
}

impl From<reqwest::Error> for DVError {
    fn from(err: reqwest::Error) -> Self {
        DVError::InsightServiceError(format!("Request failed: {err}"))
    }
}

impl From<serde_json::Error> for DVError {
    fn from(err: serde_json::Error) -> Self {
        DVError::InsightServiceError(format!("Invalid response format: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    OpenFile,
    Search,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveToFirstColumn,
    MoveToLastColumn,
    Resize(usize, usize),
    OpenFile,
    Search,
    Sort,
    GenerateInsights,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    RawKey(ratatui::crossterm::event::KeyEvent),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct DVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub insights_endpoint: String,
    pub insights_model: String,
    pub insights_timeout_secs: u64,
    #[setters(strip_option)]
    pub api_key: Option<String>,
    pub log_file: PathBuf,
}

impl Default for DVConfig {
    fn default() -> Self {
        DVConfig {
            event_poll_time: 100,
            max_column_width: 30,
            insights_endpoint: DEFAULT_INSIGHTS_ENDPOINT.to_string(),
            insights_model: DEFAULT_INSIGHTS_MODEL.to_string(),
            insights_timeout_secs: 120,
            api_key: None,
            log_file: std::env::temp_dir().join("dv.log"),
        }
    }
}
