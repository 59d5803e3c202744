use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::table::{FileEntry, FileTable};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_EVENT_POLL_MS: u64 = 100;

pub const HELP_TEXT: &str = "rtv - remote table viewer
 Enter      open selected file
 Esc        back to file listing
 j/k        move row selection
 h/l        move column selection
 n/p        next/previous page
 f          edit filter for selected column
 r          refresh current page
 u          select a file for upload
 U          confirm pending upload
 y          yank selected cell
 q          quit";

// Custom error type used across the crate.
#[derive(Debug)]
pub enum RtvError {
    IoError(Error),
    HttpError(reqwest::Error),
    DecodeError(serde_json::Error),
    NoData(String),
    ClientBuild(String),
}

impl std::fmt::Display for RtvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RtvError::IoError(e) => write!(f, "io error: {e}"),
            RtvError::HttpError(e) => write!(f, "request failed: {e}"),
            RtvError::DecodeError(e) => write!(f, "malformed response: {e}"),
            RtvError::NoData(msg) => write!(f, "no data: {msg}"),
            RtvError::ClientBuild(msg) => write!(f, "client setup failed: {msg}"),
        }
    }
}

impl From<Error> for RtvError {
    fn from(err: Error) -> Self {
        RtvError::IoError(err)
    }
}

impl From<reqwest::Error> for RtvError {
    fn from(err: reqwest::Error) -> Self {
        RtvError::HttpError(err)
    }
}

impl From<serde_json::Error> for RtvError {
    fn from(err: serde_json::Error) -> Self {
        RtvError::DecodeError(err)
    }
}

/// Runtime configuration, assembled from the CLI in main.
#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct RtvConfig {
    pub base_url: String,
    pub token: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub event_poll_time: u64,
}

impl Default for RtvConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            token: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            event_poll_time: DEFAULT_EVENT_POLL_MS,
        }
    }
}

/// Everything the model reacts to: key-driven intents from the
/// controller and completions posted back by network tasks.
#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    EditFilter,
    Refresh,
    Upload,
    ConfirmUpload,
    CopyCell,
    Help,
    Enter,
    Exit,
    RawKey(KeyEvent),
    FilesFetched(Result<Vec<FileEntry>, RtvError>),
    TableFetched {
        seq: u64,
        result: Result<FileTable, RtvError>,
    },
    UploadFinished(Result<FileEntry, RtvError>),
}
