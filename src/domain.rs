use std::path::PathBuf;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::record::{UserRecord, ValidationError};
use crate::source::{FetchError, LoadError};
use crate::table::ColumnId;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3001/api/users";
pub const DEFAULT_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum UDError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub fixture: PathBuf,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            fixture: PathBuf::from("data/users.json"),
            allowed_origins: DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ViewerConfig {
    pub endpoint: String,
    pub page_size: usize,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub log_file: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            event_poll_time: 100,
            max_column_width: 32,
            log_file: PathBuf::from("userdir.log"),
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    SortByName,
    SortById,
    Filter,
    ResetFilters,
    ToggleColumn(ColumnId),
    Retry,
    CopyId,
    Details,
    Edit,
    ToggleStatus,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
    Loaded(Result<Vec<UserRecord>, LoadError>),
}

pub const HELP_TEXT: &str = "\
 q          quit
 j / Down   next row          k / Up     previous row
 n / Right  next page         p / Left   previous page
 g          first page        G          last page
 s          sort by name      i          sort by id
 /          filter by name    x          clear filters
 1 2 3 4    toggle name / email / mobile / status column
 y          copy user id      Enter      view details
 e          edit user         t          activate / deactivate
 r          retry / refresh   ?          this help
 Esc        close popup";
