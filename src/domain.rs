use std::io::Error;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::loader::Source;

pub const HELP_TEXT: &str = "\
 utv - user table viewer

 Navigation
   j / Down         move down
   k / Up           move up
   h / Left         select previous column
   l / Right        select next column
   PgUp / PgDown    move one page
   g / G            first / last row

 Table
   s                cycle sort on selected column
   a / d            sort ascending / descending
   c                clear sorting
   / or f           edit filter (Enter keeps, Esc clears)
   r                reset all balances to 0

 Other
   ?                this help
   Esc              close popup
   q                quit
";

#[derive(Debug, Error)]
pub enum UTError {
    #[error("terminal io failed: {0}")]
    IoError(#[from] Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Setters)]
pub struct TableConfig {
    pub event_poll_time: u64,
    #[setters(skip)]
    pub source: Source,
    /// How long an announcement stays in the status line.
    pub announcement_duration: Duration,
}

impl TableConfig {
    pub fn new(source: Source) -> Self {
        Self {
            event_poll_time: 100,
            source,
            announcement_duration: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveLeft,
    MoveRight,
    Sort,
    SortAscending,
    SortDescending,
    ClearSort,
    Filter,
    ResetBalances,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
