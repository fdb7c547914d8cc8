use std::time::{Duration, Instant};

use tracing::info;

use crate::table::{SortDirection, SortState};

/// Side channel describing state changes in text, for screen readers.
pub trait Announcer {
    fn announce(&mut self, message: &str);
}

pub fn sort_change_message(state: &SortState) -> String {
    match state.direction {
        SortDirection::Ascending | SortDirection::Descending => {
            format!("Sorted {}ending", state.direction.as_str())
        }
        SortDirection::None => "Sorting cleared".to_string(),
    }
}

pub fn announce_sort_change(state: &SortState, announcer: &mut impl Announcer) {
    announcer.announce(&sort_change_message(state));
}

/// Keeps the latest announcement for the status line.
#[derive(Debug)]
pub struct LiveRegion {
    message: Option<(String, Instant)>,
    duration: Duration,
}

impl LiveRegion {
    pub fn new(duration: Duration) -> Self {
        Self {
            message: None,
            duration,
        }
    }

    /// The announcement, as long as it is recent enough to show.
    pub fn current(&self) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|(_, at)| at.elapsed() < self.duration)
            .map(|(message, _)| message.as_str())
    }
}

impl Announcer for LiveRegion {
    fn announce(&mut self, message: &str) {
        info!(target: "utv::a11y", "{message}");
        self.message = Some((message.to_string(), Instant::now()));
    }
}
