use std::time::Instant;

use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace};

use crate::announcer::{LiveRegion, announce_sort_change};
use crate::domain::{HELP_TEXT, Message, TableConfig, UTError};
use crate::inputter::{InputResult, Inputter};
use crate::loader::{LoadResult, PendingLoad, spawn_load};
use crate::record::normalize;
use crate::table::{COLUMNS, Column, SortDirection, TableModel};
use crate::ui::TABLE_CHROME_HEIGHT;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    LOADING,
    READY,
    FAILED,
    QUITTING,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Modus {
    TABLE,
    FILTERINPUT,
    POPUP,
}

pub struct Model {
    config: TableConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    pending: Option<PendingLoad>,
    table: Option<TableModel>,
    selected_row: usize, // Index into the visible rows
    offset_row: usize,
    selected_column: usize,
    table_height: usize,
    input: Inputter,
    last_input: InputResult,
    live_region: LiveRegion,
    status_message: String,
}

impl Model {
    pub fn init(config: &TableConfig, _ui_width: usize, ui_height: usize) -> Self {
        Self {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            pending: None,
            table: None,
            selected_row: 0,
            offset_row: 0,
            selected_column: 0,
            table_height: ui_height.saturating_sub(TABLE_CHROME_HEIGHT),
            input: Inputter::default(),
            last_input: InputResult::default(),
            live_region: LiveRegion::new(config.announcement_duration),
            status_message: "Started utv!".to_string(),
        }
    }

    /// View is ready, issue the one and only fetch of this session.
    pub fn start_loading(&mut self) {
        if self.pending.is_some() || self.table.is_some() {
            debug!("Load already issued, ignoring");
            return;
        }
        self.status = Status::LOADING;
        self.set_status_message(format!("Loading {} ...", self.config.source));
        self.pending = Some(spawn_load(self.config.source.clone()));
    }

    /// Hand the outcome of the fetch to the model. A failure moves the model
    /// to `FAILED` and stays in the status line, the app keeps running.
    pub fn finish_loading(&mut self, result: LoadResult) {
        self.pending = None;
        match result {
            Ok(raw_users) => {
                let start_time = Instant::now();
                let records = raw_users.into_iter().map(normalize).collect();
                let table = TableModel::new(records);
                info!(
                    "Normalized {} users in {}ms",
                    table.len(),
                    start_time.elapsed().as_millis()
                );
                self.set_status_message(format!("Loaded {} users", table.len()));
                self.table = Some(table);
                self.selected_row = 0;
                self.offset_row = 0;
                self.status = Status::READY;
            }
            Err(e) => {
                error!("Could not load users: {e}");
                self.set_status_message(format!("Loading failed: {e}"));
                self.status = Status::FAILED;
            }
        }
    }

    fn poll_loader(&mut self) {
        let result = match &self.pending {
            Some(pending) => pending.poll(),
            None => return,
        };
        if let Some(result) = result {
            self.finish_loading(result);
        }
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::FILTERINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), UTError> {
        self.poll_loader();

        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MovePageDown => self.move_selection_down(self.page_size()),
                    Message::MovePageUp => self.move_selection_up(self.page_size()),
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => self.select_row(usize::MAX),
                    Message::MoveLeft => {
                        self.selected_column = self.selected_column.saturating_sub(1)
                    }
                    Message::MoveRight => {
                        self.selected_column = (self.selected_column + 1).min(COLUMNS.len() - 1)
                    }
                    Message::Sort => self.cycle_sort(),
                    Message::SortAscending => self.sort_selected_column(SortDirection::Ascending),
                    Message::SortDescending => {
                        self.sort_selected_column(SortDirection::Descending)
                    }
                    Message::ClearSort => self.sort_selected_column(SortDirection::None),
                    Message::Filter => self.enter_filter_mode(),
                    Message::ResetBalances => self.reset_balances(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit => self.clear_filter(),
                    Message::RawKey(_) => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Help => self.close_popup(),
                    _ => (),
                },
                Modus::FILTERINPUT => match msg {
                    Message::RawKey(key) => self.handle_filter_key(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized! w:{width}, h:{height}");
        self.table_height = height.saturating_sub(TABLE_CHROME_HEIGHT);
        self.scroll_to_selection();
    }

    fn page_size(&self) -> usize {
        self.table_height.max(1)
    }

    fn selected_column(&self) -> Column {
        COLUMNS[self.selected_column]
    }

    fn cycle_sort(&mut self) {
        let column = self.selected_column();
        if let Some(table) = self.table.as_mut() {
            let state = table.cycle_sort(column);
            announce_sort_change(&state, &mut self.live_region);
            self.select_row(0);
        }
    }

    fn sort_selected_column(&mut self, direction: SortDirection) {
        let column = self.selected_column();
        if let Some(table) = self.table.as_mut() {
            table.set_sort(column, direction);
            let state = table.sort_state();
            announce_sort_change(&state, &mut self.live_region);
            self.select_row(0);
        }
    }

    fn reset_balances(&mut self) {
        if let Some(table) = self.table.as_mut() {
            table.reset_all_balances();
            let message = format!("Reset balance of {} users", table.len());
            self.set_status_message(message);
        }
    }

    fn enter_filter_mode(&mut self) {
        if self.table.is_none() {
            return;
        }
        trace!("Entering filter mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::FILTERINPUT;
        let current = self.last_input.input.clone();
        self.input.start(&current);
        self.last_input = self.input.get();
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        let text = self.last_input.input.clone();
        self.apply_filter(&text);

        if self.last_input.finished {
            self.modus = self.previous_modus;
            self.previous_modus = Modus::FILTERINPUT;
            if self.last_input.canceled {
                self.set_status_message("Filter cleared");
            } else {
                let message = format!("{} matching users", self.visible_len());
                self.set_status_message(message);
            }
        }
    }

    fn clear_filter(&mut self) {
        if !self.last_input.input.is_empty() {
            self.input.clear();
            self.last_input = self.input.get();
            self.apply_filter("");
            self.set_status_message("Filter cleared");
        }
    }

    fn apply_filter(&mut self, text: &str) {
        if let Some(table) = self.table.as_mut() {
            table.set_filter(text);
            self.select_row(0);
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn visible_len(&self) -> usize {
        self.table.as_ref().map_or(0, TableModel::visible_len)
    }

    fn select_row(&mut self, row: usize) {
        self.selected_row = row.min(self.visible_len().saturating_sub(1));
        self.scroll_to_selection();
    }

    fn move_selection_down(&mut self, size: usize) {
        self.select_row(self.selected_row.saturating_add(size));
    }

    fn move_selection_up(&mut self, size: usize) {
        self.select_row(self.selected_row.saturating_sub(size));
    }

    fn scroll_to_selection(&mut self) {
        let height = self.page_size();
        if self.selected_row < self.offset_row {
            self.offset_row = self.selected_row;
        } else if self.selected_row >= self.offset_row + height {
            self.offset_row = self.selected_row + 1 - height;
        }
    }

    // -------------------- Accessors for the UI ---------------------- //

    pub fn table(&self) -> Option<&TableModel> {
        self.table.as_ref()
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn offset_row(&self) -> usize {
        self.offset_row
    }

    pub fn selected_column_idx(&self) -> usize {
        self.selected_column
    }

    pub fn filter_input(&self) -> &InputResult {
        &self.last_input
    }

    pub fn help_text(&self) -> &'static str {
        HELP_TEXT
    }

    /// Announcements take precedence over the regular status message.
    pub fn status_line(&self) -> &str {
        self.live_region
            .current()
            .unwrap_or(self.status_message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{FetchError, Source};
    use crate::record::{RawBalance, RawUser};
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::path::PathBuf;
    use std::time::Duration;

    fn raw(name: &str, age: u32, balance: &str) -> RawUser {
        RawUser {
            name: name.into(),
            age,
            registered: "2020-05-01 12:00:00".into(),
            email: format!("{}@example.com", name.to_lowercase()),
            balance: RawBalance::Text(balance.into()),
        }
    }

    fn loaded_model() -> Model {
        let config = TableConfig::new(Source::File(PathBuf::from("unused.json")))
            .announcement_duration(Duration::from_secs(60));
        let mut model = Model::init(&config, 80, 10);
        model.finish_loading(Ok(vec![
            raw("Joanna", 31, "1,200.00"),
            raw("bob", 44, "3.50"),
            raw("Anne", 27, "10"),
            raw("Dan", 19, "42"),
        ]));
        model
    }

    fn names(model: &Model) -> Vec<String> {
        model
            .table()
            .unwrap()
            .visible_rows()
            .map(|r| r.name.clone())
            .collect()
    }

    fn key(code: KeyCode) -> Option<Message> {
        Some(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    #[test]
    fn load_makes_model_ready() {
        let model = loaded_model();
        assert_eq!(model.status, Status::READY);
        assert_eq!(names(&model), ["Anne", "bob", "Dan", "Joanna"]);
        assert_eq!(model.status_line(), "Loaded 4 users");
    }

    #[test]
    fn failed_load_is_reported() {
        let config = TableConfig::new(Source::File(PathBuf::from("missing.json")));
        let mut model = Model::init(&config, 80, 10);
        model.finish_loading(Err(FetchError::NotFound(PathBuf::from("missing.json"))));
        assert_eq!(model.status, Status::FAILED);
        assert!(model.table().is_none());
        assert!(model.status_line().starts_with("Loading failed"));
    }

    #[test]
    fn failed_background_load_keeps_app_running() {
        let config = TableConfig::new(Source::File(PathBuf::from("/definitely/not/here.json")));
        let mut model = Model::init(&config, 80, 10);
        model.start_loading();
        for _ in 0..400 {
            model.update(None).unwrap();
            if model.status != Status::LOADING {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(model.status, Status::FAILED);
        assert!(model.status_line().starts_with("Loading failed"));

        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.status, Status::FAILED);
        model.update(Some(Message::Quit)).unwrap();
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn sorting_announces_change() {
        let mut model = loaded_model();
        model.update(Some(Message::MoveRight)).unwrap();
        model.update(Some(Message::SortDescending)).unwrap();
        assert_eq!(names(&model), ["bob", "Joanna", "Anne", "Dan"]);
        assert_eq!(model.status_line(), "Sorted descending");

        model.update(Some(Message::ClearSort)).unwrap();
        assert_eq!(names(&model), ["Joanna", "bob", "Anne", "Dan"]);
        assert_eq!(model.status_line(), "Sorting cleared");

        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(names(&model), ["Dan", "Anne", "Joanna", "bob"]);
        assert_eq!(model.status_line(), "Sorted ascending");
    }

    #[test]
    fn filter_is_applied_per_keystroke() {
        let mut model = loaded_model();
        model.update(Some(Message::Filter)).unwrap();
        assert!(model.raw_keyevents());

        model.update(key(KeyCode::Char('A'))).unwrap();
        assert_eq!(names(&model), ["Anne", "Dan", "Joanna"]);
        model.update(key(KeyCode::Char('n'))).unwrap();
        assert_eq!(names(&model), ["Anne", "Dan", "Joanna"]);
        model.update(key(KeyCode::Char('n'))).unwrap();
        assert_eq!(names(&model), ["Anne", "Joanna"]);

        model.update(key(KeyCode::Enter)).unwrap();
        assert!(!model.raw_keyevents());
        assert_eq!(model.filter_input().input, "Ann");
        assert_eq!(model.table().unwrap().filter(), "ann");

        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(names(&model).len(), 4);
    }

    #[test]
    fn escape_cancels_filter() {
        let mut model = loaded_model();
        model.update(Some(Message::Filter)).unwrap();
        model.update(key(KeyCode::Char('b'))).unwrap();
        assert_eq!(names(&model), ["bob"]);
        model.update(key(KeyCode::Esc)).unwrap();
        assert_eq!(names(&model).len(), 4);
        assert_eq!(model.modus(), Modus::TABLE);
    }

    #[test]
    fn reset_balances_from_keyboard() {
        let mut model = loaded_model();
        model.update(Some(Message::ResetBalances)).unwrap();
        let table = model.table().unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.records().iter().all(|r| r.balance == 0.0));
    }

    #[test]
    fn selection_stays_in_bounds() {
        // Height 10 leaves a small page for the table rows
        let mut model = loaded_model();
        model.update(Some(Message::MoveEnd)).unwrap();
        assert_eq!(model.selected_row(), 3);
        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.selected_row(), 3);
        model.update(Some(Message::MovePageUp)).unwrap();
        model.update(Some(Message::MoveUp)).unwrap();
        assert_eq!(model.selected_row(), 0);
        assert_eq!(model.offset_row(), 0);

        for _ in 0..10 {
            model.update(Some(Message::MoveLeft)).unwrap();
        }
        assert_eq!(model.selected_column_idx(), 0);
        for _ in 0..10 {
            model.update(Some(Message::MoveRight)).unwrap();
        }
        assert_eq!(model.selected_column_idx(), COLUMNS.len() - 1);
    }

    #[test]
    fn scrolling_follows_selection() {
        let mut model = loaded_model();
        model.update(Some(Message::Resize(80, TABLE_CHROME_HEIGHT + 2))).unwrap();
        model.update(Some(Message::MoveEnd)).unwrap();
        assert_eq!(model.offset_row(), 2);
        model.update(Some(Message::MoveBeginning)).unwrap();
        assert_eq!(model.offset_row(), 0);
    }

    #[test]
    fn help_popup_swallows_table_keys() {
        let mut model = loaded_model();
        model.update(Some(Message::Help)).unwrap();
        assert_eq!(model.modus(), Modus::POPUP);
        model.update(Some(Message::ResetBalances)).unwrap();
        assert!(model.table().unwrap().records().iter().all(|r| r.balance != 0.0));
        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.modus(), Modus::TABLE);
    }
}
