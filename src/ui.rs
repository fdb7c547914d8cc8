use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::domain::TableConfig;
use crate::format::format_cell;
use crate::inputter::InputResult;
use crate::model::{Modus, Model, Status};
use crate::table::{Column, SortDirection, SortState};

pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER_HEIGHT: usize = 2;
pub const CMDLINE_HEIGH: usize = 2; // Filter line and status line
/// Rows taken by everything but the table body.
pub const TABLE_CHROME_HEIGHT: usize = TABLE_HEADER_HEIGHT + TABLE_BORDER_HEIGHT + CMDLINE_HEIGH;

const COLUMN_WIDTHS: [Constraint; 5] = [
    Constraint::Fill(2),
    Constraint::Length(5),
    Constraint::Length(23),
    Constraint::Fill(3),
    Constraint::Length(14),
];

#[derive(Debug)]
pub struct TableUI {
    title: String,
}

impl TableUI {
    pub fn new(config: &TableConfig) -> Self {
        Self {
            title: format!(" {} ", config.source),
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let [table_area, filter_area, status_area] = Layout::vertical([
            Constraint::Min((TABLE_HEADER_HEIGHT + TABLE_BORDER_HEIGHT) as u16),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.render_table(model, frame, table_area);
        Self::render_filter(model, frame, filter_area);
        Self::render_status(model, frame, status_area);

        if model.modus() == Modus::POPUP {
            Self::render_popup(model.help_text(), frame);
        }
    }

    fn render_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let instructions = Line::from(vec![
            " Sort ".into(),
            "<S>".blue().bold(),
            " Filter ".into(),
            "</>".blue().bold(),
            " Reset balances ".into(),
            "<R>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<Q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(Line::from(self.title.as_str().bold()).centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);

        let Some(table) = model.table() else {
            let text = match model.status {
                Status::FAILED => model.status_line().red(),
                _ => "Loading ...".yellow(),
            };
            frame.render_widget(
                Paragraph::new(Line::from(text))
                    .centered()
                    .wrap(Wrap { trim: true })
                    .block(block),
                area,
            );
            return;
        };

        let height = (area.height as usize).saturating_sub(TABLE_HEADER_HEIGHT + TABLE_BORDER_HEIGHT);
        let sort = table.sort_state();
        if table.is_empty() {
            frame.render_widget(Paragraph::new("No users").centered().block(block), area);
            return;
        }

        let columns = table.columns();
        let header = Row::new(
            columns
                .iter()
                .map(|&column| Cell::from(Self::header_label(column, &sort)).bold()),
        )
        .underlined();

        let rows = table
            .visible_rows()
            .skip(model.offset_row())
            .take(height)
            .map(|record| {
                Row::new(columns.iter().map(|&column| {
                    let text = format_cell(record, column);
                    match column {
                        Column::Age | Column::Balance => Cell::from(Line::from(text).right_aligned()),
                        _ => Cell::from(text),
                    }
                }))
            });

        let widget = Table::new(rows, COLUMN_WIDTHS)
            .header(header)
            .block(block)
            .row_highlight_style(Style::new().reversed())
            .column_highlight_style(Style::new().yellow())
            .cell_highlight_style(Style::new().bold());

        let mut state = TableState::default()
            .with_selected(Some(model.selected_row() - model.offset_row()))
            .with_selected_column(Some(model.selected_column_idx()));
        frame.render_stateful_widget(widget, area, &mut state);
    }

    fn header_label(column: Column, sort: &SortState) -> String {
        let marker = match (sort.active_column(), sort.direction) {
            (Some(sorted), SortDirection::Ascending) if sorted == column => " ▲",
            (Some(sorted), SortDirection::Descending) if sorted == column => " ▼",
            _ => "",
        };
        format!("{column}{marker}")
    }

    fn render_filter(model: &Model, frame: &mut Frame, area: Rect) {
        let prefix = "Filter: ";
        let input = model.filter_input();
        let editing = model.modus() == Modus::FILTERINPUT;

        let line = Line::from(vec![
            Span::from(prefix).bold(),
            if editing {
                Span::from(input.input.as_str()).yellow()
            } else {
                Span::from(input.input.as_str())
            },
        ]);
        frame.render_widget(Paragraph::new(line), area);

        if editing {
            let x = area.x.saturating_add(Self::cursor_column(prefix, input));
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        }
    }

    /// Terminal columns in front of the cursor. Wide glyphs take two cells.
    fn cursor_column(prefix: &str, input: &InputResult) -> u16 {
        let before: String = input.input.chars().take(input.cursor_pos).collect();
        (prefix.width() + before.width()).try_into().unwrap_or(u16::MAX)
    }

    fn render_status(model: &Model, frame: &mut Frame, area: Rect) {
        let counts = model
            .table()
            .map(|t| format!("{}/{} users ", t.visible_len(), t.records().len()))
            .unwrap_or_default();
        let [message_area, count_area] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Length(counts.len() as u16)])
                .areas(area);

        frame.render_widget(Paragraph::new(model.status_line()).italic(), message_area);
        frame.render_widget(Paragraph::new(counts).right_aligned(), count_area);
    }

    fn render_popup(text: &str, frame: &mut Frame) {
        let area = Self::popup_area(frame.area(), 60, 80);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::DOUBLE);
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(text).block(block), area);
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
        let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
        let [area] = vertical.areas(area);
        let [area] = horizontal.areas(area);
        area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;
    use crate::loader::{FetchError, Source};
    use crate::record::{RawBalance, RawUser};
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{Terminal, backend::TestBackend};
    use rstest::rstest;
    use std::path::PathBuf;

    fn config() -> TableConfig {
        TableConfig::new(Source::File(PathBuf::from("users.json")))
    }

    fn raw(name: &str, age: u32) -> RawUser {
        RawUser {
            name: name.into(),
            age,
            registered: "2020-05-01 12:00:00".into(),
            email: format!("{}@example.com", name.to_lowercase()),
            balance: RawBalance::Text("1,234.50".into()),
        }
    }

    fn render(model: &Model) -> String {
        let ui = TableUI::new(&config());
        let mut terminal = Terminal::new(TestBackend::new(100, 12)).unwrap();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_sorted_table() {
        let mut model = Model::init(&config(), 100, 12);
        model.finish_loading(Ok(vec![raw("Zoe", 20), raw("Adam", 30)]));
        let screen = render(&model);

        assert!(screen.contains("name ▲"));
        assert!(screen.contains("01-05-2020 12:00:00 UTC"));
        assert!(screen.contains("1,234.50"));
        assert!(screen.contains("2/2 users"));
        let adam = screen.find("Adam").unwrap();
        let zoe = screen.find("Zoe").unwrap();
        assert!(adam < zoe);
    }

    #[test]
    fn renders_loading_and_failure() {
        let mut model = Model::init(&config(), 100, 12);
        assert!(render(&model).contains("Loading ..."));

        model.finish_loading(Err(FetchError::Status(500)));
        assert!(render(&model).contains("Loading failed"));
    }

    #[test]
    fn renders_help_popup() {
        let mut model = Model::init(&config(), 100, 12);
        model.finish_loading(Ok(vec![raw("Zoe", 20)]));
        model.update(Some(Message::Help)).unwrap();
        assert!(render(&model).contains("user table viewer"));
    }

    #[rstest]
    #[case("ann", 3, 11)]
    #[case("ann", 1, 9)]
    #[case("日本", 2, 12)]
    #[case("日本", 1, 10)]
    #[case("Émile", 5, 13)]
    fn cursor_column_counts_display_width(
        #[case] text: &str,
        #[case] cursor_pos: usize,
        #[case] expected: u16,
    ) {
        let input = InputResult {
            input: text.into(),
            cursor_pos,
            ..Default::default()
        };
        assert_eq!(TableUI::cursor_column("Filter: ", &input), expected);
    }

    #[test]
    fn filter_cursor_follows_wide_glyphs() {
        let mut model = Model::init(&config(), 100, 12);
        model.finish_loading(Ok(vec![raw("Zoe", 20)]));
        model.update(Some(Message::Filter)).unwrap();
        for c in "日本".chars() {
            model
                .update(Some(Message::RawKey(KeyEvent::new(
                    KeyCode::Char(c),
                    KeyModifiers::NONE,
                ))))
                .unwrap();
        }

        let ui = TableUI::new(&config());
        let mut terminal = Terminal::new(TestBackend::new(100, 12)).unwrap();
        terminal.draw(|f| ui.draw(&model, f)).unwrap();
        terminal.backend_mut().assert_cursor_position((12, 10));
    }

    #[test]
    fn header_marks_sorted_column() {
        let sort = SortState {
            column: Some(Column::Age),
            direction: SortDirection::Descending,
        };
        assert_eq!(TableUI::header_label(Column::Age, &sort), "age ▼");
        assert_eq!(TableUI::header_label(Column::Name, &sort), "name");

        let cleared = SortState {
            column: Some(Column::Age),
            direction: SortDirection::None,
        };
        assert_eq!(TableUI::header_label(Column::Age, &cleared), "age");
    }
}
