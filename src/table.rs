use std::cmp::Ordering;
use std::fmt;

use tracing::{debug, trace};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::record::UserRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Age,
    Registered,
    Email,
    Balance,
}

/// Display order of the table columns.
pub const COLUMNS: [Column; 5] = [
    Column::Name,
    Column::Age,
    Column::Registered,
    Column::Email,
    Column::Balance,
];

impl Column {
    pub fn id(&self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Age => "age",
            Column::Registered => "registered",
            Column::Email => "email",
            Column::Balance => "balance",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
    None,
}

impl SortDirection {
    /// Short form as used in sort events, `asc` or `desc`. Empty when cleared.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
            SortDirection::None => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: Option<Column>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn unsorted() -> Self {
        SortState {
            column: None,
            direction: SortDirection::None,
        }
    }

    /// The column rows are currently ordered by, if any.
    pub fn active_column(&self) -> Option<Column> {
        match self.direction {
            SortDirection::None => None,
            _ => self.column,
        }
    }
}

/// Owns the normalized records and derives the rows that are visible.
pub struct TableModel {
    records: Vec<UserRecord>, // Load order, never reordered
    rows: Vec<usize>,         // Visible rows as indices into records
    filter: String,
    sort: SortState,
}

impl TableModel {
    /// Takes the records in load order and applies the default sort by name.
    pub fn new(records: Vec<UserRecord>) -> Self {
        let mut table = TableModel {
            records,
            rows: Vec::new(),
            filter: String::new(),
            sort: SortState::unsorted(),
        };
        table.set_sort(Column::Name, SortDirection::Ascending);
        table
    }

    pub fn columns(&self) -> &'static [Column] {
        &COLUMNS
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.records
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn visible_len(&self) -> usize {
        self.rows.len()
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &UserRecord> + '_ {
        self.rows.iter().map(|&idx| &self.records[idx])
    }

    pub fn set_filter(&mut self, text: &str) {
        let filter = text.trim().to_lowercase();
        if filter == self.filter {
            return;
        }
        trace!("Filter '{}' => '{}'", self.filter, filter);
        self.filter = filter;
        self.derive_rows();
    }

    pub fn set_sort(&mut self, column: Column, direction: SortDirection) {
        self.sort = SortState {
            column: Some(column),
            direction,
        };
        self.derive_rows();
    }

    /// Header click behaviour: a new column starts ascending, the same
    /// column steps ascending, descending, cleared.
    pub fn cycle_sort(&mut self, column: Column) -> SortState {
        let direction = if self.sort.column == Some(column) {
            match self.sort.direction {
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::None,
                SortDirection::None => SortDirection::Ascending,
            }
        } else {
            SortDirection::Ascending
        };
        self.set_sort(column, direction);
        self.sort
    }

    pub fn reset_all_balances(&mut self) {
        for record in self.records.iter_mut() {
            record.balance = 0.0;
        }
        debug!("Reset balance of {} users", self.records.len());
        // Only matters while sorted by balance
        self.derive_rows();
    }

    fn derive_rows(&mut self) {
        let mut rows: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| Self::matches_filter(record, &self.filter))
            .map(|(idx, _)| idx)
            .collect();

        if let Some(column) = self.sort.active_column() {
            let descending = self.sort.direction == SortDirection::Descending;
            // Stable, equal rows keep their load order
            rows.sort_by(|&a, &b| {
                Self::compare(&self.records[a], &self.records[b], column, descending)
            });
        }

        trace!(
            "Derived {}/{} rows (filter '{}', sort {:?})",
            rows.len(),
            self.records.len(),
            self.filter,
            self.sort
        );
        self.rows = rows;
    }

    fn matches_filter(record: &UserRecord, filter: &str) -> bool {
        filter.is_empty() || record.name.to_lowercase().contains(filter)
    }

    fn compare(a: &UserRecord, b: &UserRecord, column: Column, descending: bool) -> Ordering {
        let order = |ordering: Ordering| if descending { ordering.reverse() } else { ordering };
        match column {
            Column::Name => order(locale_cmp(&a.name, &b.name)),
            Column::Email => order(locale_cmp(&a.email, &b.email)),
            Column::Age => order(a.age.cmp(&b.age)),
            Column::Registered => match (a.registered, b.registered) {
                (Some(a), Some(b)) => order(a.cmp(&b)),
                (Some(_), None) => Ordering::Less, // Missing dates go last
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            Column::Balance => match (a.balance.is_nan(), b.balance.is_nan()) {
                (false, false) => order(a.balance.total_cmp(&b.balance)),
                (false, true) => Ordering::Less, // NaN goes last
                (true, false) => Ordering::Greater,
                (true, true) => Ordering::Equal,
            },
        }
    }
}

/// Dictionary like ordering in three levels: base letters (accents and
/// case ignored), then accents with unaccented first, then case with lower
/// case first.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
        s.nfd()
            .filter(|&c| !is_combining_mark(c))
            .flat_map(char::to_lowercase)
    }
    fn accented(s: &str) -> impl Iterator<Item = char> + '_ {
        s.nfd().flat_map(char::to_lowercase)
    }

    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accented(a).cmp(accented(b)))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
}
