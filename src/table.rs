//! Table rendering for vote totals.
//!
//! [`CountsTable`] renders a [`VoteCounts`] as a formatted table using the
//! `tabled` crate. Requires the `server` feature.
//!
//! # Examples
//!
//! ```rust
//! use scrutinio::table::{CountsTable, TableStyle};
//! use scrutinio::VoteCounts;
//!
//! let table = CountsTable::new()
//!     .with_style(TableStyle::Ascii)
//!     .with_total(true)
//!     .render(&VoteCounts::new(3, 1, 0));
//! assert!(table.contains("cat"));
//! assert!(table.contains("75.0%"));
//! // +----------+-------+--------+
//! // | Choice   | Votes | Share  |
//! // +----------+-------+--------+
//! // | cat      | 3     | 75.0%  |
//! // ...
//! ```

use tabled::{settings::Style, Table, Tabled};

use crate::choice::Choice;
use crate::snapshot::VoteCounts;

/// Available table styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// GitHub-flavored Markdown table
    Markdown,
    /// No borders, just spacing
    Blank,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Choice")]
    choice: String,
    #[tabled(rename = "Votes")]
    votes: u64,
    #[tabled(rename = "Share")]
    share: String,
}

/// Renders vote totals as a table.
#[derive(Debug, Clone)]
pub struct CountsTable {
    style: TableStyle,
    title: Option<String>,
    total: bool,
    include_goldfish: bool,
}

impl Default for CountsTable {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            title: None,
            total: false,
            include_goldfish: true,
        }
    }
}

impl CountsTable {
    /// Creates a renderer with the rounded style and no total row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the border style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets a title printed above the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Appends a `total` row.
    pub fn with_total(mut self, enabled: bool) -> Self {
        self.total = enabled;
        self
    }

    /// Whether goldfish votes count towards the total and the shares.
    ///
    /// The goldfish row is shown either way.
    pub fn include_goldfish(mut self, include: bool) -> Self {
        self.include_goldfish = include;
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn share(&self, votes: u64, total: u64) -> String {
        if total == 0 {
            return "-".to_string();
        }
        format!("{:.1}%", votes as f64 * 100.0 / total as f64)
    }

    /// Renders `counts`, one row per choice.
    pub fn render(&self, counts: &VoteCounts) -> String {
        let total = counts.total(self.include_goldfish);
        let mut rows: Vec<CountRow> = Choice::ALL
            .into_iter()
            .map(|choice| {
                let votes = counts.get(choice);
                let counted = self.include_goldfish || choice != Choice::Goldfish;
                CountRow {
                    choice: choice.to_string(),
                    votes,
                    share: if counted {
                        self.share(votes, total)
                    } else {
                        "-".to_string()
                    },
                }
            })
            .collect();

        if self.total {
            rows.push(CountRow {
                choice: "total".to_string(),
                votes: total,
                share: String::new(),
            });
        }

        let mut table = Table::new(&rows);
        self.apply_style(&mut table);

        match &self.title {
            Some(title) => format!("{title}\n{table}"),
            None => table.to_string(),
        }
    }
}
