//! Table formatting utilities for CLI list commands
//!
//! Every `list` subcommand builds [`TableRow`]s of typed [`CellValue`]s and
//! hands them to a [`TableFormatter`], which renders them as an aligned
//! terminal table, CSV, markdown or bare ids.

use chrono::{DateTime, Local, NaiveDate, Utc};
use console::style;
use rust_decimal::Decimal;

use crate::cli::helpers::{escape_csv, format_quantity, format_short_id_str, truncate_str};
use crate::cli::OutputFormat;
use crate::entities::OrderStatus;

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Entity ID (cyan, shortened in terminal tables)
    Id(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// Service order status with color coding
    Status(OrderStatus),
    /// Amount with two decimals, right aligned
    Money(Decimal),
    /// Stock or item quantity
    Quantity(Decimal),
    /// Calendar date
    Day(NaiveDate),
    /// Timestamp displayed as a local date
    Date(DateTime<Utc>),
    /// Timestamp displayed with time
    DateTime(DateTime<Utc>),
    /// Integer value
    Number(i64),
    /// Yes/no flag; `true` is highlighted
    Flag(bool),
    /// Entity type or category
    Type(String),
    /// Empty/placeholder
    Empty,
}

impl CellValue {
    /// Optional text, `-` when absent
    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(CellValue::Empty, |v| CellValue::Text(v.to_string()))
    }

    /// Format for the terminal table (with colors if terminal)
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Id(id) => {
                format!("{:<width$}", style(format_short_id_str(id)).cyan(), width = width)
            }
            CellValue::Text(s) | CellValue::Type(s) => {
                format!("{:<width$}", truncate_str(s, width.saturating_sub(2)), width = width)
            }
            CellValue::Status(status) => {
                let s = status.to_string();
                let styled = match status {
                    OrderStatus::Pending => style(s).dim(),
                    OrderStatus::Approved => style(s).cyan(),
                    OrderStatus::InProgress => style(s).yellow(),
                    OrderStatus::WaitingParts => style(s).magenta(),
                    OrderStatus::Completed => style(s).green(),
                    OrderStatus::Canceled => style(s).red().dim(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Money(amount) => {
                format!("{:>width$}", format!("{:.2}", amount.round_dp(2)), width = width)
            }
            CellValue::Quantity(q) => format!("{:>width$}", format_quantity(*q), width = width),
            CellValue::Number(n) => format!("{:>width$}", n, width = width),
            CellValue::Flag(flag) => {
                let styled = if *flag {
                    style("yes").yellow().bold()
                } else {
                    style("no").dim()
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Empty => format!("{:<width$}", "-", width = width),
            other => format!("{:<width$}", other.raw(), width = width),
        }
    }

    /// Format for CSV output (RFC 4180, no colors)
    pub fn format_csv(&self) -> String {
        match self {
            CellValue::Id(s) | CellValue::Text(s) | CellValue::Type(s) => escape_csv(s),
            other => other.raw(),
        }
    }

    /// Format for Markdown output (no colors, escaped pipes)
    pub fn format_md(&self) -> String {
        let raw = match self {
            CellValue::Empty => "-".to_string(),
            CellValue::Flag(true) => "**yes**".to_string(),
            other => other.raw(),
        };
        raw.replace('|', "\\|")
    }

    /// Get raw string value (no formatting)
    pub fn raw(&self) -> String {
        match self {
            CellValue::Id(s) | CellValue::Text(s) | CellValue::Type(s) => s.clone(),
            CellValue::Status(status) => status.to_string(),
            CellValue::Money(amount) => format!("{:.2}", amount.round_dp(2)),
            CellValue::Quantity(q) => format_quantity(*q),
            CellValue::Day(day) => day.format("%Y-%m-%d").to_string(),
            CellValue::Date(dt) => {
                let local: DateTime<Local> = dt.with_timezone(&Local);
                local.format("%Y-%m-%d").to_string()
            }
            CellValue::DateTime(dt) => {
                let local: DateTime<Local> = dt.with_timezone(&Local);
                local.format("%Y-%m-%d %H:%M").to_string()
            }
            CellValue::Number(n) => n.to_string(),
            CellValue::Flag(true) => "yes".to_string(),
            CellValue::Flag(false) => "no".to_string(),
            CellValue::Empty => String::new(),
        }
    }

    /// Get the display width of this cell's content (for dynamic column sizing)
    pub fn display_width(&self) -> usize {
        match self {
            CellValue::Id(id) => id.chars().count().min(16),
            CellValue::Empty => 1,
            other => other.raw().chars().count(),
        }
    }
}

/// Column definition with header label and maximum width
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// A row of cell values for table output
pub struct TableRow {
    pub full_id: String,
    pub cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new(full_id: impl ToString) -> Self {
        Self {
            full_id: full_id.to_string(),
            cells: Vec::new(),
        }
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Table formatter that outputs rows in various formats
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    entity_name: &'static str,
    show_summary: bool,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], entity_name: &'static str) -> Self {
        Self {
            columns,
            entity_name,
            show_summary: true,
        }
    }

    /// Drop the "N x(s) found." line (for `--quiet`)
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.show_summary = !quiet;
        self
    }

    /// Output rows in the specified format
    pub fn output<I, S>(&self, rows: I, format: OutputFormat, visible_columns: &[S])
    where
        I: IntoIterator<Item = TableRow>,
        S: AsRef<str>,
    {
        let rows: Vec<TableRow> = rows.into_iter().collect();
        let visible_columns: Vec<&str> = visible_columns.iter().map(|c| c.as_ref()).collect();
        let visible_columns = visible_columns.as_slice();

        match format {
            OutputFormat::Csv => self.output_csv(&rows, visible_columns),
            OutputFormat::Md => self.output_md(&rows, visible_columns),
            OutputFormat::Id => self.output_ids(&rows),
            _ => self.output_tsv(&rows, visible_columns),
        }
    }

    fn visible(&self, visible_columns: &[&str]) -> Vec<&ColumnDef> {
        self.columns
            .iter()
            .filter(|col| visible_columns.contains(&col.key))
            .collect()
    }

    /// Calculate column widths from content, capped at each column's maximum
    fn calculate_widths(&self, rows: &[TableRow], visible_columns: &[&str]) -> Vec<usize> {
        self.visible(visible_columns)
            .into_iter()
            .map(|col| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(|v| v.display_width())
                    .max()
                    .unwrap_or(0);
                col.header.len().max(max_content + 2).min(col.width)
            })
            .collect()
    }

    fn output_tsv(&self, rows: &[TableRow], visible_columns: &[&str]) {
        let widths = self.calculate_widths(rows, visible_columns);

        let header: Vec<String> = self
            .visible(visible_columns)
            .into_iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<width$}", style(col.header).bold(), width = *w))
            .collect();
        println!("{}", header.join(" "));

        let total_width: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        println!("{}", "-".repeat(total_width));

        for row in rows {
            let parts: Vec<String> = self
                .visible(visible_columns)
                .into_iter()
                .zip(&widths)
                .map(|(col, w)| match row.get(col.key) {
                    Some(value) => value.format_tsv(*w),
                    None => format!("{:<width$}", "-", width = *w),
                })
                .collect();
            println!("{}", parts.join(" "));
        }

        if self.show_summary {
            println!();
            println!("{} {}(s) found.", style(rows.len()).cyan(), self.entity_name);
        }
    }

    fn output_csv(&self, rows: &[TableRow], visible_columns: &[&str]) {
        let mut headers = vec!["id".to_string()];
        headers.extend(self.visible(visible_columns).iter().map(|c| c.key.to_string()));
        println!("{}", headers.join(","));

        for row in rows {
            let mut values = vec![escape_csv(&row.full_id)];
            values.extend(
                self.visible(visible_columns)
                    .iter()
                    .map(|col| row.get(col.key).map(|v| v.format_csv()).unwrap_or_default()),
            );
            println!("{}", values.join(","));
        }
    }

    fn output_md(&self, rows: &[TableRow], visible_columns: &[&str]) {
        let mut headers = vec!["ID".to_string()];
        headers.extend(self.visible(visible_columns).iter().map(|c| c.header.to_string()));
        println!("| {} |", headers.join(" | "));
        let separators: Vec<&str> = headers.iter().map(|_| "---").collect();
        println!("|{}|", separators.join("|"));

        for row in rows {
            let mut values = vec![row.full_id.clone()];
            values.extend(self.visible(visible_columns).iter().map(|col| {
                row.get(col.key)
                    .map(|v| v.format_md())
                    .unwrap_or_else(|| "-".to_string())
            }));
            println!("| {} |", values.join(" | "));
        }
    }

    fn output_ids(&self, rows: &[TableRow]) {
        for row in rows {
            println!("{}", row.full_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_cell_pads_two_decimals() {
        let cell = CellValue::Money("12.5".parse().unwrap());
        assert_eq!(cell.raw(), "12.50");
        assert_eq!(cell.format_tsv(8), "   12.50");
    }

    #[test]
    fn test_csv_escapes_text_only() {
        assert_eq!(CellValue::Text("Silva, Ana".into()).format_csv(), "\"Silva, Ana\"");
        assert_eq!(CellValue::Status(OrderStatus::WaitingParts).format_csv(), "waiting_parts");
        assert_eq!(CellValue::Empty.format_csv(), "");
    }

    #[test]
    fn test_md_escapes_pipes() {
        assert_eq!(CellValue::Text("a|b".into()).format_md(), "a\\|b");
        assert_eq!(CellValue::Empty.format_md(), "-");
    }

    #[test]
    fn test_widths_follow_content_with_cap() {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::new("name", "NAME", 10),
            ColumnDef::new("qty", "QTY", 8),
        ];
        let rows = vec![TableRow::new("X")
            .cell("name", CellValue::Text("a very long name".into()))
            .cell("qty", CellValue::Quantity("3".parse().unwrap()))];
        let formatter = TableFormatter::new(COLUMNS, "thing");
        assert_eq!(formatter.calculate_widths(&rows, &["name", "qty"]), vec![10, 3]);
        assert_eq!(formatter.calculate_widths(&rows, &["qty"]), vec![3]);
    }
}
