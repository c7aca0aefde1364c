//! Markdown rendering of reports

use tabled::{builder::Builder, settings::Style};

use super::comparison::ComparisonReport;
use super::export::ReportSection;
use super::ReportData;

fn section_table(section: ReportSection, data: &ReportData) -> String {
    let mut builder = Builder::default();
    builder.push_record(section.headers().iter().copied());
    for row in section.rows(data) {
        builder.push_record(row);
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Render the chosen sections; empty rollups print a placeholder line
pub fn render(data: &ReportData, sections: &[ReportSection], currency: &str) -> String {
    let mut output = String::new();
    output.push_str("# Shop Report\n\n");
    output.push_str(&format!("**Period:** {}  \n", data.period));
    output.push_str(&format!("**Currency:** {}\n", currency));

    for section in sections {
        output.push_str(&format!("\n## {}\n\n", section.title()));
        if section.rows(data).is_empty() {
            output.push_str("_No orders in this period._\n");
            continue;
        }
        output.push_str(&section_table(*section, data));
        output.push('\n');
    }
    output
}

fn signed_percent(change: rust_decimal::Decimal) -> String {
    if change.is_sign_negative() {
        format!("{}%", change)
    } else {
        format!("+{}%", change)
    }
}

pub fn render_comparison(report: &ComparisonReport, currency: &str) -> String {
    let (cur, prev) = (&report.current.summary, &report.previous.summary);
    let changes = &report.changes;

    let mut output = String::new();
    output.push_str("# Period Comparison\n\n");
    output.push_str(&format!("**Current:** {}  \n", report.current.period));
    output.push_str(&format!("**Previous:** {}  \n", report.previous.period));
    output.push_str(&format!("**Currency:** {}\n\n", currency));

    let mut table = Builder::default();
    table.push_record(["Metric", "Previous", "Current", "Change"]);
    let rows = [
        ("Revenue", prev.total_revenue.to_string(), cur.total_revenue.to_string(), changes.total_revenue),
        ("Billable orders", prev.order_count.to_string(), cur.order_count.to_string(), changes.order_count),
        ("Average ticket", prev.average_ticket.to_string(), cur.average_ticket.to_string(), changes.average_ticket),
        ("Total orders", prev.total_orders.to_string(), cur.total_orders.to_string(), changes.total_orders),
        ("Completed", prev.completed_orders.to_string(), cur.completed_orders.to_string(), changes.completed_orders),
    ];
    for (metric, before, after, change) in rows {
        table.push_record([
            metric.to_string(),
            before,
            after,
            signed_percent(change),
        ]);
    }
    output.push_str(&table.build().with(Style::markdown()).to_string());
    output.push('\n');
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{aggregate, compare_data, DateRange};
    use chrono::NaiveDate;

    fn empty() -> ReportData {
        let period = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        aggregate(period, &[])
    }

    #[test]
    fn test_render_sections() {
        let text = render(&empty(), &[ReportSection::Summary, ReportSection::Customers], "BRL");
        assert!(text.contains("# Shop Report"));
        assert!(text.contains("2024-01-01 to 2024-01-31"));
        assert!(text.contains("| Total revenue"));
        assert!(text.contains("## Customers"));
        assert!(text.contains("_No orders in this period._"));
    }

    #[test]
    fn test_render_comparison_shows_signed_change() {
        let data = empty();
        let report = compare_data(data.clone(), data);
        let text = render_comparison(&report, "BRL");
        assert!(text.contains("| Revenue"));
        assert!(text.contains("+0%"));
    }
}
