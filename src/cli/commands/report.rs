//! `garage report` command - Revenue and activity reports

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate, Utc};
use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;
use rust_decimal::Decimal;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{
    backend_error, format_money, parse_date, parse_decimal, print_structured, Session,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::OrderStatus;
use crate::reports::{
    self, export, markdown, pdf, DateRange, ReportData, ReportFilters, ReportSection,
};

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Revenue, ticket and order counts for the period
    Summary(ReportArgs),

    /// Revenue per customer
    Customers(ReportArgs),

    /// Revenue per vehicle
    Vehicles(ReportArgs),

    /// Revenue per technician (from "Técnico: <name>" in order notes)
    Technicians(ReportArgs),

    /// Revenue per service type
    Services(ReportArgs),

    /// Revenue per month
    Monthly(ReportArgs),

    /// Every order of the period
    Orders(ReportArgs),

    /// Period against the preceding period of equal length
    Compare(ReportArgs),

    /// Write the report as CSV files, PDF, markdown or JSON
    Export(ExportArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct PeriodArgs {
    /// First day (YYYY-MM-DD); defaults to the start of the month
    #[arg(long, value_parser = parse_date, conflicts_with = "days")]
    pub from: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_date, conflicts_with = "days")]
    pub to: Option<NaiveDate>,

    /// The last N days up to today
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct FilterArgs {
    /// Only orders of this customer
    #[arg(long, short = 'c')]
    pub customer: Option<String>,

    /// Only orders of this vehicle
    #[arg(long)]
    pub vehicle: Option<String>,

    #[arg(long)]
    pub status: Option<OrderStatus>,

    /// Only orders with an item of this service type
    #[arg(long)]
    pub service_type: Option<String>,

    /// Minimum order total
    #[arg(long, value_parser = parse_decimal)]
    pub min: Option<Decimal>,

    /// Maximum order total
    #[arg(long, value_parser = parse_decimal)]
    pub max: Option<Decimal>,
}

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// One CSV file per section
    Csv,
    Pdf,
    Md,
    Json,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Output format
    #[arg(value_enum)]
    pub kind: ExportFormat,

    /// Output file (directory for csv); defaults to .garage/exports
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Sections to include (default: all)
    #[arg(long, value_delimiter = ',')]
    pub sections: Vec<ReportSection>,

    #[command(flatten)]
    pub period: PeriodArgs,

    #[command(flatten)]
    pub filters: FilterArgs,
}

pub fn run(cmd: ReportCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ReportCommands::Summary(args) => {
            run_sections(args, &[ReportSection::Summary, ReportSection::Status], global)
        }
        ReportCommands::Customers(args) => run_sections(args, &[ReportSection::Customers], global),
        ReportCommands::Vehicles(args) => run_sections(args, &[ReportSection::Vehicles], global),
        ReportCommands::Technicians(args) => {
            run_sections(args, &[ReportSection::Technicians], global)
        }
        ReportCommands::Services(args) => run_sections(args, &[ReportSection::Services], global),
        ReportCommands::Monthly(args) => run_sections(args, &[ReportSection::Monthly], global),
        ReportCommands::Orders(args) => run_sections(args, &[ReportSection::Orders], global),
        ReportCommands::Compare(args) => run_compare(args, global),
        ReportCommands::Export(args) => run_export(args, global),
    }
}

/// Report window from the command line; month to date by default
fn resolve_period(args: &PeriodArgs, today: NaiveDate) -> Result<DateRange> {
    if let Some(days) = args.days {
        return DateRange::last_days(today, days).map_err(backend_error);
    }
    match (args.from, args.to) {
        (None, None) => Ok(DateRange::month_to_date(today)),
        (from, to) => {
            let to = to.unwrap_or(today);
            let from = from.unwrap_or_else(|| to.with_day(1).unwrap_or(to));
            DateRange::new(from, to).map_err(backend_error)
        }
    }
}

fn resolve_filters(session: &Session, args: &FilterArgs) -> Result<ReportFilters> {
    let customer_id = match args.customer {
        Some(ref key) => Some(session.store.get_customer(key).map_err(backend_error)?.id),
        None => None,
    };
    let vehicle_id = match args.vehicle {
        Some(ref key) => Some(session.store.get_vehicle(key).map_err(backend_error)?.id),
        None => None,
    };
    Ok(ReportFilters {
        customer_id,
        vehicle_id,
        status: args.status,
        service_type: args.service_type.clone(),
        min_amount: args.min,
        max_amount: args.max,
    })
}

/// Order dates are UTC calendar days, so the report window is too
fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn build(session: &Session, period: &PeriodArgs, filters: &FilterArgs) -> Result<ReportData> {
    let period = resolve_period(period, today())?;
    let filters = resolve_filters(session, filters)?;
    reports::build(&session.store, period, &filters).map_err(backend_error)
}

fn run_sections(args: ReportArgs, sections: &[ReportSection], global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let data = build(&session, &args.period, &args.filters)?;
    let currency = session.config.currency();

    match session.format(global, OutputFormat::Auto) {
        f @ (OutputFormat::Json | OutputFormat::Yaml) => print_structured(&data, f),
        OutputFormat::Md => {
            print!("{}", markdown::render(&data, sections, currency));
            Ok(())
        }
        OutputFormat::Csv => {
            for section in sections {
                print!("{}", section.to_csv(&data).map_err(backend_error)?);
            }
            Ok(())
        }
        _ => {
            println!(
                "{} {}  {}",
                style(session.shop_name()).yellow().bold(),
                style(data.period).dim(),
                style(currency).dim()
            );
            for section in sections {
                print_section(*section, &data);
            }
            Ok(())
        }
    }
}

fn print_section(section: ReportSection, data: &ReportData) {
    println!();
    println!("{}", style(section.title()).bold());
    let rows = section.rows(data);
    if rows.is_empty() {
        println!("{}", style("No orders in this period.").dim());
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(section.headers().iter().copied());
    for row in rows {
        builder.push_record(row);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn run_compare(args: ReportArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let period = resolve_period(&args.period, today())?;
    let filters = resolve_filters(&session, &args.filters)?;
    let report = reports::compare(&session.store, period, &filters).map_err(backend_error)?;
    let currency = session.config.currency();

    match session.format(global, OutputFormat::Auto) {
        f @ (OutputFormat::Json | OutputFormat::Yaml) => print_structured(&report, f),
        OutputFormat::Md => {
            print!("{}", markdown::render_comparison(&report, currency));
            Ok(())
        }
        _ => {
            let (cur, prev) = (&report.current.summary, &report.previous.summary);
            println!(
                "{} {} {} {}",
                style(report.current.period).bold(),
                style("vs").dim(),
                style(report.previous.period).bold(),
                style(currency).dim()
            );
            let mut builder = Builder::default();
            builder.push_record(["Metric", "Previous", "Current", "Change"]);
            let rows = [
                (
                    "Revenue",
                    format_money(prev.total_revenue, currency),
                    format_money(cur.total_revenue, currency),
                    report.changes.total_revenue,
                ),
                (
                    "Billable orders",
                    prev.order_count.to_string(),
                    cur.order_count.to_string(),
                    report.changes.order_count,
                ),
                (
                    "Average ticket",
                    format_money(prev.average_ticket, currency),
                    format_money(cur.average_ticket, currency),
                    report.changes.average_ticket,
                ),
                (
                    "Total orders",
                    prev.total_orders.to_string(),
                    cur.total_orders.to_string(),
                    report.changes.total_orders,
                ),
                (
                    "Completed",
                    prev.completed_orders.to_string(),
                    cur.completed_orders.to_string(),
                    report.changes.completed_orders,
                ),
            ];
            for (metric, before, after, change) in rows {
                let change = if change.is_sign_negative() {
                    format!("{}%", change)
                } else {
                    format!("+{}%", change)
                };
                builder.push_record([metric.to_string(), before, after, change]);
            }
            println!("{}", builder.build().with(Style::rounded()));
            Ok(())
        }
    }
}

fn run_export(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let data = build(&session, &args.period, &args.filters)?;
    let currency = session.config.currency();
    let sections: Vec<ReportSection> = if args.sections.is_empty() {
        ReportSection::all().to_vec()
    } else {
        args.sections.clone()
    };
    let stem = format!("report-{}_{}", data.period.from, data.period.to);
    let exports = session.workspace.exports_dir();

    match args.kind {
        ExportFormat::Csv => {
            let dir = args.output.unwrap_or(exports);
            let written =
                export::export_csv_dir(&data, &sections, &dir, &stem).map_err(backend_error)?;
            if !global.quiet {
                for path in &written {
                    println!("Report written to: {}", path.display());
                }
            }
        }
        ExportFormat::Pdf => {
            let path = args.output.unwrap_or_else(|| exports.join(format!("{}.pdf", stem)));
            let bytes = pdf::render(&data, &sections, session.shop_name(), currency);
            export::write_file(&path, &bytes).map_err(backend_error)?;
            if !global.quiet {
                println!("Report written to: {}", path.display());
            }
        }
        ExportFormat::Md => {
            let content = markdown::render(&data, &sections, currency);
            write_output(&content, args.output, global)?;
        }
        ExportFormat::Json => {
            let content = serde_json::to_string_pretty(&data)
                .map_err(|e| miette::miette!("{}", e))?;
            write_output(&content, args.output, global)?;
        }
    }
    tracing::info!(kind = ?args.kind, period = %data.period, "exported report");
    Ok(())
}

/// Write text to a file, or stdout when no path was given
fn write_output(content: &str, output_path: Option<PathBuf>, global: &GlobalOpts) -> Result<()> {
    match output_path {
        Some(path) => {
            export::write_file(&path, content.as_bytes()).map_err(backend_error)?;
            if !global.quiet {
                println!("Report written to: {}", path.display());
            }
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period(from: Option<NaiveDate>, to: Option<NaiveDate>, days: Option<u32>) -> PeriodArgs {
        PeriodArgs { from, to, days }
    }

    #[test]
    fn test_default_period_is_month_to_date() {
        let range = resolve_period(&period(None, None, None), day(2024, 6, 18)).unwrap();
        assert_eq!(range, DateRange::new(day(2024, 6, 1), day(2024, 6, 18)).unwrap());
    }

    #[test]
    fn test_days_counts_back_from_today() {
        let range = resolve_period(&period(None, None, Some(7)), day(2024, 6, 18)).unwrap();
        assert_eq!(range.from, day(2024, 6, 12));
        assert_eq!(range.to, day(2024, 6, 18));
    }

    #[test]
    fn test_open_ended_bounds() {
        let today = day(2024, 6, 18);
        let only_from = resolve_period(&period(Some(day(2024, 5, 10)), None, None), today).unwrap();
        assert_eq!(only_from.to, today);

        let only_to = resolve_period(&period(None, Some(day(2024, 4, 20)), None), today).unwrap();
        assert_eq!(only_to.from, day(2024, 4, 1));
    }

    #[test]
    fn test_huge_day_count_is_an_error() {
        assert!(resolve_period(&period(None, None, Some(u32::MAX)), day(2024, 6, 18)).is_err());
    }

    #[test]
    fn test_default_period_includes_order_created_now() {
        use crate::entities::{NewCustomer, NewServiceOrder, NewShop, NewVehicle};
        use crate::store::Store;

        let mut store = Store::open_in_memory().unwrap();
        store
            .create_shop(NewShop {
                name: "Oficina".into(),
                ..Default::default()
            })
            .unwrap();
        store.select_shop("Oficina").unwrap();
        let ana = store
            .create_customer(NewCustomer {
                name: "Ana".into(),
                ..Default::default()
            })
            .unwrap();
        let car = store
            .create_vehicle(NewVehicle {
                customer_id: Some(ana.id.clone()),
                plate: "ABC1D23".into(),
                make: "Fiat".into(),
                model: "Uno".into(),
                ..Default::default()
            })
            .unwrap();
        let order = store
            .create_order(NewServiceOrder {
                vehicle_id: Some(car.id.clone()),
                description: "Revisão".into(),
                ..Default::default()
            })
            .unwrap();

        for args in [period(None, None, None), period(None, None, Some(1))] {
            let range = resolve_period(&args, today()).unwrap();
            assert!(range.contains(order.created_at.date_naive()));
            let data = reports::build(&store, range, &ReportFilters::default()).unwrap();
            assert_eq!(data.summary.total_orders, 1);
        }
    }

    #[test]
    fn test_inverted_period_is_rejected() {
        let args = period(Some(day(2024, 6, 20)), Some(day(2024, 6, 1)), None);
        assert!(resolve_period(&args, day(2024, 6, 30)).is_err());
    }
}
