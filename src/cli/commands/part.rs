//! `garage part` command - Parts catalog

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;
use rust_decimal::Decimal;

use crate::cli::helpers::{
    backend_error, confirm, format_money, format_quantity, parse_decimal, print_done, print_field,
    print_structured, Session,
};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{NewPart, Part, PartPatch};
use crate::store::PartFilter;

#[derive(Subcommand, Debug)]
pub enum PartCommands {
    /// Add a part to the catalog
    New(NewArgs),

    /// List parts
    List(ListArgs),

    /// Show a part with its recent movements
    Show(KeyArgs),

    /// Change a part's details
    Edit(EditArgs),

    /// Delete a part and its movement history
    Delete(DeleteArgs),
}

/// List column selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListColumn {
    Id,
    Code,
    Name,
    Category,
    Qty,
    Min,
    Cost,
    Price,
    Location,
    Low,
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListColumn::Id => write!(f, "id"),
            ListColumn::Code => write!(f, "code"),
            ListColumn::Name => write!(f, "name"),
            ListColumn::Category => write!(f, "category"),
            ListColumn::Qty => write!(f, "qty"),
            ListColumn::Min => write!(f, "min"),
            ListColumn::Cost => write!(f, "cost"),
            ListColumn::Price => write!(f, "price"),
            ListColumn::Location => write!(f, "location"),
            ListColumn::Low => write!(f, "low"),
        }
    }
}

const PART_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 17),
    ColumnDef::new("code", "CODE", 14),
    ColumnDef::new("name", "NAME", 30),
    ColumnDef::new("category", "CATEGORY", 16),
    ColumnDef::new("qty", "QTY", 10),
    ColumnDef::new("min", "MIN", 8),
    ColumnDef::new("cost", "COST", 12),
    ColumnDef::new("price", "PRICE", 12),
    ColumnDef::new("location", "LOCATION", 12),
    ColumnDef::new("low", "LOW", 5),
];

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Shop-unique part code
    pub code: String,

    pub name: String,

    #[arg(long)]
    pub category: Option<String>,

    /// Unit of measure (default "un")
    #[arg(long)]
    pub unit: Option<String>,

    #[arg(long, value_parser = parse_decimal, default_value = "0")]
    pub cost: Decimal,

    #[arg(long, value_parser = parse_decimal, default_value = "0")]
    pub price: Decimal,

    /// Reorder threshold
    #[arg(long, value_parser = parse_decimal, default_value = "0")]
    pub min: Decimal,

    /// Shelf or bin
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Match code or name
    #[arg(long, short = 's')]
    pub search: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Only parts at or below their minimum
    #[arg(long)]
    pub low_stock: bool,

    /// Include deactivated parts
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Columns to display
    #[arg(long, value_delimiter = ',', default_values_t = vec![
        ListColumn::Code,
        ListColumn::Name,
        ListColumn::Qty,
        ListColumn::Min,
        ListColumn::Price,
        ListColumn::Low
    ])]
    pub columns: Vec<ListColumn>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct KeyArgs {
    /// Part code, id or partial id
    pub part: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Part code, id or partial id
    pub part: String,

    #[arg(long)]
    pub code: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub unit: Option<String>,

    #[arg(long, value_parser = parse_decimal)]
    pub cost: Option<Decimal>,

    #[arg(long, value_parser = parse_decimal)]
    pub price: Option<Decimal>,

    #[arg(long, value_parser = parse_decimal)]
    pub min: Option<Decimal>,

    #[arg(long)]
    pub location: Option<String>,

    /// Hide the part from lists and new orders
    #[arg(long, conflicts_with = "activate")]
    pub deactivate: bool,

    #[arg(long)]
    pub activate: bool,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Part code, id or partial id
    pub part: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: PartCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PartCommands::New(args) => run_new(args, global),
        PartCommands::List(args) => run_list(args, global),
        PartCommands::Show(args) => run_show(args, global),
        PartCommands::Edit(args) => run_edit(args, global),
        PartCommands::Delete(args) => run_delete(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let part = session
        .store
        .create_part(NewPart {
            code: args.code,
            name: args.name,
            category: args.category,
            unit: args.unit,
            cost_price: args.cost,
            sale_price: args.price,
            min_quantity: args.min,
            location: args.location,
        })
        .map_err(backend_error)?;

    if matches!(global.format, OutputFormat::Id) {
        println!("{}", part.id);
        return Ok(());
    }
    print_done(
        global,
        format!(
            "Added part {} {}",
            style(&part.code).cyan(),
            style(&part.name).yellow()
        ),
    );
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let parts = session
        .store
        .list_parts(&PartFilter {
            search: args.search,
            category: args.category,
            low_stock: args.low_stock,
            include_inactive: args.all,
            limit: args.limit,
        })
        .map_err(backend_error)?;

    if args.count {
        println!("{}", parts.len());
        return Ok(());
    }
    if parts.is_empty() {
        println!("No parts found.");
        return Ok(());
    }

    let format = session.format(global, OutputFormat::Tsv);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&parts, format);
    }

    let rows = parts.iter().map(part_row);
    let visible: Vec<String> = args.columns.iter().map(|c| c.to_string()).collect();
    TableFormatter::new(PART_COLUMNS, "part")
        .quiet(global.quiet)
        .output(rows, format, &visible);
    Ok(())
}

fn part_row(p: &Part) -> TableRow {
    TableRow::new(&p.id)
        .cell("id", CellValue::Id(p.id.to_string()))
        .cell("code", CellValue::Text(p.code.clone()))
        .cell("name", CellValue::Text(p.name.clone()))
        .cell("category", CellValue::opt_text(p.category.as_deref()))
        .cell("qty", CellValue::Quantity(p.quantity))
        .cell("min", CellValue::Quantity(p.min_quantity))
        .cell("cost", CellValue::Money(p.cost_price))
        .cell("price", CellValue::Money(p.sale_price))
        .cell("location", CellValue::opt_text(p.location.as_deref()))
        .cell("low", CellValue::Flag(p.is_low_stock()))
}

fn run_show(args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let part = session.store.get_part(&args.part).map_err(backend_error)?;

    match session.format(global, OutputFormat::Auto) {
        OutputFormat::Id => {
            println!("{}", part.id);
            return Ok(());
        }
        f @ (OutputFormat::Json | OutputFormat::Yaml) => return print_structured(&part, f),
        _ => {}
    }

    let currency = session.config.currency();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&part.id).cyan());
    println!("{}: {}", style("Code").bold(), style(&part.code).yellow());
    println!("{}: {}", style("Name").bold(), part.name);
    print_field("Category", part.category.as_deref());
    print_field("Location", part.location.as_deref());
    let on_hand = format!("{} {}", format_quantity(part.quantity), part.unit);
    if part.is_low_stock() {
        println!(
            "{}: {} {}",
            style("On hand").bold(),
            style(on_hand).red().bold(),
            style("(low stock)").red()
        );
    } else {
        println!("{}: {}", style("On hand").bold(), on_hand);
    }
    println!(
        "{}: {} {}",
        style("Minimum").bold(),
        format_quantity(part.min_quantity),
        part.unit
    );
    println!("{}: {}", style("Cost").bold(), format_money(part.cost_price, currency));
    println!("{}: {}", style("Price").bold(), format_money(part.sale_price, currency));
    if !part.active {
        println!("{}: {}", style("Active").bold(), style("no").dim());
    }
    println!("{}", style("─".repeat(60)).dim());

    let movements = session
        .store
        .list_movements(Some(&part.id.to_string()), Some(5))
        .map_err(backend_error)?;
    if !movements.is_empty() {
        println!("{}", style("Recent movements").bold());
        for m in &movements {
            println!(
                "  {}  {:<10} {:>8}  {} → {}  {}",
                m.created_at.format("%Y-%m-%d %H:%M"),
                m.movement_type.to_string(),
                format_quantity(m.quantity),
                format_quantity(m.previous_quantity),
                format_quantity(m.new_quantity),
                style(m.reason.as_deref().unwrap_or("")).dim()
            );
        }
    }
    Ok(())
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let active = match (args.activate, args.deactivate) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let part = session
        .store
        .update_part(
            &args.part,
            PartPatch {
                code: args.code,
                name: args.name,
                category: args.category,
                unit: args.unit,
                cost_price: args.cost,
                sale_price: args.price,
                min_quantity: args.min,
                location: args.location,
                active,
            },
        )
        .map_err(backend_error)?;
    print_done(global, format!("Updated part {}", style(&part.code).cyan()));
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let part = session.store.get_part(&args.part).map_err(backend_error)?;
    let prompt = format!("Delete part {} ({}) and its stock history?", part.code, part.name);
    if !confirm(&prompt, args.yes)? {
        println!("Aborted.");
        return Ok(());
    }
    session
        .store
        .delete_part(&part.id.to_string())
        .map_err(backend_error)?;
    print_done(global, format!("Deleted part {}", style(&part.code).cyan()));
    Ok(())
}
