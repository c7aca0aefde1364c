//! `garage stock` command - Stock movements

use clap::Subcommand;
use console::style;
use miette::Result;
use rust_decimal::Decimal;

use crate::cli::helpers::{
    backend_error, format_quantity, parse_decimal, print_done, print_structured, Session,
};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{MovementType, NewMovement};

#[derive(Subcommand, Debug)]
pub enum StockCommands {
    /// Record an entry, exit, adjustment or return
    Move(MoveArgs),

    /// List movements, newest first
    List(ListArgs),
}

const MOVEMENT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("date", "DATE", 17),
    ColumnDef::new("part", "PART", 17),
    ColumnDef::new("type", "TYPE", 11),
    ColumnDef::new("qty", "QTY", 9),
    ColumnDef::new("before", "BEFORE", 9),
    ColumnDef::new("after", "AFTER", 9),
    ColumnDef::new("reason", "REASON", 30),
    ColumnDef::new("by", "BY", 20),
];

#[derive(clap::Args, Debug)]
pub struct MoveArgs {
    /// Part code, id or partial id
    pub part: String,

    /// entry, exit, adjustment (absolute count) or return
    pub kind: MovementType,

    #[arg(value_parser = parse_decimal)]
    pub quantity: Decimal,

    #[arg(long, short = 'r')]
    pub reason: Option<String>,

    /// Unit cost paid (entries)
    #[arg(long, value_parser = parse_decimal)]
    pub cost: Option<Decimal>,

    /// Service order the movement belongs to
    #[arg(long)]
    pub order: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only movements of this part
    #[arg(long, short = 'p')]
    pub part: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,
}

pub fn run(cmd: StockCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        StockCommands::Move(args) => run_move(args, global),
        StockCommands::List(args) => run_list(args, global),
    }
}

fn run_move(args: MoveArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;

    let mut movement = NewMovement::new(args.kind, args.quantity);
    movement.unit_cost = args.cost;
    if let Some(reason) = args.reason {
        movement = movement.reason(reason);
    }
    if let Some(ref key) = args.order {
        let order = session.store.get_order(key).map_err(backend_error)?;
        movement = movement.for_order(&order.id);
    }

    let part = session.store.get_part(&args.part).map_err(backend_error)?;
    let recorded = session
        .store
        .record_movement(&part.id.to_string(), movement)
        .map_err(backend_error)?;

    print_done(
        global,
        format!(
            "{} {} {}: {} → {} {}",
            recorded.movement_type,
            format_quantity(recorded.quantity),
            style(&part.code).cyan(),
            format_quantity(recorded.previous_quantity),
            style(format_quantity(recorded.new_quantity)).yellow(),
            part.unit
        ),
    );
    if recorded.new_quantity <= part.min_quantity && !global.quiet {
        println!(
            "{} {} is at or below its minimum of {}",
            style("!").yellow(),
            part.code,
            format_quantity(part.min_quantity)
        );
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let movements = session
        .store
        .list_movements(args.part.as_deref(), Some(args.limit))
        .map_err(backend_error)?;

    if movements.is_empty() {
        println!("No stock movements found.");
        return Ok(());
    }

    let format = session.format(global, OutputFormat::Tsv);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&movements, format);
    }

    let rows = movements.iter().map(|m| {
        TableRow::new(&m.id)
            .cell("date", CellValue::DateTime(m.created_at))
            .cell("part", CellValue::Id(m.part_id.to_string()))
            .cell("type", CellValue::Type(m.movement_type.to_string()))
            .cell("qty", CellValue::Quantity(m.quantity))
            .cell("before", CellValue::Quantity(m.previous_quantity))
            .cell("after", CellValue::Quantity(m.new_quantity))
            .cell("reason", CellValue::opt_text(m.reason.as_deref()))
            .cell("by", CellValue::Text(m.created_by.clone()))
    });
    TableFormatter::new(MOVEMENT_COLUMNS, "movement")
        .quiet(global.quiet)
        .output(
            rows,
            format,
            &["date", "part", "type", "qty", "before", "after", "reason", "by"],
        );
    Ok(())
}
