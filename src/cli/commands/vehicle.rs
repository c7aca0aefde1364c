//! `garage vehicle` command - Customer vehicles

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;

use crate::cli::helpers::{
    backend_error, confirm, format_money, print_done, print_field, print_structured, Session,
};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{NewVehicle, Vehicle, VehiclePatch};
use crate::store::VehicleFilter;

#[derive(Subcommand, Debug)]
pub enum VehicleCommands {
    /// Register a vehicle for a customer
    New(NewArgs),

    /// List vehicles
    List(ListArgs),

    /// Show a vehicle's details
    Show(KeyArgs),

    /// Change a vehicle's details
    Edit(EditArgs),

    /// Delete a vehicle and its service orders
    Delete(DeleteArgs),

    /// Service orders of a vehicle
    History(KeyArgs),
}

/// List column selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListColumn {
    Id,
    Plate,
    Vehicle,
    Color,
    Mileage,
    Customer,
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListColumn::Id => write!(f, "id"),
            ListColumn::Plate => write!(f, "plate"),
            ListColumn::Vehicle => write!(f, "vehicle"),
            ListColumn::Color => write!(f, "color"),
            ListColumn::Mileage => write!(f, "mileage"),
            ListColumn::Customer => write!(f, "customer"),
        }
    }
}

const VEHICLE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 17),
    ColumnDef::new("plate", "PLATE", 10),
    ColumnDef::new("vehicle", "VEHICLE", 32),
    ColumnDef::new("color", "COLOR", 12),
    ColumnDef::new("mileage", "KM", 10),
    ColumnDef::new("customer", "CUSTOMER", 17),
];

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// License plate
    pub plate: String,

    pub make: String,

    pub model: String,

    /// Owner (customer id, partial id or exact name)
    #[arg(long, short = 'c')]
    pub customer: String,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub vin: Option<String>,

    /// Odometer reading in km
    #[arg(long)]
    pub mileage: Option<i64>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only vehicles of this customer
    #[arg(long, short = 'c')]
    pub customer: Option<String>,

    /// Match plate, make, model or VIN
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Columns to display
    #[arg(long, value_delimiter = ',', default_values_t = vec![
        ListColumn::Id,
        ListColumn::Plate,
        ListColumn::Vehicle,
        ListColumn::Mileage
    ])]
    pub columns: Vec<ListColumn>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct KeyArgs {
    /// Vehicle id, partial id or plate
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Vehicle id, partial id or plate
    pub id: String,

    /// Transfer to another customer
    #[arg(long, short = 'c')]
    pub customer: Option<String>,

    #[arg(long)]
    pub plate: Option<String>,

    #[arg(long)]
    pub make: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub vin: Option<String>,

    #[arg(long)]
    pub mileage: Option<i64>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Vehicle id, partial id or plate
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: VehicleCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        VehicleCommands::New(args) => run_new(args, global),
        VehicleCommands::List(args) => run_list(args, global),
        VehicleCommands::Show(args) => run_show(args, global),
        VehicleCommands::Edit(args) => run_edit(args, global),
        VehicleCommands::Delete(args) => run_delete(args, global),
        VehicleCommands::History(args) => run_history(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let owner = session
        .store
        .get_customer(&args.customer)
        .map_err(backend_error)?;

    let vehicle = session
        .store
        .create_vehicle(NewVehicle {
            customer_id: Some(owner.id),
            plate: args.plate,
            make: args.make,
            model: args.model,
            year: args.year,
            color: args.color,
            vin: args.vin,
            mileage: args.mileage,
            notes: args.notes,
        })
        .map_err(backend_error)?;

    if matches!(global.format, OutputFormat::Id) {
        println!("{}", vehicle.id);
        return Ok(());
    }
    print_done(
        global,
        format!(
            "Registered {} {} for {}",
            style(&vehicle.plate).cyan(),
            vehicle.display_name(),
            style(&owner.name).yellow()
        ),
    );
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let customer_id = match args.customer {
        Some(ref key) => Some(session.store.get_customer(key).map_err(backend_error)?.id),
        None => None,
    };
    let vehicles = session
        .store
        .list_vehicles(&VehicleFilter {
            customer_id,
            search: args.search,
            limit: args.limit,
        })
        .map_err(backend_error)?;

    if args.count {
        println!("{}", vehicles.len());
        return Ok(());
    }
    if vehicles.is_empty() {
        println!("No vehicles found.");
        return Ok(());
    }

    let format = session.format(global, OutputFormat::Tsv);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&vehicles, format);
    }

    let rows = vehicles.iter().map(|v| {
        TableRow::new(&v.id)
            .cell("id", CellValue::Id(v.id.to_string()))
            .cell("plate", CellValue::Text(v.plate.clone()))
            .cell("vehicle", CellValue::Text(v.display_name()))
            .cell("color", CellValue::opt_text(v.color.as_deref()))
            .cell("mileage", v.mileage.map_or(CellValue::Empty, CellValue::Number))
            .cell("customer", CellValue::Id(v.customer_id.to_string()))
    });
    let visible: Vec<String> = args.columns.iter().map(|c| c.to_string()).collect();
    TableFormatter::new(VEHICLE_COLUMNS, "vehicle")
        .quiet(global.quiet)
        .output(rows, format, &visible);
    Ok(())
}

fn run_show(args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let vehicle = session.store.get_vehicle(&args.id).map_err(backend_error)?;

    match session.format(global, OutputFormat::Auto) {
        OutputFormat::Id => println!("{}", vehicle.id),
        f @ (OutputFormat::Json | OutputFormat::Yaml) => print_structured(&vehicle, f)?,
        _ => {
            let owner = session
                .store
                .get_customer(&vehicle.customer_id.to_string())
                .map_err(backend_error)?;
            print_vehicle(&vehicle, &owner.name);
        }
    }
    Ok(())
}

fn print_vehicle(vehicle: &Vehicle, owner: &str) {
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&vehicle.id).cyan());
    println!("{}: {}", style("Plate").bold(), style(&vehicle.plate).yellow());
    println!("{}: {}", style("Vehicle").bold(), vehicle.display_name());
    println!("{}: {}", style("Owner").bold(), owner);
    print_field("Color", vehicle.color.as_deref());
    print_field("VIN", vehicle.vin.as_deref());
    if let Some(km) = vehicle.mileage {
        println!("{}: {} km", style("Mileage").bold(), km);
    }
    if let Some(notes) = vehicle.notes.as_deref().filter(|n| !n.is_empty()) {
        println!();
        println!("{}", notes);
    }
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {} | {}: {}",
        style("Created").dim(),
        vehicle.created_at.format("%Y-%m-%d %H:%M"),
        style("Updated").dim(),
        vehicle.updated_at.format("%Y-%m-%d %H:%M")
    );
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let customer_id = match args.customer {
        Some(ref key) => Some(session.store.get_customer(key).map_err(backend_error)?.id),
        None => None,
    };
    let vehicle = session
        .store
        .update_vehicle(
            &args.id,
            VehiclePatch {
                customer_id,
                plate: args.plate,
                make: args.make,
                model: args.model,
                year: args.year,
                color: args.color,
                vin: args.vin,
                mileage: args.mileage,
                notes: args.notes,
            },
        )
        .map_err(backend_error)?;
    print_done(global, format!("Updated vehicle {}", style(&vehicle.plate).cyan()));
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let vehicle = session.store.get_vehicle(&args.id).map_err(backend_error)?;
    let prompt = format!(
        "Delete vehicle {} ({}) and its service orders?",
        vehicle.plate,
        vehicle.display_name()
    );
    if !confirm(&prompt, args.yes)? {
        println!("Aborted.");
        return Ok(());
    }
    session
        .store
        .delete_vehicle(&vehicle.id.to_string())
        .map_err(backend_error)?;
    print_done(global, format!("Deleted vehicle {}", style(&vehicle.plate).cyan()));
    Ok(())
}

fn run_history(args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let history = session.store.vehicle_history(&args.id).map_err(backend_error)?;

    let format = session.format(global, OutputFormat::Auto);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&history, format);
    }

    let currency = session.config.currency();
    println!(
        "{} {} {}",
        style("Vehicle").bold(),
        style(&history.vehicle.plate).cyan(),
        history.vehicle.display_name()
    );
    println!();
    if history.orders.is_empty() {
        println!("No service orders yet.");
        return Ok(());
    }

    let mut spent = rust_decimal::Decimal::ZERO;
    for order in &history.orders {
        println!(
            "  {:<6} {}  {:<14} {:>8} {:>14}  {}",
            order.reference(),
            order.created_at.format("%Y-%m-%d"),
            order.status.to_string(),
            order.mileage.map(|km| format!("{} km", km)).unwrap_or_default(),
            format_money(order.total_amount, currency),
            order.description
        );
        if order.status != crate::entities::OrderStatus::Canceled {
            spent += order.total_amount;
        }
    }
    println!();
    println!(
        "{} order(s), {} billed",
        style(history.orders.len()).cyan(),
        style(format_money(spent, currency)).green()
    );
    Ok(())
}
