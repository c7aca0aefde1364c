//! `garage order` command - Service orders, line items and status changes

use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;
use rust_decimal::Decimal;

use crate::cli::helpers::{
    backend_error, confirm, format_money, format_quantity, parse_date, parse_decimal, print_done,
    print_field, print_structured, Session,
};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{
    ItemType, NewServiceItem, NewServiceOrder, OrderStatus, ServiceItem, ServiceOrder,
    ServiceOrderPatch,
};
use crate::store::OrderFilter;

#[derive(Subcommand, Debug)]
pub enum OrderCommands {
    /// Open a service order for a vehicle
    New(NewArgs),

    /// List service orders
    List(ListArgs),

    /// Show an order with its items
    Show(KeyArgs),

    /// Change an order's description, notes, mileage, discount or due date
    Edit(EditArgs),

    /// Delete an order
    Delete(DeleteArgs),

    /// Move an order to another status
    Status(StatusArgs),

    /// Status changes of an order
    History(KeyArgs),

    /// Add a service or part line
    AddItem(AddItemArgs),

    /// Remove a line item
    RemoveItem(RemoveItemArgs),
}

/// List column selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListColumn {
    Number,
    Id,
    Date,
    Status,
    Description,
    Customer,
    Vehicle,
    Due,
    Total,
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListColumn::Number => write!(f, "number"),
            ListColumn::Id => write!(f, "id"),
            ListColumn::Date => write!(f, "date"),
            ListColumn::Status => write!(f, "status"),
            ListColumn::Description => write!(f, "description"),
            ListColumn::Customer => write!(f, "customer"),
            ListColumn::Vehicle => write!(f, "vehicle"),
            ListColumn::Due => write!(f, "due"),
            ListColumn::Total => write!(f, "total"),
        }
    }
}

const ORDER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("number", "#", 6),
    ColumnDef::new("id", "ID", 17),
    ColumnDef::new("date", "DATE", 12),
    ColumnDef::new("status", "STATUS", 15),
    ColumnDef::new("description", "DESCRIPTION", 36),
    ColumnDef::new("customer", "CUSTOMER", 17),
    ColumnDef::new("vehicle", "VEHICLE", 17),
    ColumnDef::new("due", "DUE", 12),
    ColumnDef::new("total", "TOTAL", 14),
];

const ITEM_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 17),
    ColumnDef::new("type", "TYPE", 9),
    ColumnDef::new("category", "CATEGORY", 16),
    ColumnDef::new("description", "DESCRIPTION", 34),
    ColumnDef::new("qty", "QTY", 8),
    ColumnDef::new("unit", "UNIT", 12),
    ColumnDef::new("total", "TOTAL", 14),
];

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// What the customer asked for
    pub description: String,

    /// Vehicle id, partial id or plate
    #[arg(long)]
    pub vehicle: String,

    /// Customer (defaults to the vehicle's owner)
    #[arg(long, short = 'c')]
    pub customer: Option<String>,

    /// Notes; a "Técnico: <name>" line assigns the technician
    #[arg(long)]
    pub notes: Option<String>,

    /// Odometer reading at check-in
    #[arg(long)]
    pub mileage: Option<i64>,

    /// Discount taken off the item total
    #[arg(long, value_parser = parse_decimal)]
    pub discount: Option<Decimal>,

    /// Estimated completion date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub due: Option<NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<OrderStatus>,

    /// Orders of this customer
    #[arg(long, short = 'c')]
    pub customer: Option<String>,

    /// Orders of this vehicle
    #[arg(long)]
    pub vehicle: Option<String>,

    /// Opened on or after (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Opened on or before (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// Match description or notes
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Columns to display
    #[arg(long, value_delimiter = ',', default_values_t = vec![
        ListColumn::Number,
        ListColumn::Date,
        ListColumn::Status,
        ListColumn::Description,
        ListColumn::Total
    ])]
    pub columns: Vec<ListColumn>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct KeyArgs {
    /// Order number (12 or #12), id or partial id
    pub order: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Order number (12 or #12), id or partial id
    pub order: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(long)]
    pub mileage: Option<i64>,

    #[arg(long, value_parser = parse_decimal)]
    pub discount: Option<Decimal>,

    #[arg(long, value_parser = parse_date)]
    pub due: Option<NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Order number (12 or #12), id or partial id
    pub order: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Order number (12 or #12), id or partial id
    pub order: String,

    /// New status
    pub status: OrderStatus,

    /// Note stored with the change
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct AddItemArgs {
    /// Order number (12 or #12), id or partial id
    pub order: String,

    /// Line description (defaults to the part name with --part)
    #[arg(default_value = "")]
    pub description: String,

    #[arg(long = "type", short = 't', default_value = "service")]
    pub item_type: ItemType,

    /// Category used by the service reports (e.g. "Revisão")
    #[arg(long)]
    pub service_type: Option<String>,

    #[arg(long, value_parser = parse_decimal, default_value = "1")]
    pub qty: Decimal,

    /// Unit price (defaults to the part's sale price with --part)
    #[arg(long, value_parser = parse_decimal)]
    pub price: Option<Decimal>,

    /// Take the part out of stock (code, id or partial id)
    #[arg(long)]
    pub part: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RemoveItemArgs {
    /// Item id or partial id
    pub item: String,
}

pub fn run(cmd: OrderCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        OrderCommands::New(args) => run_new(args, global),
        OrderCommands::List(args) => run_list(args, global),
        OrderCommands::Show(args) => run_show(args, global),
        OrderCommands::Edit(args) => run_edit(args, global),
        OrderCommands::Delete(args) => run_delete(args, global),
        OrderCommands::Status(args) => run_status(args, global),
        OrderCommands::History(args) => run_history(args, global),
        OrderCommands::AddItem(args) => run_add_item(args, global),
        OrderCommands::RemoveItem(args) => run_remove_item(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let vehicle = session.store.get_vehicle(&args.vehicle).map_err(backend_error)?;
    let customer_id = match args.customer {
        Some(ref key) => Some(session.store.get_customer(key).map_err(backend_error)?.id),
        None => None,
    };

    let order = session
        .store
        .create_order(NewServiceOrder {
            customer_id,
            vehicle_id: Some(vehicle.id.clone()),
            description: args.description,
            notes: args.notes,
            mileage: args.mileage,
            discount: args.discount.unwrap_or_default(),
            estimated_completion: args.due,
        })
        .map_err(backend_error)?;

    if matches!(global.format, OutputFormat::Id) {
        println!("{}", order.id);
        return Ok(());
    }
    print_done(
        global,
        format!(
            "Opened service order {} for {}",
            style(order.reference()).yellow(),
            style(&vehicle.plate).cyan()
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
    let vehicle_id = match args.vehicle {
        Some(ref key) => Some(session.store.get_vehicle(key).map_err(backend_error)?.id),
        None => None,
    };
    let orders = session
        .store
        .list_orders(&OrderFilter {
            status: args.status,
            customer_id,
            vehicle_id,
            from: args.from,
            to: args.to,
            search: args.search,
            limit: args.limit,
        })
        .map_err(backend_error)?;

    if args.count {
        println!("{}", orders.len());
        return Ok(());
    }
    if orders.is_empty() {
        println!("No service orders found.");
        return Ok(());
    }

    let format = session.format(global, OutputFormat::Tsv);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&orders, format);
    }

    let rows = orders.iter().map(order_row);
    let visible: Vec<String> = args.columns.iter().map(|c| c.to_string()).collect();
    TableFormatter::new(ORDER_COLUMNS, "service order")
        .quiet(global.quiet)
        .output(rows, format, &visible);
    Ok(())
}

fn order_row(o: &ServiceOrder) -> TableRow {
    TableRow::new(&o.id)
        .cell("number", CellValue::Text(o.reference()))
        .cell("id", CellValue::Id(o.id.to_string()))
        .cell("date", CellValue::Date(o.created_at))
        .cell("status", CellValue::Status(o.status))
        .cell("description", CellValue::Text(o.description.clone()))
        .cell("customer", CellValue::Id(o.customer_id.to_string()))
        .cell("vehicle", CellValue::Id(o.vehicle_id.to_string()))
        .cell("due", o.estimated_completion.map_or(CellValue::Empty, CellValue::Day))
        .cell("total", CellValue::Money(o.total_amount))
}

fn run_show(args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let order = session.store.get_order(&args.order).map_err(backend_error)?;
    let items = session
        .store
        .list_items(&order.id.to_string())
        .map_err(backend_error)?;

    let format = session.format(global, OutputFormat::Auto);
    match format {
        OutputFormat::Id => {
            println!("{}", order.id);
            return Ok(());
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            #[derive(serde::Serialize)]
            struct OrderWithItems<'a> {
                #[serde(flatten)]
                order: &'a ServiceOrder,
                items: &'a [ServiceItem],
            }
            return print_structured(
                &OrderWithItems {
                    order: &order,
                    items: &items,
                },
                format,
            );
        }
        _ => {}
    }

    let customer = session
        .store
        .get_customer(&order.customer_id.to_string())
        .map_err(backend_error)?;
    let vehicle = session
        .store
        .get_vehicle(&order.vehicle_id.to_string())
        .map_err(backend_error)?;
    let currency = session.config.currency();

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{} {}  {}",
        style("Service order").bold(),
        style(order.reference()).yellow(),
        style(order.status.label()).cyan()
    );
    println!("{}: {}", style("ID").bold(), style(&order.id).cyan());
    println!("{}: {}", style("Customer").bold(), customer.name);
    println!(
        "{}: {} {}",
        style("Vehicle").bold(),
        vehicle.plate,
        vehicle.display_name()
    );
    println!("{}: {}", style("Description").bold(), order.description);
    if let Some(km) = order.mileage {
        println!("{}: {} km", style("Mileage").bold(), km);
    }
    if let Some(due) = order.estimated_completion {
        println!("{}: {}", style("Due").bold(), due);
    }
    if let Some(done) = order.completed_at {
        println!("{}: {}", style("Completed").bold(), done.format("%Y-%m-%d %H:%M"));
    }
    print_field("Notes", order.notes.as_deref());
    println!("{}", style("─".repeat(60)).dim());

    if items.is_empty() {
        println!("{}", style("No items yet.").dim());
    } else {
        let rows = items.iter().map(|i| {
            TableRow::new(&i.id)
                .cell("id", CellValue::Id(i.id.to_string()))
                .cell("type", CellValue::Type(i.item_type.to_string()))
                .cell("category", CellValue::Text(i.category()))
                .cell("description", CellValue::Text(i.description.clone()))
                .cell("qty", CellValue::Quantity(i.quantity))
                .cell("unit", CellValue::Money(i.unit_price))
                .cell("total", CellValue::Money(i.total_price))
        });
        TableFormatter::new(ITEM_COLUMNS, "item").quiet(true).output(
            rows,
            OutputFormat::Tsv,
            &["id", "type", "category", "description", "qty", "unit", "total"],
        );
    }

    println!("{}", style("─".repeat(60)).dim());
    if !order.discount.is_zero() {
        let subtotal: Decimal = items.iter().map(|i| i.total_price).sum();
        println!("{:>14}: {}", "Subtotal", format_money(subtotal, currency));
        println!("{:>14}: -{}", "Discount", format_money(order.discount, currency));
    }
    println!(
        "{:>14}: {}",
        style("Total").bold(),
        style(format_money(order.total_amount, currency)).green().bold()
    );
    let next: Vec<String> = order.status.next_states().iter().map(|s| s.to_string()).collect();
    if !next.is_empty() {
        println!();
        println!("{} {}", style("Next:").dim(), style(next.join(", ")).dim());
    }
    Ok(())
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let order = session
        .store
        .update_order(
            &args.order,
            ServiceOrderPatch {
                description: args.description,
                notes: args.notes,
                mileage: args.mileage,
                discount: args.discount,
                estimated_completion: args.due,
            },
        )
        .map_err(backend_error)?;
    print_done(
        global,
        format!(
            "Updated service order {} (total {})",
            style(order.reference()).yellow(),
            format_money(order.total_amount, session.config.currency())
        ),
    );
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let order = session.store.get_order(&args.order).map_err(backend_error)?;
    let prompt = format!(
        "Delete service order {} ({})?",
        order.reference(),
        order.description
    );
    if !confirm(&prompt, args.yes)? {
        println!("Aborted.");
        return Ok(());
    }
    session
        .store
        .delete_order(&order.id.to_string())
        .map_err(backend_error)?;
    print_done(global, format!("Deleted service order {}", style(order.reference()).yellow()));
    Ok(())
}

fn run_status(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let order = session
        .store
        .change_status(&args.order, args.status, args.note)
        .map_err(backend_error)?;
    print_done(
        global,
        format!(
            "Service order {} is now {}",
            style(order.reference()).yellow(),
            style(order.status.label()).cyan()
        ),
    );
    Ok(())
}

fn run_history(args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let history = session.store.status_history(&args.order).map_err(backend_error)?;

    let format = session.format(global, OutputFormat::Auto);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&history, format);
    }

    for entry in &history {
        let from = entry
            .from_status
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "{}  {:<14} {} {:<14} {}{}",
            entry.changed_at.format("%Y-%m-%d %H:%M"),
            from,
            style("→").dim(),
            entry.to_status.to_string(),
            style(&entry.changed_by).dim(),
            entry
                .note
                .as_deref()
                .map(|n| format!("  {}", n))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn run_add_item(args: AddItemArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let part_id = match args.part {
        Some(ref key) => Some(session.store.get_part(key).map_err(backend_error)?.id),
        None => None,
    };
    let item = session
        .store
        .add_item(
            &args.order,
            NewServiceItem {
                item_type: args.item_type,
                service_type: args.service_type,
                description: args.description,
                quantity: args.qty,
                unit_price: args.price.unwrap_or_default(),
                part_id,
            },
        )
        .map_err(backend_error)?;
    print_done(
        global,
        format!(
            "Added {} x {} ({})",
            format_quantity(item.quantity),
            style(&item.description).yellow(),
            format_money(item.total_price, session.config.currency())
        ),
    );
    Ok(())
}

fn run_remove_item(args: RemoveItemArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let item = session.store.remove_item(&args.item).map_err(backend_error)?;
    print_done(global, format!("Removed {}", style(&item.description).yellow()));
    Ok(())
}
