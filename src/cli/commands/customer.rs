//! `garage customer` command - Customer records

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;

use crate::cli::helpers::{
    backend_error, confirm, format_money, print_done, print_field, print_structured, prompt_text,
    Session,
};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{Customer, CustomerPatch, NewCustomer};
use crate::store::CustomerFilter;

#[derive(Subcommand, Debug)]
pub enum CustomerCommands {
    /// Register a new customer
    New(NewArgs),

    /// List customers
    List(ListArgs),

    /// Show a customer's details
    Show(KeyArgs),

    /// Change a customer's details
    Edit(EditArgs),

    /// Delete a customer with their vehicles and orders
    Delete(DeleteArgs),

    /// Vehicles and service orders of a customer
    History(KeyArgs),
}

/// List column selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListColumn {
    Id,
    Name,
    Phone,
    Email,
    Cpf,
    Created,
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListColumn::Id => write!(f, "id"),
            ListColumn::Name => write!(f, "name"),
            ListColumn::Phone => write!(f, "phone"),
            ListColumn::Email => write!(f, "email"),
            ListColumn::Cpf => write!(f, "cpf"),
            ListColumn::Created => write!(f, "created"),
        }
    }
}

const CUSTOMER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 17),
    ColumnDef::new("name", "NAME", 30),
    ColumnDef::new("phone", "PHONE", 16),
    ColumnDef::new("email", "EMAIL", 28),
    ColumnDef::new("cpf", "CPF", 16),
    ColumnDef::new("created", "CREATED", 12),
];

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Customer name
    #[arg(required_unless_present = "interactive")]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    /// Taxpayer number, stored as typed
    #[arg(long)]
    pub cpf: Option<String>,

    #[arg(long)]
    pub address: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    /// Ask for each field
    #[arg(long, short = 'i')]
    pub interactive: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Match name, e-mail, phone or CPF
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Columns to display
    #[arg(long, value_delimiter = ',', default_values_t = vec![
        ListColumn::Id,
        ListColumn::Name,
        ListColumn::Phone,
        ListColumn::Email
    ])]
    pub columns: Vec<ListColumn>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct KeyArgs {
    /// Customer id, partial id or exact name
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Customer id, partial id or exact name
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    /// New e-mail (empty string clears it)
    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub cpf: Option<String>,

    #[arg(long)]
    pub address: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Customer id, partial id or exact name
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: CustomerCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CustomerCommands::New(args) => run_new(args, global),
        CustomerCommands::List(args) => run_list(args, global),
        CustomerCommands::Show(args) => run_show(args, global),
        CustomerCommands::Edit(args) => run_edit(args, global),
        CustomerCommands::Delete(args) => run_delete(args, global),
        CustomerCommands::History(args) => run_history(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;

    let input = if args.interactive {
        NewCustomer {
            name: prompt_text("Name", true)?.unwrap_or_default(),
            phone: prompt_text("Phone", false)?,
            email: prompt_text("E-mail", false)?,
            cpf: prompt_text("CPF", false)?,
            address: prompt_text("Address", false)?,
            notes: prompt_text("Notes", false)?,
        }
    } else {
        NewCustomer {
            name: args.name.unwrap_or_default(),
            email: args.email,
            phone: args.phone,
            cpf: args.cpf,
            address: args.address,
            notes: args.notes,
        }
    };

    let customer = session.store.create_customer(input).map_err(backend_error)?;
    if matches!(global.format, OutputFormat::Id) {
        println!("{}", customer.id);
        return Ok(());
    }
    print_done(
        global,
        format!(
            "Created customer {} ({})",
            style(&customer.name).yellow(),
            style(&customer.id).cyan()
        ),
    );
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let customers = session
        .store
        .list_customers(&CustomerFilter {
            search: args.search,
            limit: args.limit,
        })
        .map_err(backend_error)?;

    if args.count {
        println!("{}", customers.len());
        return Ok(());
    }
    if customers.is_empty() {
        println!("No customers found.");
        return Ok(());
    }

    let format = session.format(global, OutputFormat::Tsv);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&customers, format);
    }

    let rows = customers.iter().map(customer_row);
    let visible: Vec<String> = args.columns.iter().map(|c| c.to_string()).collect();
    TableFormatter::new(CUSTOMER_COLUMNS, "customer")
        .quiet(global.quiet)
        .output(rows, format, &visible);
    Ok(())
}

fn customer_row(c: &Customer) -> TableRow {
    TableRow::new(&c.id)
        .cell("id", CellValue::Id(c.id.to_string()))
        .cell("name", CellValue::Text(c.name.clone()))
        .cell("phone", CellValue::opt_text(c.phone.as_deref()))
        .cell("email", CellValue::opt_text(c.email.as_deref()))
        .cell("cpf", CellValue::opt_text(c.cpf.as_deref()))
        .cell("created", CellValue::Date(c.created_at))
}

fn run_show(args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let customer = session.store.get_customer(&args.id).map_err(backend_error)?;

    match session.format(global, OutputFormat::Auto) {
        OutputFormat::Id => println!("{}", customer.id),
        f @ (OutputFormat::Json | OutputFormat::Yaml) => print_structured(&customer, f)?,
        _ => print_customer(&customer),
    }
    Ok(())
}

fn print_customer(customer: &Customer) {
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&customer.id).cyan());
    println!("{}: {}", style("Name").bold(), style(&customer.name).yellow());
    print_field("Phone", customer.phone.as_deref());
    print_field("E-mail", customer.email.as_deref());
    print_field("CPF", customer.cpf.as_deref());
    print_field("Address", customer.address.as_deref());
    if let Some(notes) = customer.notes.as_deref().filter(|n| !n.is_empty()) {
        println!();
        println!("{}", notes);
    }
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}: {} | {}: {}",
        style("Created").dim(),
        customer.created_at.format("%Y-%m-%d %H:%M"),
        style("Updated").dim(),
        customer.updated_at.format("%Y-%m-%d %H:%M")
    );
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let patch = CustomerPatch {
        name: args.name,
        email: args.email,
        phone: args.phone,
        cpf: args.cpf,
        address: args.address,
        notes: args.notes,
    };
    if patch.is_empty() {
        return Err(miette::miette!(
            help = "pass at least one of --name, --email, --phone, --cpf, --address or --notes",
            "Nothing to change"
        ));
    }
    let customer = session
        .store
        .update_customer(&args.id, patch)
        .map_err(backend_error)?;
    print_done(global, format!("Updated customer {}", style(&customer.name).yellow()));
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let customer = session.store.get_customer(&args.id).map_err(backend_error)?;
    let prompt = format!(
        "Delete customer '{}' with their vehicles and service orders?",
        customer.name
    );
    if !confirm(&prompt, args.yes)? {
        println!("Aborted.");
        return Ok(());
    }
    session
        .store
        .delete_customer(&customer.id.to_string())
        .map_err(backend_error)?;
    print_done(global, format!("Deleted customer {}", style(&customer.name).yellow()));
    Ok(())
}

fn run_history(args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let history = session.store.customer_history(&args.id).map_err(backend_error)?;

    let format = session.format(global, OutputFormat::Auto);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&history, format);
    }

    let currency = session.config.currency();
    println!(
        "{} {}",
        style("Customer").bold(),
        style(&history.customer.name).yellow()
    );
    println!();

    println!("{} ({})", style("Vehicles").bold(), history.vehicles.len());
    for vehicle in &history.vehicles {
        println!(
            "  {:<10} {}",
            style(&vehicle.plate).cyan(),
            vehicle.display_name()
        );
    }
    println!();

    println!("{} ({})", style("Service orders").bold(), history.orders.len());
    for order in &history.orders {
        println!(
            "  {:<6} {}  {:<14} {:>14}  {}",
            order.reference(),
            order.created_at.format("%Y-%m-%d"),
            order.status.to_string(),
            format_money(order.total_amount, currency),
            order.description
        );
    }
    Ok(())
}
