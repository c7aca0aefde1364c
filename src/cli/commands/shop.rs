//! `garage shop` command - Shops (tenants) and their staff

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;

use crate::cli::commands::config::write_config_value;
use crate::cli::helpers::{
    backend_error, confirm, print_done, print_field, print_structured, Session,
};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{NewShop, Shop, ShopPatch, ShopUser, UserRole};

#[derive(Subcommand, Debug)]
pub enum ShopCommands {
    /// Register a new shop
    New(NewArgs),

    /// List shops in this workspace
    List(ListArgs),

    /// Show a shop's details
    Show(ShowArgs),

    /// Change a shop's details
    Edit(EditArgs),

    /// Delete a shop and everything it owns
    Delete(DeleteArgs),

    /// Select the shop later commands operate on
    Use(UseArgs),

    /// Staff members of the selected shop
    #[command(subcommand)]
    User(UserCommands),
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Add a staff member
    Add(UserAddArgs),

    /// List staff members
    List(UserListArgs),

    /// Deactivate a staff member (they stop receiving notifications)
    Deactivate(UserKeyArgs),
}

/// List column selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListColumn {
    Id,
    Name,
    Document,
    Phone,
    Email,
    Created,
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListColumn::Id => write!(f, "id"),
            ListColumn::Name => write!(f, "name"),
            ListColumn::Document => write!(f, "document"),
            ListColumn::Phone => write!(f, "phone"),
            ListColumn::Email => write!(f, "email"),
            ListColumn::Created => write!(f, "created"),
        }
    }
}

const SHOP_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 17),
    ColumnDef::new("name", "NAME", 30),
    ColumnDef::new("document", "DOCUMENT", 20),
    ColumnDef::new("phone", "PHONE", 16),
    ColumnDef::new("email", "EMAIL", 28),
    ColumnDef::new("created", "CREATED", 12),
];

const USER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 17),
    ColumnDef::new("name", "NAME", 24),
    ColumnDef::new("email", "EMAIL", 28),
    ColumnDef::new("role", "ROLE", 14),
    ColumnDef::new("active", "ACTIVE", 8),
];

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Shop name
    pub name: String,

    /// Company registration number
    #[arg(long)]
    pub document: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub address: Option<String>,

    /// Also select the new shop
    #[arg(long = "use")]
    pub select: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
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
pub struct ShowArgs {
    /// Shop id, partial id or exact name
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Shop id, partial id or exact name
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    /// Company registration number (empty string clears it)
    #[arg(long)]
    pub document: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub address: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Shop id, partial id or exact name
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct UseArgs {
    /// Shop id, partial id or exact name
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct UserAddArgs {
    /// Full name
    pub name: String,

    /// E-mail, also used as the login identity
    pub email: String,

    #[arg(long, default_value = "mechanic")]
    pub role: UserRole,
}

#[derive(clap::Args, Debug)]
pub struct UserListArgs {
    /// Include deactivated staff
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct UserKeyArgs {
    /// User id, partial id or e-mail
    pub id: String,
}

pub fn run(cmd: ShopCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ShopCommands::New(args) => run_new(args, global),
        ShopCommands::List(args) => run_list(args, global),
        ShopCommands::Show(args) => run_show(args, global),
        ShopCommands::Edit(args) => run_edit(args, global),
        ShopCommands::Delete(args) => run_delete(args, global),
        ShopCommands::Use(args) => run_use(args, global),
        ShopCommands::User(cmd) => match cmd {
            UserCommands::Add(args) => run_user_add(args, global),
            UserCommands::List(args) => run_user_list(args, global),
            UserCommands::Deactivate(args) => run_user_deactivate(args, global),
        },
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let shop = session
        .store
        .create_shop(NewShop {
            name: args.name,
            document: args.document,
            phone: args.phone,
            email: args.email,
            address: args.address,
        })
        .map_err(backend_error)?;

    print_done(
        global,
        format!("Created shop {} ({})", style(&shop.name).yellow(), style(&shop.id).cyan()),
    );
    if args.select {
        select(&session, &shop, global)?;
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let shops = session.store.list_shops().map_err(backend_error)?;

    if args.count {
        println!("{}", shops.len());
        return Ok(());
    }
    if shops.is_empty() {
        println!("No shops found. Create one with {}", style("garage shop new <name>").yellow());
        return Ok(());
    }

    let format = session.format(global, OutputFormat::Tsv);
    match format {
        OutputFormat::Json | OutputFormat::Yaml => return print_structured(&shops, format),
        _ => {}
    }

    let rows = shops.iter().map(|s| {
        TableRow::new(&s.id)
            .cell("id", CellValue::Id(s.id.to_string()))
            .cell("name", CellValue::Text(s.name.clone()))
            .cell("document", CellValue::opt_text(s.document.as_deref()))
            .cell("phone", CellValue::opt_text(s.phone.as_deref()))
            .cell("email", CellValue::opt_text(s.email.as_deref()))
            .cell("created", CellValue::Date(s.created_at))
    });
    let visible: Vec<String> = args.columns.iter().map(|c| c.to_string()).collect();
    TableFormatter::new(SHOP_COLUMNS, "shop")
        .quiet(global.quiet)
        .output(rows, format, &visible);
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let shop = session.store.get_shop(&args.id).map_err(backend_error)?;

    match session.format(global, OutputFormat::Auto) {
        OutputFormat::Id => println!("{}", shop.id),
        f @ (OutputFormat::Json | OutputFormat::Yaml) => print_structured(&shop, f)?,
        _ => {
            let selected = session.config.shop.as_deref().is_some_and(|key| {
                key == shop.id.to_string() || key == shop.name
            });
            println!("{}", style("─".repeat(60)).dim());
            println!("{}: {}", style("ID").bold(), style(&shop.id).cyan());
            println!("{}: {}", style("Name").bold(), style(&shop.name).yellow());
            print_field("Document", shop.document.as_deref());
            print_field("Phone", shop.phone.as_deref());
            print_field("E-mail", shop.email.as_deref());
            print_field("Address", shop.address.as_deref());
            if selected {
                println!("{}: {}", style("Selected").bold(), style("yes").green());
            }
            println!("{}", style("─".repeat(60)).dim());
            println!(
                "{}: {} | {}: {}",
                style("Created").dim(),
                shop.created_at.format("%Y-%m-%d %H:%M"),
                style("Updated").dim(),
                shop.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let shop = session
        .store
        .update_shop(
            &args.id,
            ShopPatch {
                name: args.name,
                document: args.document,
                phone: args.phone,
                email: args.email,
                address: args.address,
            },
        )
        .map_err(backend_error)?;
    print_done(global, format!("Updated shop {}", style(&shop.name).yellow()));
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::open(global)?;
    let shop = session.store.get_shop(&args.id).map_err(backend_error)?;
    let prompt = format!(
        "Delete shop '{}' with all its customers, vehicles, orders and stock?",
        shop.name
    );
    if !confirm(&prompt, args.yes)? {
        println!("Aborted.");
        return Ok(());
    }
    session
        .store
        .delete_shop(&shop.id.to_string())
        .map_err(backend_error)?;
    print_done(global, format!("Deleted shop {}", style(&shop.name).yellow()));
    Ok(())
}

fn run_use(args: UseArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::open(global)?;
    let shop = session.store.get_shop(&args.id).map_err(backend_error)?;
    select(&session, &shop, global)
}

fn select(session: &Session, shop: &Shop, global: &GlobalOpts) -> Result<()> {
    write_config_value(
        &session.workspace.config_path(),
        "shop",
        serde_yml::Value::String(shop.id.to_string()),
    )?;
    print_done(global, format!("Now using shop {}", style(&shop.name).yellow()));
    Ok(())
}

fn run_user_add(args: UserAddArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let user = session
        .store
        .add_user(&args.name, &args.email, args.role)
        .map_err(backend_error)?;
    print_done(
        global,
        format!(
            "Added {} {} to {}",
            user.role,
            style(&user.name).yellow(),
            session.shop_name()
        ),
    );
    Ok(())
}

fn run_user_list(args: UserListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let users: Vec<ShopUser> = session.store.list_users(args.all).map_err(backend_error)?;

    if users.is_empty() {
        println!("No staff found.");
        return Ok(());
    }

    let format = session.format(global, OutputFormat::Tsv);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&users, format);
    }
    let rows = users.iter().map(|u| {
        TableRow::new(&u.id)
            .cell("id", CellValue::Id(u.id.to_string()))
            .cell("name", CellValue::Text(u.name.clone()))
            .cell("email", CellValue::Text(u.email.clone()))
            .cell("role", CellValue::Type(u.role.to_string()))
            .cell("active", CellValue::Flag(u.active))
    });
    TableFormatter::new(USER_COLUMNS, "user")
        .quiet(global.quiet)
        .output(rows, format, &["id", "name", "email", "role", "active"]);
    Ok(())
}

fn run_user_deactivate(args: UserKeyArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let user = session.store.deactivate_user(&args.id).map_err(backend_error)?;
    print_done(global, format!("Deactivated {}", style(&user.name).yellow()));
    Ok(())
}
