//! `garage notify` command - Notification center
//!
//! Notifications are addressed to staff members of the selected shop. When
//! `--user` is omitted the configured `user` identity is used if it matches
//! a staff member; otherwise every notification of the shop is shown.

use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{backend_error, confirm, print_done, print_structured, Session};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityId;
use crate::entities::{NewNotification, Notification, NotificationType};
use crate::store::NotificationFilter;

#[derive(Subcommand, Debug)]
pub enum NotifyCommands {
    /// List notifications, newest first
    List(ListArgs),

    /// Mark one notification read
    Read(KeyArgs),

    /// Mark every visible notification read
    ReadAll(UserArgs),

    /// Delete a notification
    Delete(DeleteArgs),

    /// Number of unread notifications
    Count(UserArgs),

    /// Print new notifications as they arrive (Ctrl-C to stop)
    Watch(WatchArgs),

    /// Send a notification to one user or the whole staff
    Send(SendArgs),

    /// Show a user's notification preferences
    Prefs(PrefsArgs),

    /// Turn a notification type on or off for a user
    SetPref(SetPrefArgs),
}

const NOTIFICATION_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 17),
    ColumnDef::new("date", "DATE", 17),
    ColumnDef::new("type", "TYPE", 21),
    ColumnDef::new("title", "TITLE", 40),
    ColumnDef::new("unread", "NEW", 5),
];

#[derive(clap::Args, Debug)]
pub struct UserArgs {
    /// Staff member (id, partial id or e-mail)
    #[arg(long, short = 'u')]
    pub user: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Only unread notifications
    #[arg(long)]
    pub unread: bool,

    #[arg(long = "type", short = 't')]
    pub kind: Option<NotificationType>,

    /// Maximum number of results
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,
}

#[derive(clap::Args, Debug)]
pub struct KeyArgs {
    /// Notification id or partial id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Notification id or partial id
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub user: UserArgs,

    /// Seconds between polls
    #[arg(long, default_value = "5")]
    pub interval: u64,
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    pub title: String,

    pub message: String,

    #[arg(long = "type", short = 't', default_value = "system")]
    pub kind: NotificationType,

    /// Only this staff member (default: everyone)
    #[arg(long, short = 'u')]
    pub user: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PrefsArgs {
    /// Staff member (id, partial id or e-mail)
    pub user: String,
}

#[derive(clap::Args, Debug)]
pub struct SetPrefArgs {
    /// Staff member (id, partial id or e-mail)
    pub user: String,

    #[arg(value_name = "TYPE")]
    pub kind: NotificationType,

    /// on or off
    #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
    pub enabled: bool,
}

fn parse_switch(s: &str) -> std::result::Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("'{}' is not on or off", s)),
    }
}

pub fn run(cmd: NotifyCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        NotifyCommands::List(args) => run_list(args, global),
        NotifyCommands::Read(args) => run_read(args, global),
        NotifyCommands::ReadAll(args) => run_read_all(args, global),
        NotifyCommands::Delete(args) => run_delete(args, global),
        NotifyCommands::Count(args) => run_count(args, global),
        NotifyCommands::Watch(args) => run_watch(args, global),
        NotifyCommands::Send(args) => run_send(args, global),
        NotifyCommands::Prefs(args) => run_prefs(args, global),
        NotifyCommands::SetPref(args) => run_set_pref(args, global),
    }
}

/// Recipient for user-scoped views: `--user`, then the configured identity
fn recipient(session: &Session, args: &UserArgs) -> Result<Option<EntityId>> {
    if let Some(ref key) = args.user {
        return Ok(Some(session.store.get_user(key).map_err(backend_error)?.id));
    }
    let Some(identity) = session.config.user.as_deref() else {
        return Ok(None);
    };
    let user = session.store.find_user(identity).map_err(backend_error)?;
    Ok(user.map(|u| u.id))
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let user_id = recipient(&session, &args.user)?;
    let notifications = session
        .store
        .list_notifications(&NotificationFilter {
            user_id,
            unread_only: args.unread,
            notification_type: args.kind,
            since: None,
            limit: Some(args.limit),
        })
        .map_err(backend_error)?;

    if notifications.is_empty() {
        println!("No notifications.");
        return Ok(());
    }

    let format = session.format(global, OutputFormat::Tsv);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_structured(&notifications, format);
    }

    let rows = notifications.iter().map(|n| {
        TableRow::new(&n.id)
            .cell("id", CellValue::Id(n.id.to_string()))
            .cell("date", CellValue::DateTime(n.created_at))
            .cell("type", CellValue::Type(n.notification_type.to_string()))
            .cell("title", CellValue::Text(n.title.clone()))
            .cell("unread", CellValue::Flag(!n.is_read()))
    });
    TableFormatter::new(NOTIFICATION_COLUMNS, "notification")
        .quiet(global.quiet)
        .output(rows, format, &["id", "date", "type", "title", "unread"]);
    Ok(())
}

fn run_read(args: KeyArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let notification = session.store.mark_read(&args.id).map_err(backend_error)?;
    if !global.quiet {
        print_notification(&notification);
    }
    Ok(())
}

fn run_read_all(args: UserArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let user_id = recipient(&session, &args)?;
    let changed = session
        .store
        .mark_all_read(user_id.as_ref())
        .map_err(backend_error)?;
    print_done(global, format!("Marked {} notification(s) read", style(changed).cyan()));
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let notification = session.store.get_notification(&args.id).map_err(backend_error)?;
    if !confirm(&format!("Delete notification '{}'?", notification.title), args.yes)? {
        println!("Aborted.");
        return Ok(());
    }
    session
        .store
        .delete_notification(&notification.id.to_string())
        .map_err(backend_error)?;
    print_done(global, "Deleted notification");
    Ok(())
}

fn run_count(args: UserArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let user_id = recipient(&session, &args)?;
    let count = session
        .store
        .unread_count(user_id.as_ref())
        .map_err(backend_error)?;
    println!("{}", count);
    Ok(())
}

fn run_watch(args: WatchArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let user_id = recipient(&session, &args.user)?;
    let interval = Duration::from_secs(args.interval.max(1));

    let mut since: Option<DateTime<Utc>> = Some(Utc::now());
    if !global.quiet {
        eprintln!(
            "{} Watching notifications for {} (Ctrl-C to stop)",
            style("→").blue(),
            style(session.shop_name()).yellow()
        );
    }

    loop {
        let fresh = session
            .store
            .poll_notifications(&NotificationFilter {
                user_id: user_id.clone(),
                since,
                ..Default::default()
            })
            .map_err(backend_error)?;

        // Rows arrive newest first
        for notification in fresh.iter().rev() {
            match global.format {
                OutputFormat::Json => {
                    let line = serde_json::to_string(notification)
                        .map_err(|e| miette::miette!("{}", e))?;
                    println!("{}", line);
                }
                _ => print_notification(notification),
            }
        }
        if let Some(newest) = fresh.first() {
            since = Some(newest.created_at);
        }
        std::thread::sleep(interval);
    }
}

fn run_send(args: SendArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let mut input = NewNotification::new(args.kind, args.title, args.message);
    if let Some(ref key) = args.user {
        let user = session.store.get_user(key).map_err(backend_error)?;
        input = input.to_user(user.id);
    }
    let delivered = session
        .store
        .create_notification(input)
        .map_err(backend_error)?;
    print_done(global, format!("Delivered to {} recipient(s)", style(delivered.len()).cyan()));
    Ok(())
}

fn run_prefs(args: PrefsArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::with_shop(global)?;
    let user = session.store.get_user(&args.user).map_err(backend_error)?;
    let prefs = session
        .store
        .effective_preferences(&user.id.to_string())
        .map_err(backend_error)?;

    let format = session.format(global, OutputFormat::Auto);
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        let map: indexmap::IndexMap<String, bool> = prefs
            .iter()
            .map(|(kind, enabled)| (kind.to_string(), *enabled))
            .collect();
        return print_structured(&map, format);
    }

    println!("{} {}", style("Notification preferences of").bold(), style(&user.name).yellow());
    for (kind, enabled) in prefs {
        let state = if enabled {
            style("on").green()
        } else {
            style("off").dim()
        };
        println!("  {:<22} {}", kind.to_string(), state);
    }
    Ok(())
}

fn run_set_pref(args: SetPrefArgs, global: &GlobalOpts) -> Result<()> {
    let mut session = Session::with_shop(global)?;
    let pref = session
        .store
        .set_preference(&args.user, args.kind, args.enabled)
        .map_err(backend_error)?;
    print_done(
        global,
        format!(
            "{} notifications {}",
            pref.notification_type,
            if pref.enabled { "on" } else { "off" }
        ),
    );
    Ok(())
}

fn print_notification(n: &Notification) {
    let marker = if n.is_read() {
        style("·").dim()
    } else {
        style("●").cyan()
    };
    println!(
        "{} {}  {}  {}",
        marker,
        style(n.created_at.format("%Y-%m-%d %H:%M")).dim(),
        style(&n.title).bold(),
        style(format!("[{}]", n.notification_type)).dim()
    );
    println!("  {}", n.message);
}
