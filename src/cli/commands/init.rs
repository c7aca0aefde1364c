//! `garage init` command - Initialize a new workspace

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::config::write_config_value;
use crate::cli::helpers::backend_error;
use crate::cli::GlobalOpts;
use crate::core::{Config, Workspace, WorkspaceError};
use crate::entities::NewShop;
use crate::store::Store;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Create a first shop with this name and select it
    #[arg(long = "shop-name")]
    pub shop_name: Option<String>,

    /// Force initialization even if .garage/ already exists (keeps the database)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        if !global.quiet {
            println!(
                "{} Created directory {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
    }

    let workspace = if args.force {
        Workspace::init_force(&path)
    } else {
        Workspace::init(&path)
    };

    let workspace = match workspace {
        Ok(workspace) => workspace,
        Err(WorkspaceError::AlreadyExists(path)) => {
            println!(
                "{} Garage workspace already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!("Use {} to reinitialize", style("garage init --force").yellow());
            return Ok(());
        }
        Err(e) => return Err(miette::miette!("{}", e)),
    };

    // Opening the store creates the schema
    let config = Config::load(Some(&workspace));
    let mut store = Store::open(&workspace, &config).map_err(backend_error)?;
    tracing::info!(root = %workspace.root().display(), "initialized workspace");

    println!(
        "{} Initialized garage workspace at {}",
        style("✓").green(),
        style(workspace.root().display()).cyan()
    );

    if let Some(name) = args.shop_name {
        let shop = store
            .create_shop(NewShop {
                name,
                ..Default::default()
            })
            .map_err(backend_error)?;
        write_config_value(
            &workspace.config_path(),
            "shop",
            serde_yml::Value::String(shop.id.to_string()),
        )?;
        println!(
            "{} Created shop {} ({})",
            style("✓").green(),
            style(&shop.name).yellow(),
            style(&shop.id).cyan()
        );
    }

    if !global.quiet {
        println!();
        println!("Next steps:");
        println!("  {} Register a shop", style("garage shop new <name>").yellow());
        println!("  {} Select it for later commands", style("garage shop use <name>").yellow());
        println!("  {} Add your first customer", style("garage customer new").yellow());
    }
    Ok(())
}
