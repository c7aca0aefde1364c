//! `garage config` command - Configuration management
//!
//! Values are read from the global file, the workspace file and the
//! environment, in that order of increasing priority.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::helpers::find_workspace;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::CONFIG_KEYS;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration values
    Show(ShowArgs),

    /// Set a configuration value
    Set(SetArgs),

    /// Remove a configuration value
    Unset(UnsetArgs),

    /// Show paths to configuration files
    Path,

    /// List all available configuration keys
    Keys,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Show only this key's value
    pub key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Configuration key (e.g., shop, user, currency)
    pub key: String,

    /// Value to set
    pub value: String,

    /// Set in global (user) config instead of workspace config
    #[arg(long, short = 'g')]
    pub global: bool,
}

#[derive(clap::Args, Debug)]
pub struct UnsetArgs {
    /// Configuration key to remove
    pub key: String,

    /// Remove from global (user) config instead of workspace config
    #[arg(long, short = 'g')]
    pub global: bool,
}

/// Run a config subcommand
pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => run_show(args, global),
        ConfigCommands::Set(args) => run_set(args, global),
        ConfigCommands::Unset(args) => run_unset(args, global),
        ConfigCommands::Path => run_path(global),
        ConfigCommands::Keys => run_keys(),
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = find_workspace(global).ok();
    let config = Config::load(workspace.as_ref());

    if let Some(key) = &args.key {
        check_key(key)?;
        return match config.get(key) {
            Some(v) => {
                println!("{}", v);
                Ok(())
            }
            None => Err(miette::miette!("Key '{}' is not set", key)),
        };
    }

    println!("{}", style("Effective Configuration").bold().underlined());
    println!();
    for (key, _) in CONFIG_KEYS {
        match config.get(key) {
            Some(v) => println!("  {}: {}", style(key).cyan(), style(v).yellow()),
            None => println!("  {}: {}", style(key).cyan(), style("(not set)").dim()),
        }
    }

    println!();
    println!("{}", style("Config Sources (in priority order):").dim());
    println!("  1. Command line flags (--shop, --format)");
    println!("  2. Environment variables (GARAGE_SHOP, GARAGE_USER, GARAGE_CACHE_TTL)");
    println!("  3. Workspace config (.garage/config.yaml)");
    println!("  4. Global config (~/.config/garage/config.yaml)");
    Ok(())
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let path = target_path(args.global, global)?;
    let value = typed_value(&args.key, &args.value)?;
    write_config_value(&path, &args.key, value)?;

    let scope = if args.global { "global" } else { "workspace" };
    println!(
        "{} Set {} {} {} in {} config",
        style("✓").green(),
        style(&args.key).cyan(),
        style("→").dim(),
        style(&args.value).yellow(),
        scope
    );
    Ok(())
}

fn run_unset(args: UnsetArgs, global: &GlobalOpts) -> Result<()> {
    let path = target_path(args.global, global)?;
    let mut map = read_mapping(&path)?;
    if map.remove(&serde_yml::Value::String(args.key.clone())).is_none() {
        return Err(miette::miette!("Key '{}' not found in config", args.key));
    }
    write_mapping(&path, map)?;

    let scope = if args.global { "global" } else { "workspace" };
    println!(
        "{} Removed {} from {} config",
        style("✓").green(),
        style(&args.key).cyan(),
        scope
    );
    Ok(())
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    println!("{}", style("Configuration file paths:").bold());
    println!();

    match Config::global_config_path() {
        Some(path) => print_path("Global:", &path),
        None => println!("  {} {}", style("Global:").cyan(), style("(unavailable)").dim()),
    }

    println!();
    match find_workspace(global) {
        Ok(workspace) => print_path("Workspace:", &workspace.config_path()),
        Err(_) => println!(
            "  {} {}",
            style("Workspace:").cyan(),
            style("(not in a garage workspace)").dim()
        ),
    }
    Ok(())
}

fn run_keys() -> Result<()> {
    println!("{}", style("Available configuration keys:").bold());
    println!();
    for (key, description) in CONFIG_KEYS {
        println!("  {:<24} {}", style(key).cyan(), style(description).dim());
    }
    println!();
    println!(
        "{}",
        style("Use 'garage config set <key> <value>' to set a value.").dim()
    );
    Ok(())
}

fn print_path(label: &str, path: &Path) {
    println!("  {} {}", style(label).cyan(), path.display());
    if path.exists() {
        println!("    {}", style("(exists)").green());
    } else {
        println!("    {}", style("(not created)").dim());
    }
}

fn check_key(key: &str) -> Result<()> {
    if CONFIG_KEYS.iter().any(|(k, _)| *k == key) {
        Ok(())
    } else {
        Err(miette::miette!(
            help = "run 'garage config keys' to list valid keys",
            "Unknown configuration key '{}'",
            key
        ))
    }
}

fn target_path(global_scope: bool, global: &GlobalOpts) -> Result<PathBuf> {
    if global_scope {
        Config::global_config_path()
            .ok_or_else(|| miette::miette!("Could not determine global config directory"))
    } else {
        Ok(find_workspace(global)?.config_path())
    }
}

/// Convert a command line value to the YAML type the key expects
fn typed_value(key: &str, value: &str) -> Result<serde_yml::Value> {
    check_key(key)?;
    match key {
        "cache_ttl_secs" => value
            .trim()
            .parse::<u64>()
            .map(|n| serde_yml::Value::Number(n.into()))
            .map_err(|_| miette::miette!("'{}' must be a whole number of seconds", key)),
        "low_stock_notifications" => value
            .trim()
            .parse::<bool>()
            .map(serde_yml::Value::Bool)
            .map_err(|_| miette::miette!("'{}' must be true or false", key)),
        "default_format" => value
            .parse::<OutputFormat>()
            .map(|_| serde_yml::Value::String(value.trim().to_lowercase()))
            .map_err(|e| miette::miette!("{}", e)),
        _ => Ok(serde_yml::Value::String(value.to_string())),
    }
}

fn read_mapping(path: &Path) -> Result<serde_yml::Mapping> {
    if !path.exists() {
        return Ok(serde_yml::Mapping::new());
    }
    let content = fs::read_to_string(path).into_diagnostic()?;
    match serde_yml::from_str::<serde_yml::Value>(&content) {
        Ok(serde_yml::Value::Mapping(map)) => Ok(map),
        Ok(_) => Ok(serde_yml::Mapping::new()),
        Err(e) => Err(miette::miette!("Cannot parse {}: {}", path.display(), e)),
    }
}

fn write_mapping(path: &Path, map: serde_yml::Mapping) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).into_diagnostic()?;
    }
    let yaml = serde_yml::to_string(&serde_yml::Value::Mapping(map)).into_diagnostic()?;
    fs::write(path, yaml).into_diagnostic()
}

/// Set one key in a config file, keeping the others
pub(crate) fn write_config_value(path: &Path, key: &str, value: serde_yml::Value) -> Result<()> {
    let mut map = read_mapping(path)?;
    map.insert(serde_yml::Value::String(key.to_string()), value);
    write_mapping(path, map)?;
    tracing::debug!(path = %path.display(), key, "updated config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_typed_values() {
        assert_eq!(
            typed_value("cache_ttl_secs", "60").unwrap(),
            serde_yml::Value::Number(60u64.into())
        );
        assert_eq!(
            typed_value("low_stock_notifications", "false").unwrap(),
            serde_yml::Value::Bool(false)
        );
        assert!(typed_value("cache_ttl_secs", "soon").is_err());
        assert!(typed_value("default_format", "xml").is_err());
        assert!(typed_value("editor", "vim").is_err());
    }

    #[test]
    fn test_write_keeps_other_keys_and_loads_back() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "# comment only\n").unwrap();

        write_config_value(&path, "currency", serde_yml::Value::String("USD".into())).unwrap();
        write_config_value(&path, "cache_ttl_secs", typed_value("cache_ttl_secs", "30").unwrap())
            .unwrap();

        let config = Config::load_from(None, Some(&path));
        assert_eq!(config.currency(), "USD");
        if std::env::var("GARAGE_CACHE_TTL").is_err() {
            assert_eq!(config.cache_ttl_secs, Some(30));
        }
    }
}
