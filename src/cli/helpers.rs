//! Shared helper functions for CLI commands
//!
//! Workspace and shop resolution, error reporting and the small text
//! formatting routines every command module uses.

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use miette::{Diagnostic, IntoDiagnostic, Result};
use rust_decimal::Decimal;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Config, Workspace};
use crate::entities::Shop;
use crate::store::Store;

/// An opened workspace with its merged config and database handle
pub struct Session {
    pub workspace: Workspace,
    pub config: Config,
    pub store: Store,
    /// The selected shop, when the command needs one
    pub shop: Option<Shop>,
}

impl Session {
    /// Open the workspace database without selecting a shop
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let workspace = find_workspace(global)?;
        let config = Config::load(Some(&workspace));
        let store = Store::open(&workspace, &config).map_err(backend_error)?;
        tracing::debug!(root = %workspace.root().display(), "opened workspace");

        Ok(Self {
            workspace,
            config,
            store,
            shop: None,
        })
    }

    /// Open the workspace and select the shop from `--shop`, then config
    /// (which already folds in `GARAGE_SHOP`)
    pub fn with_shop(global: &GlobalOpts) -> Result<Self> {
        let mut session = Self::open(global)?;
        let key = global
            .shop
            .clone()
            .or_else(|| session.config.shop.clone())
            .filter(|k| !k.trim().is_empty());
        let Some(key) = key else {
            return Err(backend_error(crate::core::StoreError::NoShopSelected));
        };
        let shop = session.store.select_shop(&key).map_err(backend_error)?;
        session.shop = Some(shop);
        Ok(session)
    }

    pub fn shop_name(&self) -> &str {
        self.shop.as_ref().map_or("", |s| s.name.as_str())
    }

    /// Output format for a command, honoring `default_format` from config
    pub fn format(&self, global: &GlobalOpts, auto: OutputFormat) -> OutputFormat {
        resolve_format(global.format, self.config.default_format.as_deref(), auto)
    }
}

/// The workspace named by `--workspace`, or the one enclosing the current directory
pub fn find_workspace(global: &GlobalOpts) -> Result<Workspace> {
    match global.workspace {
        Some(ref root) => Workspace::at(root),
        None => Workspace::discover(),
    }
    .map_err(|e| miette::miette!("{}", e))
}

/// Pick the effective output format; `auto` is used when neither the flag
/// nor the config names one
pub fn resolve_format(flag: OutputFormat, configured: Option<&str>, auto: OutputFormat) -> OutputFormat {
    let chosen = match flag {
        OutputFormat::Auto => configured
            .and_then(|f| f.parse::<OutputFormat>().ok())
            .unwrap_or(OutputFormat::Auto),
        f => f,
    };
    match chosen {
        OutputFormat::Auto => auto,
        f => f,
    }
}

/// Log a failed backend call and turn it into a report for the user
pub fn backend_error<E>(e: E) -> miette::Report
where
    E: Diagnostic + Send + Sync + 'static,
{
    tracing::error!(error = %e, "command failed");
    miette::Report::new(e)
}

/// Ask before destroying data; `--yes` skips the prompt
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .into_diagnostic()
}

/// Prompt for one text field; blank answers become `None` unless required
pub fn prompt_text(label: &str, required: bool) -> Result<Option<String>> {
    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(label)
        .allow_empty(!required)
        .interact_text()
        .into_diagnostic()?;
    let answer = answer.trim().to_string();
    Ok((!answer.is_empty()).then_some(answer))
}

/// Print a serializable value as JSON or YAML
pub fn print_structured<T: serde::Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
        }
        _ => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
        }
    }
    Ok(())
}

/// Green check line used after successful mutations
pub fn print_done(global: &GlobalOpts, message: impl std::fmt::Display) {
    if !global.quiet {
        println!("{} {}", style("✓").green(), message);
    }
}

/// `Label: value` line for show output, skipped when the value is absent
pub fn print_field(label: &str, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        println!("{}: {}", style(label).bold(), v);
    }
}

/// Money with two decimals and the currency label
pub fn format_money(amount: Decimal, currency: &str) -> String {
    format!("{} {:.2}", currency, amount.round_dp(2))
}

/// Quantity without trailing zeros
pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

/// Shorten an id for table display
///
/// IDs longer than 16 characters are truncated to 13 chars with "..." suffix.
pub fn format_short_id_str(id: &str) -> String {
    if id.chars().count() > 16 {
        let head: String = id.chars().take(13).collect();
        format!("{}...", head)
    } else {
        id.to_string()
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Parse a money or quantity argument ("12.50" or "12,50")
pub fn parse_decimal(s: &str) -> std::result::Result<Decimal, String> {
    s.trim()
        .replace(',', ".")
        .parse::<Decimal>()
        .map_err(|_| format!("'{}' is not a number", s))
}

/// Parse a calendar date argument in YYYY-MM-DD form
pub fn parse_date(s: &str) -> std::result::Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a date (expected YYYY-MM-DD)", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_format_short_id_str() {
        assert_eq!(format_short_id_str("SHORT"), "SHORT");
        assert_eq!(format_short_id_str("CUST-01J123456789ABCDEF123456"), "CUST-01J12345...");
    }

    #[test]
    fn test_truncate_str_counts_characters() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("Conceição Araújo", 9), "Concei...");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("with\nnewline"), "\"with\nnewline\"");
    }

    #[test]
    fn test_money_and_quantity() {
        assert_eq!(format_money(dec("1234.5"), "BRL"), "BRL 1234.50");
        assert_eq!(format_quantity(dec("2.000")), "2");
        assert_eq!(format_quantity(dec("0.250")), "0.25");
    }

    #[test]
    fn test_parse_decimal_accepts_comma() {
        assert_eq!(parse_decimal("12,50").unwrap(), dec("12.50"));
        assert!(parse_decimal("abc").is_err());
    }

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format(OutputFormat::Auto, None, OutputFormat::Tsv), OutputFormat::Tsv);
        assert_eq!(resolve_format(OutputFormat::Auto, Some("json"), OutputFormat::Tsv), OutputFormat::Json);
        assert_eq!(resolve_format(OutputFormat::Csv, Some("json"), OutputFormat::Tsv), OutputFormat::Csv);
        assert_eq!(resolve_format(OutputFormat::Auto, Some("bogus"), OutputFormat::Yaml), OutputFormat::Yaml);
    }
}
