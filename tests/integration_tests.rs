//! Integration tests for the garage CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Helper to get a garage command isolated from the user's environment
fn garage(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("garage").unwrap();
    cmd.current_dir(tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path().join("xdg"))
        .env_remove("GARAGE_SHOP")
        .env_remove("GARAGE_USER")
        .env_remove("GARAGE_WORKSPACE")
        .env_remove("GARAGE_CACHE_TTL")
        .env_remove("GARAGE_LOG");
    cmd
}

/// Helper to create a workspace with one selected shop
fn setup_workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    garage(&tmp)
        .args(["init", "--shop-name", "Oficina Central"])
        .assert()
        .success();
    tmp
}

/// Run a command with `--format id` and return the printed id
fn create(tmp: &TempDir, args: &[&str]) -> String {
    let output = garage(tmp).args(args).args(["-f", "id"]).output().unwrap();
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn json(tmp: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = garage(tmp).args(args).args(["-f", "json"]).output().unwrap();
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Decimals serialize as strings; accept numbers too
fn decimal(value: &serde_json::Value) -> Decimal {
    let text = value
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| value.to_string());
    text.parse().unwrap()
}

/// Customer, vehicle and one open order; returns the customer id
fn seed_order(tmp: &TempDir) -> String {
    let customer = create(tmp, &["customer", "new", "Ana Souza", "--phone", "11 98888-0000"]);
    let vehicle = create(
        tmp,
        &["vehicle", "new", "ABC1D23", "Fiat", "Uno", "--customer", &customer, "--year", "2012"],
    );
    create(
        tmp,
        &["order", "new", "Troca de óleo", "--vehicle", &vehicle, "--notes", "Técnico: João"],
    );
    customer
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    let tmp = TempDir::new().unwrap();
    garage(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("customer"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn test_init_creates_workspace() {
    let tmp = TempDir::new().unwrap();
    garage(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized garage workspace"));
    assert!(tmp.path().join(".garage").is_dir());
}

#[test]
fn test_init_twice_suggests_force() {
    let tmp = setup_workspace();
    garage(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_commands_outside_workspace_fail() {
    let tmp = TempDir::new().unwrap();
    garage(&tmp).args(["customer", "list"]).assert().failure();
}

#[test]
fn test_shop_scoped_command_without_shop_fails() {
    let tmp = TempDir::new().unwrap();
    garage(&tmp).arg("init").assert().success();
    garage(&tmp)
        .args(["customer", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no shop selected"));
}

// ============================================================================
// Shops
// ============================================================================

#[test]
fn test_init_with_shop_selects_it() {
    let tmp = setup_workspace();
    garage(&tmp)
        .args(["shop", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Oficina Central"));
    garage(&tmp)
        .args(["config", "show", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("SHOP-"));
}

#[test]
fn test_shops_are_isolated() {
    let tmp = setup_workspace();
    create(&tmp, &["customer", "new", "Ana Souza"]);
    garage(&tmp).args(["shop", "new", "Auto Norte"]).assert().success();

    garage(&tmp)
        .args(["--shop", "Auto Norte", "customer", "list", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));
    garage(&tmp)
        .args(["customer", "list", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));
}

// ============================================================================
// Customers and vehicles
// ============================================================================

#[test]
fn test_customer_new_and_list() {
    let tmp = setup_workspace();
    let id = create(&tmp, &["customer", "new", "Ana Souza", "--email", "ana@example.com"]);
    assert!(id.starts_with("CUST-"));

    garage(&tmp)
        .args(["customer", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana Souza"))
        .stdout(predicate::str::contains("1 customer(s) found."));
}

#[test]
fn test_customer_rejects_bad_email() {
    let tmp = setup_workspace();
    garage(&tmp)
        .args(["customer", "new", "Ana Souza", "--email", "not-an-email"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("email"));
}

#[test]
fn test_vehicle_rejects_bad_plate() {
    let tmp = setup_workspace();
    let customer = create(&tmp, &["customer", "new", "Ana Souza"]);
    garage(&tmp)
        .args(["vehicle", "new", "12-ABC", "Fiat", "Uno", "--customer", &customer])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plate"));
}

#[test]
fn test_customer_history_lists_vehicle_and_order() {
    let tmp = setup_workspace();
    let customer = seed_order(&tmp);
    let history = json(&tmp, &["customer", "history", &customer]);
    assert_eq!(history["vehicles"].as_array().unwrap().len(), 1);
    assert_eq!(history["orders"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Service orders
// ============================================================================

#[test]
fn test_order_items_update_total() {
    let tmp = setup_workspace();
    seed_order(&tmp);

    garage(&tmp)
        .args(["order", "add-item", "1", "Troca de óleo", "--service-type", "Revisão", "--price", "150"])
        .assert()
        .success();
    garage(&tmp)
        .args(["order", "add-item", "#1", "Alinhamento", "--qty", "2", "--price", "40,50"])
        .assert()
        .success();

    let order = json(&tmp, &["order", "show", "1"]);
    assert_eq!(decimal(&order["total_amount"]), Decimal::new(231, 0));
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
}

#[test]
fn test_order_status_follows_lifecycle() {
    let tmp = setup_workspace();
    seed_order(&tmp);

    garage(&tmp)
        .args(["order", "status", "1", "completed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot move service order"));

    for status in ["approved", "in_progress", "completed"] {
        garage(&tmp).args(["order", "status", "1", status]).assert().success();
    }

    let history = json(&tmp, &["order", "history", "1"]);
    assert_eq!(history.as_array().unwrap().len(), 4);

    garage(&tmp)
        .args(["order", "add-item", "1", "Extra", "--price", "10"])
        .assert()
        .failure();
}

#[test]
fn test_status_change_notifies() {
    let tmp = setup_workspace();
    seed_order(&tmp);
    garage(&tmp).args(["order", "status", "1", "approved"]).assert().success();

    let notifications = json(&tmp, &["notify", "list", "--type", "order_status"]);
    assert_eq!(notifications.as_array().unwrap().len(), 1);

    garage(&tmp)
        .args(["notify", "read-all"])
        .assert()
        .success();
    garage(&tmp)
        .args(["notify", "count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));
}

#[test]
fn test_disabled_preference_skips_user() {
    let tmp = setup_workspace();
    for (name, email) in [("Rui", "rui@oficina.com"), ("Eva", "eva@oficina.com")] {
        garage(&tmp)
            .args(["shop", "user", "add", name, email])
            .assert()
            .success();
    }

    garage(&tmp)
        .args(["notify", "set-pref", "eva@oficina.com", "order_status", "off"])
        .assert()
        .success();
    let prefs = json(&tmp, &["notify", "prefs", "eva@oficina.com"]);
    assert_eq!(prefs["order_status"], false);
    assert_eq!(prefs["low_stock"], true);

    garage(&tmp)
        .args(["notify", "send", "Pátio cheio", "Sem vagas hoje", "--type", "order_status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delivered to 1 recipient(s)"));
    garage(&tmp)
        .args(["notify", "count", "--user", "eva@oficina.com"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));
    garage(&tmp)
        .args(["notify", "count", "--user", "rui@oficina.com"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));
}

// ============================================================================
// Inventory
// ============================================================================

#[test]
fn test_part_item_takes_stock_and_warns() {
    let tmp = setup_workspace();
    seed_order(&tmp);
    create(&tmp, &["part", "new", "FLT-01", "Filtro de óleo", "--price", "30", "--min", "2"]);

    garage(&tmp)
        .args(["stock", "move", "FLT-01", "entry", "5", "--reason", "Compra"])
        .assert()
        .success();
    garage(&tmp)
        .args(["order", "add-item", "1", "--part", "FLT-01", "--qty", "4"])
        .assert()
        .success();

    let part = json(&tmp, &["part", "show", "FLT-01"]);
    assert_eq!(decimal(&part["quantity"]), Decimal::ONE);

    let order = json(&tmp, &["order", "show", "1"]);
    assert_eq!(decimal(&order["total_amount"]), Decimal::new(120, 0));

    let warnings = json(&tmp, &["notify", "list", "--type", "low_stock"]);
    assert_eq!(warnings.as_array().unwrap().len(), 1);

    garage(&tmp)
        .args(["part", "list", "--low-stock", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));
}

#[test]
fn test_stock_exit_beyond_on_hand_fails() {
    let tmp = setup_workspace();
    create(&tmp, &["part", "new", "PST-01", "Pastilha de freio"]);
    garage(&tmp)
        .args(["stock", "move", "PST-01", "exit", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient stock"));
}

// ============================================================================
// Reports
// ============================================================================

const ALL_TIME: [&str; 4] = ["--from", "2000-01-01", "--to", "2100-12-31"];

#[test]
fn test_report_summary_json() {
    let tmp = setup_workspace();
    seed_order(&tmp);
    garage(&tmp)
        .args(["order", "add-item", "1", "Revisão completa", "--price", "300"])
        .assert()
        .success();

    let mut args = vec!["report", "summary"];
    args.extend(ALL_TIME);
    let report = json(&tmp, &args);
    assert_eq!(report["summary"]["total_orders"], 1);
    assert_eq!(decimal(&report["summary"]["total_revenue"]), Decimal::new(300, 0));
    assert_eq!(report["technicians"][0]["name"], "João");
}

#[test]
fn test_report_rejects_inverted_period() {
    let tmp = setup_workspace();
    garage(&tmp)
        .args(["report", "summary", "--from", "2024-06-30", "--to", "2024-06-01"])
        .assert()
        .failure();
}

#[test]
fn test_report_export_csv_and_pdf() {
    let tmp = setup_workspace();
    seed_order(&tmp);
    let out = tmp.path().join("out");

    let mut args = vec!["report", "export", "csv", "--output", out.to_str().unwrap()];
    args.extend(ALL_TIME);
    garage(&tmp).args(&args).assert().success();
    let csv_files = std::fs::read_dir(&out).unwrap().count();
    assert_eq!(csv_files, 8);

    let pdf = tmp.path().join("report.pdf");
    let mut args = vec!["report", "export", "pdf", "--output", pdf.to_str().unwrap()];
    args.extend(ALL_TIME);
    garage(&tmp).args(&args).assert().success();
    let bytes = std::fs::read(&pdf).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_set_rejects_unknown_key() {
    let tmp = setup_workspace();
    garage(&tmp)
        .args(["config", "set", "editor", "vim"])
        .assert()
        .failure();
    garage(&tmp)
        .args(["config", "set", "currency", "USD"])
        .assert()
        .success();
    garage(&tmp)
        .args(["config", "show", "currency"])
        .assert()
        .success()
        .stdout(predicate::str::diff("USD\n"));
}

#[test]
fn test_completions_generate() {
    let tmp = TempDir::new().unwrap();
    garage(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("garage"));
}
