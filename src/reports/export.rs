//! Spreadsheet export, one CSV file per report section

use std::io::Write;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use super::ReportData;

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("cannot write {path}: {message}")]
    #[diagnostic(code(garage::export::io))]
    Io { path: PathBuf, message: String },

    #[error("CSV error: {0}")]
    #[diagnostic(code(garage::export::csv))]
    Csv(#[from] csv::Error),
}

impl ExportError {
    fn io(path: &Path, e: std::io::Error) -> Self {
        ExportError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }
}

/// A table of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportSection {
    Summary,
    Monthly,
    Status,
    Customers,
    Vehicles,
    Technicians,
    Services,
    Orders,
}

impl ReportSection {
    pub fn all() -> &'static [ReportSection] {
        &[
            ReportSection::Summary,
            ReportSection::Monthly,
            ReportSection::Status,
            ReportSection::Customers,
            ReportSection::Vehicles,
            ReportSection::Technicians,
            ReportSection::Services,
            ReportSection::Orders,
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportSection::Summary => "Summary",
            ReportSection::Monthly => "Revenue by Month",
            ReportSection::Status => "Orders by Status",
            ReportSection::Customers => "Customers",
            ReportSection::Vehicles => "Vehicles",
            ReportSection::Technicians => "Technicians",
            ReportSection::Services => "Service Types",
            ReportSection::Orders => "Orders",
        }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            ReportSection::Summary => &["Metric", "Value"],
            ReportSection::Monthly => &["Month", "Orders", "Revenue"],
            ReportSection::Status => &["Status", "Orders"],
            ReportSection::Customers => &["Customer", "Orders", "Revenue", "Last Service"],
            ReportSection::Vehicles => &[
                "Plate",
                "Vehicle",
                "Customer",
                "Orders",
                "Revenue",
                "Last Service",
            ],
            ReportSection::Technicians => &["Technician", "Orders", "Revenue", "Last Service"],
            ReportSection::Services => &[
                "Service Type",
                "Description",
                "Occurrences",
                "Quantity",
                "Revenue",
            ],
            ReportSection::Orders => &[
                "Order",
                "Date",
                "Customer",
                "Plate",
                "Status",
                "Technician",
                "Items",
                "Discount",
                "Total",
            ],
        }
    }

    /// Data rows as text cells, in header order
    pub fn rows(&self, data: &ReportData) -> Vec<Vec<String>> {
        match self {
            ReportSection::Summary => {
                let s = &data.summary;
                vec![
                    vec!["Period".into(), data.period.to_string()],
                    vec!["Total revenue".into(), s.total_revenue.to_string()],
                    vec!["Billable orders".into(), s.order_count.to_string()],
                    vec!["Average ticket".into(), s.average_ticket.to_string()],
                    vec!["Total orders".into(), s.total_orders.to_string()],
                    vec!["Completed orders".into(), s.completed_orders.to_string()],
                    vec!["Canceled orders".into(), s.canceled_orders.to_string()],
                ]
            }
            ReportSection::Monthly => data
                .revenue_by_month
                .iter()
                .map(|m| vec![m.month.clone(), m.order_count.to_string(), m.revenue.to_string()])
                .collect(),
            ReportSection::Status => data
                .status_counts
                .iter()
                .map(|s| vec![s.status.label().to_string(), s.count.to_string()])
                .collect(),
            ReportSection::Customers => data
                .customers
                .iter()
                .map(|c| {
                    vec![
                        c.name.clone(),
                        c.order_count.to_string(),
                        c.revenue.to_string(),
                        c.last_service.to_string(),
                    ]
                })
                .collect(),
            ReportSection::Vehicles => data
                .vehicles
                .iter()
                .map(|v| {
                    vec![
                        v.plate.clone(),
                        v.vehicle.clone(),
                        v.customer_name.clone(),
                        v.order_count.to_string(),
                        v.revenue.to_string(),
                        v.last_service.to_string(),
                    ]
                })
                .collect(),
            ReportSection::Technicians => data
                .technicians
                .iter()
                .map(|t| {
                    vec![
                        t.name.clone(),
                        t.order_count.to_string(),
                        t.revenue.to_string(),
                        t.last_service.to_string(),
                    ]
                })
                .collect(),
            ReportSection::Services => data
                .service_types
                .iter()
                .map(|s| {
                    vec![
                        s.service_type.clone(),
                        s.description.clone(),
                        s.occurrences.to_string(),
                        s.quantity.to_string(),
                        s.revenue.to_string(),
                    ]
                })
                .collect(),
            ReportSection::Orders => data
                .orders
                .iter()
                .map(|o| {
                    vec![
                        format!("#{}", o.order_number),
                        o.date.to_string(),
                        o.customer.clone(),
                        o.plate.clone(),
                        o.status.label().to_string(),
                        o.technician.clone(),
                        o.items.to_string(),
                        o.discount.to_string(),
                        o.total.to_string(),
                    ]
                })
                .collect(),
        }
    }

    /// Write the section as CSV; the header row is written even when empty
    pub fn write_csv<W: Write>(&self, data: &ReportData, writer: W) -> Result<(), ExportError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.headers())?;
        for row in self.rows(data) {
            csv.write_record(&row)?;
        }
        csv.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn to_csv(&self, data: &ReportData) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write_csv(data, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl std::fmt::Display for ReportSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReportSection::Summary => "summary",
            ReportSection::Monthly => "monthly",
            ReportSection::Status => "status",
            ReportSection::Customers => "customers",
            ReportSection::Vehicles => "vehicles",
            ReportSection::Technicians => "technicians",
            ReportSection::Services => "services",
            ReportSection::Orders => "orders",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ReportSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportSection::all()
            .iter()
            .find(|section| section.to_string() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| format!("unknown report section: {}", s))
    }
}

/// Write `<prefix>-<section>.csv` for each section into `dir`
pub fn export_csv_dir(
    data: &ReportData,
    sections: &[ReportSection],
    dir: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;
    let mut written = Vec::with_capacity(sections.len());
    for section in sections {
        let path = dir.join(format!("{}-{}.csv", prefix, section));
        let file = std::fs::File::create(&path).map_err(|e| ExportError::io(&path, e))?;
        section.write_csv(data, std::io::BufWriter::new(file))?;
        tracing::debug!(path = %path.display(), %section, "wrote csv section");
        written.push(path);
    }
    Ok(written)
}

/// Write `bytes` to `path`, creating parent directories
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| ExportError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::{EntityId, EntityPrefix};
    use crate::entities::OrderStatus;
    use crate::reports::fixtures::Fixture;
    use crate::reports::{aggregate, DateRange};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn report() -> ReportData {
        let period = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
        .unwrap();
        let mut fx = Fixture::new();
        let c = EntityId::new(EntityPrefix::Cust);
        let v = EntityId::new(EntityPrefix::Veh);
        let records = vec![fx.record(
            (&c, "Silva, João"),
            (&v, "BRA2E19"),
            "2024-06-03",
            OrderStatus::Completed,
            Some("Técnico: Rui"),
            &[("Elétrica", "Bateria", "480.00")],
        )];
        aggregate(period, &records)
    }

    #[test]
    fn test_section_names_parse() {
        for section in ReportSection::all() {
            assert_eq!(section.to_string().parse::<ReportSection>().unwrap(), *section);
        }
        assert!("nope".parse::<ReportSection>().is_err());
    }

    #[test]
    fn test_customers_csv_quotes_commas() {
        let csv = ReportSection::Customers.to_csv(&report()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Customer,Orders,Revenue,Last Service"));
        assert_eq!(lines.next(), Some("\"Silva, João\",1,480.00,2024-06-03"));
    }

    #[test]
    fn test_empty_section_keeps_header() {
        let mut data = report();
        data.vehicles.clear();
        let csv = ReportSection::Vehicles.to_csv(&data).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_export_dir_writes_one_file_per_section() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("exports");
        let files = export_csv_dir(&report(), ReportSection::all(), &out, "2024-06").unwrap();
        assert_eq!(files.len(), ReportSection::all().len());
        assert!(out.join("2024-06-technicians.csv").exists());
        let orders = std::fs::read_to_string(out.join("2024-06-orders.csv")).unwrap();
        assert!(orders.contains("#1,2024-06-03"));
        assert!(orders.contains("Rui"));
    }
}
