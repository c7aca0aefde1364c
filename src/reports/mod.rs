//! Revenue and activity reports
//!
//! A report is built in three steps:
//!
//! 1. **Fetch** every service order created inside a [`DateRange`], joined
//!    with its customer, vehicle and line items ([`ReportRecord`]).
//! 2. **Filter** the records in memory with [`ReportFilters`].
//! 3. **Aggregate** them in a single pass into a [`ReportData`].
//!
//! [`compare`] runs the same pipeline over the preceding window of equal
//! length. Results export to CSV, PDF, markdown and JSON.

pub mod aggregate;
pub mod comparison;
pub mod export;
pub mod markdown;
pub mod pdf;
pub mod technician;

use chrono::{Datelike, Duration, NaiveDate};
use miette::Diagnostic;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::core::identity::EntityId;
use crate::entities::{OrderStatus, ServiceItem, ServiceOrder};
use crate::store::{Store, StoreError};

pub use aggregate::{aggregate, ReportData};
pub use comparison::{compare_data, percent_change, ComparisonReport};
pub use export::{ExportError, ReportSection};

/// Problems with report parameters
#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error("report period starts on {from} after it ends on {to}")]
    #[diagnostic(code(garage::report::period), help("swap --from and --to"))]
    InvertedRange { from: NaiveDate, to: NaiveDate },

    #[error("report period of {days} days is outside the supported calendar")]
    #[diagnostic(code(garage::report::period), help("use a shorter --days value"))]
    OutOfRange { days: i64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Inclusive calendar range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ReportError> {
        if from > to {
            return Err(ReportError::InvertedRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// The `days` days ending on `today`
    pub fn last_days(today: NaiveDate, days: u32) -> Result<Self, ReportError> {
        let days = i64::from(days.max(1));
        let from = Duration::try_days(days - 1)
            .and_then(|span| today.checked_sub_signed(span))
            .ok_or(ReportError::OutOfRange { days })?;
        Ok(Self { from, to: today })
    }

    /// First day of the month up to `today`
    pub fn month_to_date(today: NaiveDate) -> Self {
        Self {
            from: today.with_day(1).unwrap_or(today),
            to: today,
        }
    }

    /// Number of calendar days covered
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Window of the same length ending the day before this one starts
    pub fn previous(&self) -> Result<Self, ReportError> {
        let days = self.days();
        let to = self.from.pred_opt().ok_or(ReportError::OutOfRange { days })?;
        let from = Duration::try_days(days - 1)
            .and_then(|span| to.checked_sub_signed(span))
            .ok_or(ReportError::OutOfRange { days })?;
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// A service order with the joined data reports need
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub order: ServiceOrder,
    pub customer_name: String,
    pub vehicle_plate: String,
    /// "Make Model (Year)"
    pub vehicle_name: String,
    pub items: Vec<ServiceItem>,
}

impl ReportRecord {
    pub fn created_on(&self) -> NaiveDate {
        self.order.created_at.date_naive()
    }

    /// Canceled orders never count toward revenue
    pub fn counts_as_revenue(&self) -> bool {
        self.order.status != OrderStatus::Canceled
    }
}

/// Optional narrowing applied after the date range
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportFilters {
    pub customer_id: Option<EntityId>,
    pub vehicle_id: Option<EntityId>,
    pub status: Option<OrderStatus>,
    /// Matches an item's service type, case-insensitive
    pub service_type: Option<String>,
    /// Inclusive bounds on the order total
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl ReportFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &ReportRecord) -> bool {
        let order = &record.order;
        if self.customer_id.as_ref().is_some_and(|c| *c != order.customer_id) {
            return false;
        }
        if self.vehicle_id.as_ref().is_some_and(|v| *v != order.vehicle_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != order.status) {
            return false;
        }
        if self.min_amount.is_some_and(|min| order.total_amount < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| order.total_amount > max) {
            return false;
        }
        if let Some(ref wanted) = self.service_type {
            let wanted = wanted.trim().to_lowercase();
            if !record
                .items
                .iter()
                .any(|item| item.category().to_lowercase() == wanted)
            {
                return false;
            }
        }
        true
    }
}

/// Fetch, filter and aggregate one period
pub fn build(
    store: &Store,
    period: DateRange,
    filters: &ReportFilters,
) -> Result<ReportData, ReportError> {
    let records = store.report_records(period.from, period.to)?;
    let fetched = records.len();
    let selected: Vec<ReportRecord> = records.into_iter().filter(|r| filters.matches(r)).collect();
    tracing::debug!(%period, fetched, selected = selected.len(), "building report");
    Ok(aggregate(period, &selected))
}

/// Build the period and the one before it, with percentage deltas
pub fn compare(
    store: &Store,
    period: DateRange,
    filters: &ReportFilters,
) -> Result<ComparisonReport, ReportError> {
    let current = build(store, period, filters)?;
    let previous = build(store, period.previous()?, filters)?;
    Ok(compare_data(current, previous))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::ReportRecord;
    use crate::core::identity::{EntityId, EntityPrefix};
    use crate::entities::{
        ItemType, NewServiceItem, NewServiceOrder, OrderStatus, ServiceItem, ServiceOrder,
    };

    pub struct Fixture {
        pub shop: EntityId,
        pub next_number: i64,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                shop: EntityId::new(EntityPrefix::Shop),
                next_number: 1,
            }
        }

        /// Order on `date` ("YYYY-MM-DD") with one item per (type, description, total)
        #[allow(clippy::too_many_arguments)]
        pub fn record(
            &mut self,
            customer: (&EntityId, &str),
            vehicle: (&EntityId, &str),
            date: &str,
            status: OrderStatus,
            notes: Option<&str>,
            items: &[(&str, &str, &str)],
        ) -> ReportRecord {
            let day = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
            let created = Utc
                .from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap());
            let mut order = ServiceOrder::new(
                self.shop.clone(),
                self.next_number,
                customer.0.clone(),
                vehicle.0.clone(),
                NewServiceOrder {
                    description: "Serviço".into(),
                    notes: notes.map(String::from),
                    ..Default::default()
                },
            );
            self.next_number += 1;
            order.status = status;
            order.created_at = created;

            let items: Vec<ServiceItem> = items
                .iter()
                .map(|(service_type, description, total)| {
                    ServiceItem::new(
                        self.shop.clone(),
                        order.id.clone(),
                        NewServiceItem {
                            item_type: ItemType::Service,
                            service_type: Some(service_type.to_string()),
                            description: description.to_string(),
                            quantity: Decimal::ONE,
                            unit_price: total.parse().unwrap(),
                            part_id: None,
                        },
                    )
                })
                .collect();
            order.total_amount = ServiceOrder::compute_total(&items, Decimal::ZERO).unwrap();

            ReportRecord {
                order,
                customer_name: customer.1.to_string(),
                vehicle_plate: vehicle.1.to_string(),
                vehicle_name: "Fiat Uno".to_string(),
                items,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::Fixture;
    use super::*;
    use crate::core::identity::EntityPrefix;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_previous_period_has_equal_length() {
        let march = DateRange::new(date("2024-03-01"), date("2024-03-31")).unwrap();
        let prev = march.previous().unwrap();
        assert_eq!(prev.to, date("2024-02-29"));
        assert_eq!(prev.days(), 31);
        assert_eq!(prev.from, date("2024-01-30"));
    }

    #[test]
    fn test_single_day_range() {
        let day = DateRange::new(date("2024-05-10"), date("2024-05-10")).unwrap();
        assert_eq!(day.days(), 1);
        assert_eq!(day.previous().unwrap(), DateRange::new(date("2024-05-09"), date("2024-05-09")).unwrap());
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            DateRange::new(date("2024-05-10"), date("2024-05-01")),
            Err(ReportError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_last_days_and_month_to_date() {
        let today = date("2024-05-10");
        assert_eq!(DateRange::last_days(today, 7).unwrap().from, date("2024-05-04"));
        assert_eq!(DateRange::last_days(today, 0).unwrap().from, today);
        assert_eq!(DateRange::month_to_date(today).from, date("2024-05-01"));
    }

    #[test]
    fn test_huge_windows_are_errors() {
        let today = date("2024-05-10");
        assert!(matches!(
            DateRange::last_days(today, u32::MAX),
            Err(ReportError::OutOfRange { .. })
        ));

        let earliest = DateRange::new(NaiveDate::MIN, date("2024-05-10")).unwrap();
        assert!(matches!(earliest.previous(), Err(ReportError::OutOfRange { .. })));
    }

    #[test]
    fn test_filters() {
        let mut fx = Fixture::new();
        let ana = EntityId::new(EntityPrefix::Cust);
        let bob = EntityId::new(EntityPrefix::Cust);
        let car = EntityId::new(EntityPrefix::Veh);
        let record = fx.record(
            (&ana, "Ana"),
            (&car, "ABC1234"),
            "2024-05-02",
            OrderStatus::Completed,
            None,
            &[("Revisão", "Troca de óleo", "150.00")],
        );

        assert!(ReportFilters::default().matches(&record));
        assert!(ReportFilters { customer_id: Some(ana.clone()), ..Default::default() }.matches(&record));
        assert!(!ReportFilters { customer_id: Some(bob), ..Default::default() }.matches(&record));
        assert!(ReportFilters { service_type: Some("REVISÃO".into()), ..Default::default() }.matches(&record));
        assert!(!ReportFilters { service_type: Some("Freios".into()), ..Default::default() }.matches(&record));
        assert!(ReportFilters {
            min_amount: Some("150".parse().unwrap()),
            max_amount: Some("150".parse().unwrap()),
            ..Default::default()
        }
        .matches(&record));
        assert!(!ReportFilters { min_amount: Some("150.01".parse().unwrap()), ..Default::default() }.matches(&record));
        assert!(!ReportFilters { status: Some(OrderStatus::Pending), ..Default::default() }.matches(&record));
    }
}
