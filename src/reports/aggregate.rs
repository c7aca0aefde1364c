//! Single-pass aggregation of report records
//!
//! Each rollup accumulates into an [`IndexMap`] so that entries remember
//! the order they were first seen; the final stable sort therefore breaks
//! ties by input order.

use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;

use super::technician;
use super::{DateRange, ReportRecord};
use crate::core::identity::EntityId;
use crate::entities::OrderStatus;

/// Headline figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Sum of order totals, canceled orders excluded
    pub total_revenue: Decimal,
    /// Orders that count toward revenue
    pub order_count: usize,
    pub average_ticket: Decimal,
    /// Every fetched order, canceled included
    pub total_orders: usize,
    pub completed_orders: usize,
    pub canceled_orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    /// "YYYY-MM"
    pub month: String,
    pub order_count: usize,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRollup {
    pub customer_id: EntityId,
    pub name: String,
    pub order_count: usize,
    pub revenue: Decimal,
    pub last_service: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRollup {
    pub vehicle_id: EntityId,
    pub plate: String,
    pub vehicle: String,
    pub customer_name: String,
    pub order_count: usize,
    pub revenue: Decimal,
    pub last_service: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicianRollup {
    pub name: String,
    pub order_count: usize,
    pub revenue: Decimal,
    pub last_service: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceTypeRollup {
    pub service_type: String,
    pub description: String,
    /// Number of line items
    pub occurrences: usize,
    pub quantity: Decimal,
    /// Sum of line totals; order discounts are not spread over items
    pub revenue: Decimal,
}

/// One exported order row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub order_number: i64,
    pub date: NaiveDate,
    pub customer: String,
    pub plate: String,
    pub status: OrderStatus,
    pub technician: String,
    pub items: usize,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Everything a report shows for one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData {
    pub period: DateRange,
    pub summary: Summary,
    pub revenue_by_month: Vec<MonthlyRevenue>,
    pub status_counts: Vec<StatusCount>,
    pub customers: Vec<CustomerRollup>,
    pub vehicles: Vec<VehicleRollup>,
    pub technicians: Vec<TechnicianRollup>,
    pub service_types: Vec<ServiceTypeRollup>,
    pub orders: Vec<OrderLine>,
}

/// Shared shape of the order-level rollups
struct Tally {
    order_count: usize,
    revenue: Decimal,
    last_service: NaiveDate,
}

impl Tally {
    fn new(date: NaiveDate) -> Self {
        Self {
            order_count: 0,
            revenue: Decimal::ZERO,
            last_service: date,
        }
    }

    fn add(&mut self, amount: Decimal, date: NaiveDate) {
        self.order_count += 1;
        self.revenue = self.revenue.saturating_add(amount);
        self.last_service = self.last_service.max(date);
    }
}

/// Aggregate `records` (already filtered) for `period`
pub fn aggregate(period: DateRange, records: &[ReportRecord]) -> ReportData {
    let mut status_counts: IndexMap<OrderStatus, usize> =
        OrderStatus::all().iter().map(|s| (*s, 0)).collect();
    let mut months: IndexMap<String, (usize, Decimal)> = IndexMap::new();
    let mut customers: IndexMap<EntityId, (String, Tally)> = IndexMap::new();
    let mut vehicles: IndexMap<EntityId, (String, String, String, Tally)> = IndexMap::new();
    let mut technicians: IndexMap<String, Tally> = IndexMap::new();
    let mut services: IndexMap<(String, String), ServiceTypeRollup> = IndexMap::new();
    let mut orders = Vec::with_capacity(records.len());

    let mut total_revenue = Decimal::ZERO;
    let mut order_count = 0;

    for record in records {
        let order = &record.order;
        let date = record.created_on();
        let tech = technician::attribute(order.notes.as_deref());
        *status_counts.entry(order.status).or_insert(0) += 1;

        orders.push(OrderLine {
            order_number: order.order_number,
            date,
            customer: record.customer_name.clone(),
            plate: record.vehicle_plate.clone(),
            status: order.status,
            technician: tech.clone(),
            items: record.items.len(),
            discount: order.discount,
            total: order.total_amount,
        });

        if !record.counts_as_revenue() {
            continue;
        }

        let amount = order.total_amount;
        total_revenue = total_revenue.saturating_add(amount);
        order_count += 1;

        let month = months
            .entry(date.format("%Y-%m").to_string())
            .or_insert((0, Decimal::ZERO));
        month.0 += 1;
        month.1 = month.1.saturating_add(amount);

        customers
            .entry(order.customer_id.clone())
            .or_insert_with(|| (record.customer_name.clone(), Tally::new(date)))
            .1
            .add(amount, date);

        vehicles
            .entry(order.vehicle_id.clone())
            .or_insert_with(|| {
                (
                    record.vehicle_plate.clone(),
                    record.vehicle_name.clone(),
                    record.customer_name.clone(),
                    Tally::new(date),
                )
            })
            .3
            .add(amount, date);

        technicians
            .entry(tech)
            .or_insert_with(|| Tally::new(date))
            .add(amount, date);

        for item in &record.items {
            let service_type = item.category();
            let entry = services
                .entry((service_type.to_lowercase(), item.description.to_lowercase()))
                .or_insert_with(|| ServiceTypeRollup {
                    service_type,
                    description: item.description.clone(),
                    occurrences: 0,
                    quantity: Decimal::ZERO,
                    revenue: Decimal::ZERO,
                });
            entry.occurrences += 1;
            entry.quantity = entry.quantity.saturating_add(item.quantity);
            entry.revenue = entry.revenue.saturating_add(item.total_price);
        }
    }

    let mut revenue_by_month: Vec<MonthlyRevenue> = months
        .into_iter()
        .map(|(month, (order_count, revenue))| MonthlyRevenue {
            month,
            order_count,
            revenue,
        })
        .collect();
    revenue_by_month.sort_by(|a, b| a.month.cmp(&b.month));

    let mut customers: Vec<CustomerRollup> = customers
        .into_iter()
        .map(|(customer_id, (name, t))| CustomerRollup {
            customer_id,
            name,
            order_count: t.order_count,
            revenue: t.revenue,
            last_service: t.last_service,
        })
        .collect();
    customers.sort_by(|a, b| b.revenue.cmp(&a.revenue));

    let mut vehicles: Vec<VehicleRollup> = vehicles
        .into_iter()
        .map(|(vehicle_id, (plate, vehicle, customer_name, t))| VehicleRollup {
            vehicle_id,
            plate,
            vehicle,
            customer_name,
            order_count: t.order_count,
            revenue: t.revenue,
            last_service: t.last_service,
        })
        .collect();
    vehicles.sort_by(|a, b| b.revenue.cmp(&a.revenue));

    let mut technicians: Vec<TechnicianRollup> = technicians
        .into_iter()
        .map(|(name, t)| TechnicianRollup {
            name,
            order_count: t.order_count,
            revenue: t.revenue,
            last_service: t.last_service,
        })
        .collect();
    technicians.sort_by(|a, b| b.revenue.cmp(&a.revenue));

    let mut service_types: Vec<ServiceTypeRollup> = services.into_values().collect();
    service_types.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| b.revenue.cmp(&a.revenue))
    });

    let average_ticket = if order_count == 0 {
        Decimal::ZERO
    } else {
        (total_revenue / Decimal::from(order_count)).round_dp(2)
    };

    ReportData {
        period,
        summary: Summary {
            total_revenue,
            order_count,
            average_ticket,
            total_orders: records.len(),
            completed_orders: status_counts
                .get(&OrderStatus::Completed)
                .copied()
                .unwrap_or(0),
            canceled_orders: status_counts
                .get(&OrderStatus::Canceled)
                .copied()
                .unwrap_or(0),
        },
        revenue_by_month,
        status_counts: status_counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        customers,
        vehicles,
        technicians,
        service_types,
        orders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;
    use crate::reports::fixtures::Fixture;

    fn period() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample() -> Vec<ReportRecord> {
        let mut fx = Fixture::new();
        let ana = EntityId::new(EntityPrefix::Cust);
        let bia = EntityId::new(EntityPrefix::Cust);
        let uno = EntityId::new(EntityPrefix::Veh);
        let gol = EntityId::new(EntityPrefix::Veh);
        vec![
            fx.record(
                (&ana, "Ana"),
                (&uno, "ABC1234"),
                "2024-01-10",
                OrderStatus::Completed,
                Some("Técnico: Carlos"),
                &[("Revisão", "Troca de óleo", "100.00"), ("Freios", "Pastilhas", "200.00")],
            ),
            fx.record(
                (&bia, "Bia"),
                (&gol, "XYZ9A88"),
                "2024-02-05",
                OrderStatus::InProgress,
                Some("Tecnico: Davi"),
                &[("Revisão", "Troca de óleo", "100.00")],
            ),
            fx.record(
                (&bia, "Bia"),
                (&gol, "XYZ9A88"),
                "2024-02-20",
                OrderStatus::Canceled,
                Some("Técnico: Davi"),
                &[("Freios", "Disco", "900.00")],
            ),
            fx.record(
                (&ana, "Ana"),
                (&uno, "ABC1234"),
                "2024-03-02",
                OrderStatus::Pending,
                None,
                &[("Revisão", "troca de ÓLEO", "100.00")],
            ),
        ]
    }

    #[test]
    fn test_summary_excludes_canceled_revenue() {
        let data = aggregate(period(), &sample());
        assert_eq!(data.summary.total_revenue, dec("500.00"));
        assert_eq!(data.summary.order_count, 3);
        assert_eq!(data.summary.total_orders, 4);
        assert_eq!(data.summary.canceled_orders, 1);
        assert_eq!(data.summary.average_ticket, dec("166.67"));
    }

    #[test]
    fn test_customer_revenue_sums_to_total() {
        let data = aggregate(period(), &sample());
        let sum: Decimal = data.customers.iter().map(|c| c.revenue).sum();
        assert_eq!(sum, data.summary.total_revenue);
        assert_eq!(data.customers[0].name, "Ana");
        assert_eq!(data.customers[0].order_count, 2);
        assert_eq!(
            data.customers[0].last_service,
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_status_counts_cover_every_order() {
        let data = aggregate(period(), &sample());
        let total: usize = data.status_counts.iter().map(|s| s.count).sum();
        assert_eq!(total, data.summary.total_orders);
        assert_eq!(data.status_counts.len(), OrderStatus::all().len());
    }

    #[test]
    fn test_monthly_revenue_sorted_by_month() {
        let data = aggregate(period(), &sample());
        let months: Vec<_> = data.revenue_by_month.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(data.revenue_by_month[1].revenue, dec("100.00"));
        assert_eq!(data.revenue_by_month[1].order_count, 1);
    }

    #[test]
    fn test_technicians_from_notes() {
        let data = aggregate(period(), &sample());
        let names: Vec<_> = data.technicians.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Carlos", "Davi", "Unassigned"]);
        assert_eq!(data.technicians[1].order_count, 1);
    }

    #[test]
    fn test_service_types_group_case_insensitively() {
        let data = aggregate(period(), &sample());
        let first = &data.service_types[0];
        assert_eq!(first.service_type, "Revisão");
        assert_eq!(first.description, "Troca de óleo");
        assert_eq!(first.occurrences, 3);
        assert_eq!(first.revenue, dec("300.00"));
        assert_eq!(data.service_types.len(), 2);
    }

    #[test]
    fn test_ties_keep_input_order_and_rerun_is_identical() {
        let mut fx = Fixture::new();
        let records: Vec<ReportRecord> = ["Zé", "Ana", "Mia"]
            .iter()
            .map(|name| {
                let c = EntityId::new(EntityPrefix::Cust);
                let v = EntityId::new(EntityPrefix::Veh);
                fx.record(
                    (&c, name),
                    (&v, "AAA0000"),
                    "2024-01-15",
                    OrderStatus::Completed,
                    None,
                    &[("Revisão", "Geral", "50.00")],
                )
            })
            .collect();
        let first = aggregate(period(), &records);
        let names: Vec<_> = first.customers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Zé", "Ana", "Mia"]);
        assert_eq!(aggregate(period(), &records), first);
    }

    #[test]
    fn test_sums_saturate_at_decimal_max() {
        let mut fx = Fixture::new();
        let c = EntityId::new(EntityPrefix::Cust);
        let v = EntityId::new(EntityPrefix::Veh);
        let max = Decimal::MAX.to_string();
        let records: Vec<ReportRecord> = ["2024-01-10", "2024-01-20"]
            .iter()
            .map(|day| {
                fx.record(
                    (&c, "Ana"),
                    (&v, "ABC1234"),
                    day,
                    OrderStatus::Completed,
                    None,
                    &[("Motor", "Retífica", max.as_str())],
                )
            })
            .collect();
        let data = aggregate(period(), &records);
        assert_eq!(data.summary.total_revenue, Decimal::MAX);
        assert_eq!(data.customers[0].revenue, Decimal::MAX);
        assert_eq!(data.service_types[0].revenue, Decimal::MAX);
        assert_eq!(data.revenue_by_month[0].revenue, Decimal::MAX);
    }

    #[test]
    fn test_empty_input() {
        let data = aggregate(period(), &[]);
        assert_eq!(data.summary.total_revenue, Decimal::ZERO);
        assert_eq!(data.summary.average_ticket, Decimal::ZERO);
        assert!(data.customers.is_empty());
        assert!(data.revenue_by_month.is_empty());
    }
}
