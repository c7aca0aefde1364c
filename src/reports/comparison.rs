//! Previous-period comparison

use rust_decimal::Decimal;
use serde::Serialize;

use super::ReportData;

/// Percentage deltas between two periods
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Changes {
    pub total_revenue: Decimal,
    pub order_count: Decimal,
    pub average_ticket: Decimal,
    pub total_orders: Decimal,
    pub completed_orders: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub current: ReportData,
    pub previous: ReportData,
    pub changes: Changes,
}

/// Percent change from `previous` to `current`, one decimal place
///
/// A zero baseline yields 0 when nothing changed and 100 otherwise, so the
/// result is always finite.
pub fn percent_change(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE_HUNDRED
        };
    }
    let delta = current.saturating_sub(previous);
    let bound = if delta.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    };
    delta
        .checked_div(previous.abs())
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(bound)
        .round_dp(1)
}

fn count_change(previous: usize, current: usize) -> Decimal {
    percent_change(Decimal::from(previous), Decimal::from(current))
}

pub fn compare_data(current: ReportData, previous: ReportData) -> ComparisonReport {
    let (cur, prev) = (&current.summary, &previous.summary);
    let changes = Changes {
        total_revenue: percent_change(prev.total_revenue, cur.total_revenue),
        order_count: count_change(prev.order_count, cur.order_count),
        average_ticket: percent_change(prev.average_ticket, cur.average_ticket),
        total_orders: count_change(prev.total_orders, cur.total_orders),
        completed_orders: count_change(prev.completed_orders, cur.completed_orders),
    };
    ComparisonReport {
        current,
        previous,
        changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::{EntityId, EntityPrefix};
    use crate::entities::OrderStatus;
    use crate::reports::fixtures::Fixture;
    use crate::reports::{aggregate, DateRange};
    use chrono::NaiveDate;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(dec("200"), dec("300")), dec("50.0"));
        assert_eq!(percent_change(dec("300"), dec("200")), dec("-33.3"));
        assert_eq!(percent_change(dec("100"), dec("100")), Decimal::ZERO);
    }

    #[test]
    fn test_zero_baseline_is_finite() {
        assert_eq!(percent_change(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percent_change(Decimal::ZERO, dec("450.00")), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        assert_eq!(percent_change(dec("0.01"), Decimal::MAX), Decimal::MAX);
        assert_eq!(percent_change(dec("0.01"), Decimal::MIN), Decimal::MIN);
        assert_eq!(percent_change(Decimal::MAX, Decimal::ZERO), dec("-100.0"));
    }

    #[test]
    fn test_compare_against_empty_previous_period() {
        let march = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap();
        let mut fx = Fixture::new();
        let c = EntityId::new(EntityPrefix::Cust);
        let v = EntityId::new(EntityPrefix::Veh);
        let records = vec![fx.record(
            (&c, "Ana"),
            (&v, "ABC1234"),
            "2024-03-15",
            OrderStatus::Completed,
            None,
            &[("Revisão", "Geral", "250.00")],
        )];

        let report = compare_data(aggregate(march, &records), aggregate(march.previous().unwrap(), &[]));
        assert_eq!(report.changes.total_revenue, Decimal::ONE_HUNDRED);
        assert_eq!(report.changes.average_ticket, Decimal::ONE_HUNDRED);
        assert_eq!(report.previous.summary.total_revenue, Decimal::ZERO);
        assert_eq!(report.previous.period, march.previous().unwrap());
    }
}
