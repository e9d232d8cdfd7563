//! Financial computation core for solobooks-api.
//!
//! Everything in this module is pure: totals composition, late-fee accrual
//! and status projection take validated input and return values without
//! touching the database. Persistence (and the atomic mark-as-invoiced
//! update) lives in `services::database`.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use solobooks_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CreateLineItem, Invoice, InvoiceStatus, LateFeeType, TimeLog};

/// Errors from the billing computations.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invoice must contain at least one line item")]
    EmptyInvoice,

    #[error("Line item {index}: {reason}")]
    InvalidLineItem { index: usize, reason: &'static str },

    #[error("Tax rate must be between 0 and 100")]
    InvalidTaxRate,

    #[error("Discount {discount} exceeds subtotal plus tax {max}")]
    InvalidDiscount { discount: Decimal, max: Decimal },

    #[error("No unbilled billable time logs for project {project_id}")]
    NoUnbilledEntries { project_id: Uuid },
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NoUnbilledEntries { .. } => {
                AppError::NotFound(anyhow::anyhow!("{}", err))
            }
            _ => AppError::BadRequest(anyhow::anyhow!("{}", err)),
        }
    }
}

/// One billable row before amounts are derived.
#[derive(Debug, Clone)]
pub struct BillableItem {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub time_log_id: Option<Uuid>,
}

/// Output of `compose`: derived line items and invoice totals.
#[derive(Debug, Clone)]
pub struct ComposedTotals {
    pub items: Vec<CreateLineItem>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Round to 2 decimal places, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Derive line-item amounts and invoice totals.
///
/// `amount = round2(quantity * rate)` per item, `subtotal = Σ amount`,
/// `tax = round2(subtotal * tax_rate_pct / 100)`,
/// `total = subtotal + tax - discount`. The total is never allowed to go
/// negative: a discount larger than subtotal plus tax is rejected.
pub fn compose(
    items: &[BillableItem],
    tax_rate_pct: Decimal,
    discount: Decimal,
) -> Result<ComposedTotals, BillingError> {
    if items.is_empty() {
        return Err(BillingError::EmptyInvoice);
    }
    if tax_rate_pct < Decimal::ZERO || tax_rate_pct > Decimal::from(100) {
        return Err(BillingError::InvalidTaxRate);
    }
    if discount < Decimal::ZERO {
        return Err(BillingError::InvalidLineItem {
            index: 0,
            reason: "discount must not be negative",
        });
    }

    let mut line_items = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;

    for (index, item) in items.iter().enumerate() {
        if item.quantity <= Decimal::ZERO {
            return Err(BillingError::InvalidLineItem {
                index,
                reason: "quantity must be greater than zero",
            });
        }
        if item.rate < Decimal::ZERO {
            return Err(BillingError::InvalidLineItem {
                index,
                reason: "rate must not be negative",
            });
        }

        let amount = round2(item.quantity * item.rate);
        subtotal += amount;

        line_items.push(CreateLineItem {
            description: item.description.clone(),
            quantity: item.quantity,
            rate: item.rate,
            amount,
            time_log_id: item.time_log_id,
            sort_order: index as i32,
        });
    }

    let tax_amount = round2(subtotal * tax_rate_pct / Decimal::from(100));
    if discount > subtotal + tax_amount {
        return Err(BillingError::InvalidDiscount {
            discount,
            max: subtotal + tax_amount,
        });
    }
    let total = subtotal + tax_amount - discount;

    Ok(ComposedTotals {
        items: line_items,
        subtotal,
        tax_amount,
        total,
    })
}

/// Map unbilled time logs to billable items at the given hourly rate.
///
/// Fails when the set is empty; the caller then falls back to manual line
/// items. Marking the logs invoiced is not done here: the database layer
/// performs it atomically with invoice persistence so the same hours can
/// never be billed twice.
pub fn line_items_from_time_logs(
    project_id: Uuid,
    logs: &[TimeLog],
    hourly_rate: Decimal,
) -> Result<Vec<BillableItem>, BillingError> {
    if logs.is_empty() {
        return Err(BillingError::NoUnbilledEntries { project_id });
    }

    Ok(logs
        .iter()
        .map(|log| BillableItem {
            description: log.description.clone(),
            quantity: log.hours,
            rate: hourly_rate,
            time_log_id: Some(log.time_log_id),
        })
        .collect())
}

/// Late fee accrued by `as_of`, or zero when not yet due or already paid.
///
/// Percentage fees accrue `round2(total * rate/100 * days_late)`; fixed
/// fees accrue `round2(rate * days_late)`. Never persisted: recomputed on
/// every read.
pub fn accrued_late_fee(invoice: &Invoice, as_of: NaiveDate) -> Decimal {
    if InvoiceStatus::from_string(&invoice.status) == InvoiceStatus::Paid
        || as_of <= invoice.due_date
    {
        return Decimal::ZERO;
    }

    let days_late = Decimal::from((as_of - invoice.due_date).num_days());
    match LateFeeType::from_string(&invoice.late_fee_type) {
        LateFeeType::Percentage => {
            round2(invoice.total * invoice.late_fee_rate / Decimal::from(100) * days_late)
        }
        LateFeeType::Fixed => round2(invoice.late_fee_rate * days_late),
    }
}

/// Status as presented to the user, accounting for the current date.
///
/// A paid invoice stays paid regardless of dates; an unpaid invoice past
/// its due date projects as overdue without any stored transition.
pub fn effective_status(invoice: &Invoice, today: NaiveDate) -> InvoiceStatus {
    match InvoiceStatus::from_string(&invoice.status) {
        InvoiceStatus::Paid => InvoiceStatus::Paid,
        _ if today > invoice.due_date => InvoiceStatus::Overdue,
        _ => InvoiceStatus::Unpaid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn item(description: &str, quantity: Decimal, rate: Decimal) -> BillableItem {
        BillableItem {
            description: description.to_string(),
            quantity,
            rate,
            time_log_id: None,
        }
    }

    fn invoice(
        total: Decimal,
        due_date: NaiveDate,
        status: &str,
        late_fee_rate: Decimal,
        late_fee_type: &str,
    ) -> Invoice {
        Invoice {
            invoice_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            invoice_number: "INV-0001".to_string(),
            client_id: Uuid::new_v4(),
            project_id: None,
            status: status.to_string(),
            issue_date: due_date,
            due_date,
            subtotal: total,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            late_fee_rate,
            late_fee_type: late_fee_type.to_string(),
            total,
            notes: None,
            paid_utc: None,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn compose_derives_subtotal_tax_and_total() {
        let items = vec![
            item("Design", dec!(10), dec!(50)),
            item("Dev", dec!(20), dec!(75)),
        ];

        let composed = compose(&items, dec!(18), Decimal::ZERO).expect("valid input");

        assert_eq!(composed.subtotal, dec!(2000));
        assert_eq!(composed.tax_amount, dec!(360));
        assert_eq!(composed.total, dec!(2360));
        assert_eq!(composed.items.len(), 2);
        assert_eq!(composed.items[0].amount, dec!(500));
        assert_eq!(composed.items[1].amount, dec!(1500));
    }

    #[test]
    fn compose_rounds_item_amounts_to_two_decimals() {
        let items = vec![item("Consulting", dec!(1.5), dec!(33.333))];

        let composed = compose(&items, Decimal::ZERO, Decimal::ZERO).expect("valid input");

        // 1.5 * 33.333 = 49.9995, half away from zero -> 50.00
        assert_eq!(composed.items[0].amount, dec!(50.00));
        assert_eq!(composed.subtotal, dec!(50.00));
    }

    #[test]
    fn compose_applies_discount() {
        let items = vec![item("Retainer", dec!(1), dec!(1000))];

        let composed = compose(&items, dec!(10), dec!(100)).expect("valid input");

        assert_eq!(composed.subtotal, dec!(1000));
        assert_eq!(composed.tax_amount, dec!(100));
        assert_eq!(composed.total, dec!(1000));
    }

    #[test]
    fn compose_rejects_discount_exceeding_subtotal_plus_tax() {
        let items = vec![item("Small job", dec!(1), dec!(100))];

        let err = compose(&items, Decimal::ZERO, dec!(100.01)).unwrap_err();

        assert!(matches!(err, BillingError::InvalidDiscount { .. }));
    }

    #[test]
    fn compose_allows_discount_equal_to_subtotal_plus_tax() {
        let items = vec![item("Comped", dec!(1), dec!(100))];

        let composed = compose(&items, Decimal::ZERO, dec!(100)).expect("zero total is allowed");

        assert_eq!(composed.total, Decimal::ZERO);
    }

    #[test]
    fn compose_rejects_empty_items() {
        let err = compose(&[], Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, BillingError::EmptyInvoice));
    }

    #[test]
    fn compose_rejects_zero_quantity() {
        let items = vec![item("Bad", Decimal::ZERO, dec!(50))];
        let err = compose(&items, Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, BillingError::InvalidLineItem { index: 0, .. }));
    }

    #[test]
    fn compose_rejects_negative_rate() {
        let items = vec![item("Bad", dec!(1), dec!(-1))];
        let err = compose(&items, Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, BillingError::InvalidLineItem { index: 0, .. }));
    }

    #[test]
    fn compose_rejects_out_of_range_tax_rate() {
        let items = vec![item("Job", dec!(1), dec!(100))];
        assert!(matches!(
            compose(&items, dec!(100.5), Decimal::ZERO).unwrap_err(),
            BillingError::InvalidTaxRate
        ));
        assert!(matches!(
            compose(&items, dec!(-1), Decimal::ZERO).unwrap_err(),
            BillingError::InvalidTaxRate
        ));
    }

    #[test]
    fn zero_rate_items_are_allowed() {
        let items = vec![item("Goodwill fix", dec!(2), Decimal::ZERO)];
        let composed = compose(&items, dec!(18), Decimal::ZERO).expect("valid input");
        assert_eq!(composed.total, Decimal::ZERO);
    }

    #[test]
    fn time_logs_map_to_billable_items() {
        let project_id = Uuid::new_v4();
        let log = TimeLog {
            time_log_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            project_id,
            log_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            hours: dec!(3.5),
            description: "API integration".to_string(),
            billable: true,
            invoiced: false,
            invoice_id: None,
            created_utc: Utc::now(),
        };

        let items =
            line_items_from_time_logs(project_id, &[log.clone()], dec!(80)).expect("non-empty");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "API integration");
        assert_eq!(items[0].quantity, dec!(3.5));
        assert_eq!(items[0].rate, dec!(80));
        assert_eq!(items[0].time_log_id, Some(log.time_log_id));
    }

    #[test]
    fn empty_time_log_set_is_an_error() {
        let project_id = Uuid::new_v4();
        let err = line_items_from_time_logs(project_id, &[], dec!(80)).unwrap_err();
        assert!(matches!(
            err,
            BillingError::NoUnbilledEntries { project_id: p } if p == project_id
        ));
    }

    #[test]
    fn late_fee_is_zero_before_due_date() {
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let inv = invoice(dec!(2360), due, "unpaid", dec!(1), "percentage");

        assert_eq!(accrued_late_fee(&inv, due), Decimal::ZERO);
        assert_eq!(
            accrued_late_fee(&inv, due.pred_opt().unwrap()),
            Decimal::ZERO
        );
    }

    #[test]
    fn percentage_late_fee_accrues_per_day() {
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let inv = invoice(dec!(2360), due, "unpaid", dec!(1), "percentage");
        let as_of = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();

        // 5 days late: round2(2360 * 0.01 * 5) = 118.00
        assert_eq!(accrued_late_fee(&inv, as_of), dec!(118.00));
    }

    #[test]
    fn fixed_late_fee_accrues_per_day() {
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let inv = invoice(dec!(500), due, "unpaid", dec!(2.50), "fixed");
        let as_of = NaiveDate::from_ymd_opt(2025, 1, 4).unwrap();

        assert_eq!(accrued_late_fee(&inv, as_of), dec!(7.50));
    }

    #[test]
    fn late_fee_is_monotone_in_days_late() {
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let inv = invoice(dec!(1000), due, "unpaid", dec!(1), "percentage");

        let mut previous = Decimal::ZERO;
        for offset in 1..30 {
            let as_of = due + chrono::Duration::days(offset);
            let fee = accrued_late_fee(&inv, as_of);
            assert!(fee > previous, "fee must strictly increase past due date");
            previous = fee;
        }
    }

    #[test]
    fn late_fee_is_zero_for_paid_invoice_and_zero_rate() {
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let paid = invoice(dec!(1000), due, "paid", dec!(1), "percentage");
        assert_eq!(accrued_late_fee(&paid, as_of), Decimal::ZERO);

        let zero_rate = invoice(dec!(1000), due, "unpaid", Decimal::ZERO, "percentage");
        assert_eq!(accrued_late_fee(&zero_rate, as_of), Decimal::ZERO);
    }

    #[test]
    fn effective_status_projects_overdue_without_storing_it() {
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let inv = invoice(dec!(100), due, "unpaid", Decimal::ZERO, "percentage");

        assert_eq!(effective_status(&inv, due), InvoiceStatus::Unpaid);
        assert_eq!(
            effective_status(&inv, due + chrono::Duration::days(1)),
            InvoiceStatus::Overdue
        );
    }

    #[test]
    fn effective_status_paid_wins_over_due_date() {
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let inv = invoice(dec!(100), due, "paid", dec!(5), "percentage");

        assert_eq!(
            effective_status(&inv, due + chrono::Duration::days(365)),
            InvoiceStatus::Paid
        );
    }
}
