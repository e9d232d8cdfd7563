//! Invoice math through the public library surface: composing totals from
//! time logs the way the generation endpoint does, and projecting status
//! and late fees the way the read endpoints do.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use solobooks_api::models::{Invoice, InvoiceStatus, TimeLog};
use solobooks_api::services::billing::{self, BillableItem};

fn time_log(project_id: Uuid, date: NaiveDate, hours: Decimal, description: &str) -> TimeLog {
    TimeLog {
        time_log_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        project_id,
        log_date: date,
        hours,
        description: description.to_string(),
        billable: true,
        invoiced: false,
        invoice_id: None,
        created_utc: Utc::now(),
    }
}

fn stored_invoice(
    status: &str,
    due_date: NaiveDate,
    total: Decimal,
    late_fee_rate: Decimal,
    late_fee_type: &str,
) -> Invoice {
    Invoice {
        invoice_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        invoice_number: "INV-00042".to_string(),
        client_id: Uuid::new_v4(),
        project_id: None,
        status: status.to_string(),
        issue_date: due_date - chrono::Duration::days(14),
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
fn generation_pipeline_preserves_hours_and_order() {
    let project_id = Uuid::new_v4();
    let jan = |day| NaiveDate::from_ymd_opt(2025, 1, day).unwrap();
    let logs = vec![
        time_log(project_id, jan(6), dec!(4), "Schema design"),
        time_log(project_id, jan(7), dec!(6.5), "Endpoint implementation"),
        time_log(project_id, jan(8), dec!(2), "Code review"),
    ];

    let items = billing::line_items_from_time_logs(project_id, &logs, dec!(80))
        .expect("logs are non-empty");
    let composed = billing::compose(&items, dec!(18), Decimal::ZERO).expect("valid items");

    // 12.5 hours at 80/h, 18% tax
    assert_eq!(composed.subtotal, dec!(1000.00));
    assert_eq!(composed.tax_amount, dec!(180.00));
    assert_eq!(composed.total, dec!(1180.00));

    // Each log becomes one item, in log order, carrying its provenance.
    assert_eq!(composed.items.len(), 3);
    for (index, (item, log)) in composed.items.iter().zip(&logs).enumerate() {
        assert_eq!(item.time_log_id, Some(log.time_log_id));
        assert_eq!(item.quantity, log.hours);
        assert_eq!(item.description, log.description);
        assert_eq!(item.sort_order, index as i32);
    }
}

#[test]
fn fractional_hours_round_per_item_before_summing() {
    let project_id = Uuid::new_v4();
    let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
    let logs = vec![
        time_log(project_id, date, dec!(0.1), "Standup"),
        time_log(project_id, date, dec!(0.1), "Standup"),
        time_log(project_id, date, dec!(0.1), "Standup"),
    ];

    // 0.1 * 33.33 = 3.333 -> 3.33 per item; sum of rounded amounts, not
    // a rounded sum.
    let items = billing::line_items_from_time_logs(project_id, &logs, dec!(33.33)).unwrap();
    let composed = billing::compose(&items, Decimal::ZERO, Decimal::ZERO).unwrap();

    assert_eq!(composed.items[0].amount, dec!(3.33));
    assert_eq!(composed.subtotal, dec!(9.99));
}

#[test]
fn overdue_invoice_accrues_fee_and_projects_status_together() {
    let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let inv = stored_invoice("unpaid", due, dec!(2360), dec!(1), "percentage");
    let as_of = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();

    assert_eq!(billing::effective_status(&inv, as_of), InvoiceStatus::Overdue);
    assert_eq!(billing::accrued_late_fee(&inv, as_of), dec!(118.00));

    // The stored row never changes; the same invoice read before the due
    // date projects unpaid with no fee.
    assert_eq!(billing::effective_status(&inv, due), InvoiceStatus::Unpaid);
    assert_eq!(billing::accrued_late_fee(&inv, due), Decimal::ZERO);
}

#[test]
fn paying_stops_accrual_regardless_of_age() {
    let due = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let inv = stored_invoice("paid", due, dec!(5000), dec!(2), "fixed");
    let much_later = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

    assert_eq!(billing::effective_status(&inv, much_later), InvoiceStatus::Paid);
    assert_eq!(billing::accrued_late_fee(&inv, much_later), Decimal::ZERO);
}

#[test]
fn manual_items_and_generated_items_compose_identically() {
    let manual = vec![BillableItem {
        description: "Sprint work".to_string(),
        quantity: dec!(12.5),
        rate: dec!(80),
        time_log_id: None,
    }];

    let project_id = Uuid::new_v4();
    let log = time_log(
        project_id,
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        dec!(12.5),
        "Sprint work",
    );
    let generated = billing::line_items_from_time_logs(project_id, &[log], dec!(80)).unwrap();

    let from_manual = billing::compose(&manual, dec!(18), dec!(100)).unwrap();
    let from_logs = billing::compose(&generated, dec!(18), dec!(100)).unwrap();

    assert_eq!(from_manual.subtotal, from_logs.subtotal);
    assert_eq!(from_manual.tax_amount, from_logs.tax_amount);
    assert_eq!(from_manual.total, from_logs.total);
}
