//! Database-backed invoice tests. They need a running Postgres: point
//! SOLOBOOKS_TEST_DATABASE_URL at one and run with `cargo test -- --ignored`.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use solobooks_api::models::{
    CreateClient, CreateInvoice, CreatePayment, CreateProject, CreateTimeLog, InvoiceStatus,
    LateFeeType, ListInvoicesFilter,
};
use solobooks_api::services::billing::{self, BillableItem, ComposedTotals};
use solobooks_api::services::database::Database;
use solobooks_core::error::AppError;

async fn test_db() -> Database {
    let url = std::env::var("SOLOBOOKS_TEST_DATABASE_URL")
        .expect("SOLOBOOKS_TEST_DATABASE_URL must point at a test Postgres");
    let db = Database::new(&url, 5, 1).await.expect("connect");
    db.run_migrations().await.expect("migrate");
    db
}

async fn seed_client_and_project(db: &Database, user_id: Uuid) -> (Uuid, Uuid) {
    let client = db
        .create_client(&CreateClient {
            user_id,
            name: "Acme Studio".to_string(),
            email: None,
            phone: None,
            company: None,
            address: None,
        })
        .await
        .expect("create client");

    let project = db
        .create_project(&CreateProject {
            user_id,
            client_id: client.client_id,
            name: "Website rebuild".to_string(),
            description: None,
            hourly_rate: dec!(80),
        })
        .await
        .expect("create project");

    (client.client_id, project.project_id)
}

fn invoice_input(
    user_id: Uuid,
    client_id: Uuid,
    project_id: Option<Uuid>,
    due_date: NaiveDate,
    composed: &ComposedTotals,
) -> CreateInvoice {
    CreateInvoice {
        user_id,
        client_id,
        project_id,
        issue_date: Utc::now().date_naive(),
        due_date,
        subtotal: composed.subtotal,
        tax_rate: Decimal::ZERO,
        tax_amount: composed.tax_amount,
        discount_amount: Decimal::ZERO,
        late_fee_rate: Decimal::ZERO,
        late_fee_type: LateFeeType::Percentage,
        total: composed.total,
        notes: None,
    }
}

#[tokio::test]
#[ignore]
async fn concurrent_generation_bills_each_log_once() {
    let db = test_db().await;
    let user_id = Uuid::new_v4();
    let (client_id, project_id) = seed_client_and_project(&db, user_id).await;

    db.create_time_log(&CreateTimeLog {
        user_id,
        project_id,
        log_date: Utc::now().date_naive(),
        hours: dec!(5),
        description: "Build out checkout flow".to_string(),
        billable: true,
    })
    .await
    .expect("create time log");

    // Both requests read the same unbilled set before either commits.
    let logs = db.find_unbilled(user_id, project_id).await.expect("unbilled");
    let items = billing::line_items_from_time_logs(project_id, &logs, dec!(80)).unwrap();
    let composed = billing::compose(&items, Decimal::ZERO, Decimal::ZERO).unwrap();
    let time_log_ids: Vec<Uuid> = logs.iter().map(|log| log.time_log_id).collect();

    let due = Utc::now().date_naive() + Duration::days(14);
    let input = invoice_input(user_id, client_id, Some(project_id), due, &composed);

    let (first, second) = tokio::join!(
        db.create_invoice_from_time_logs(&input, &composed.items, &time_log_ids),
        db.create_invoice_from_time_logs(&input, &composed.items, &time_log_ids),
    );

    let wins = first.is_ok() as usize + second.is_ok() as usize;
    assert_eq!(wins, 1, "exactly one generation may commit");

    let err = match (first, second) {
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => e,
        _ => unreachable!(),
    };
    assert!(matches!(err, AppError::Conflict(_)));

    // The log was billed exactly once and is no longer available.
    let remaining = db.find_unbilled(user_id, project_id).await.expect("unbilled");
    assert!(remaining.is_empty());

    let filter = ListInvoicesFilter {
        page_size: 50,
        ..Default::default()
    };
    let invoices = db.list_invoices(user_id, &filter).await.expect("list");
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].total, dec!(400.00));
}

#[tokio::test]
#[ignore]
async fn status_filter_matches_effective_status() {
    let db = test_db().await;
    let user_id = Uuid::new_v4();
    let (client_id, _) = seed_client_and_project(&db, user_id).await;

    let items = vec![BillableItem {
        description: "Retainer".to_string(),
        quantity: dec!(1),
        rate: dec!(100),
        time_log_id: None,
    }];
    let composed = billing::compose(&items, Decimal::ZERO, Decimal::ZERO).unwrap();

    let today = Utc::now().date_naive();
    let (current, _) = db
        .create_invoice(
            &invoice_input(user_id, client_id, None, today + Duration::days(7), &composed),
            &composed.items,
        )
        .await
        .expect("create current");
    let (overdue, _) = db
        .create_invoice(
            &invoice_input(user_id, client_id, None, today - Duration::days(7), &composed),
            &composed.items,
        )
        .await
        .expect("create overdue");
    let (settled, _) = db
        .create_invoice(
            &invoice_input(user_id, client_id, None, today - Duration::days(7), &composed),
            &composed.items,
        )
        .await
        .expect("create settled");
    db.mark_invoice_paid(
        user_id,
        settled.invoice_id,
        &CreatePayment {
            amount: settled.total,
            payment_date: today,
            method: None,
            notes: None,
        },
    )
    .await
    .expect("mark paid")
    .expect("invoice exists");

    let by_status = |status| ListInvoicesFilter {
        status: Some(status),
        page_size: 50,
        ..Default::default()
    };

    let unpaid = db
        .list_invoices(user_id, &by_status(InvoiceStatus::Unpaid))
        .await
        .expect("list unpaid");
    assert_eq!(
        unpaid.iter().map(|i| i.invoice_id).collect::<Vec<_>>(),
        vec![current.invoice_id]
    );

    // The past-due unpaid invoice surfaces under overdue even though the
    // stored status is still 'unpaid'.
    let past_due = db
        .list_invoices(user_id, &by_status(InvoiceStatus::Overdue))
        .await
        .expect("list overdue");
    assert_eq!(
        past_due.iter().map(|i| i.invoice_id).collect::<Vec<_>>(),
        vec![overdue.invoice_id]
    );

    let paid = db
        .list_invoices(user_id, &by_status(InvoiceStatus::Paid))
        .await
        .expect("list paid");
    assert_eq!(
        paid.iter().map(|i| i.invoice_id).collect::<Vec<_>>(),
        vec![settled.invoice_id]
    );
}
