//! Request validation rules, exercised directly on the DTOs. Handlers run
//! `payload.validate()?` before anything touches the billing core, so
//! these rules are the service's 400 surface.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use uuid::Uuid;
use validator::Validate;

use solobooks_api::dtos::{
    CreateInvoiceRequest, CreateTimeLogRequest, GenerateInvoiceRequest, LineItemRequest,
    MarkPaidRequest,
};

fn due_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
}

fn valid_item() -> LineItemRequest {
    LineItemRequest {
        description: "Consulting".to_string(),
        quantity: dec!(2),
        rate: dec!(150),
    }
}

fn valid_invoice_request() -> CreateInvoiceRequest {
    CreateInvoiceRequest {
        client_id: Uuid::new_v4(),
        project_id: None,
        items: vec![valid_item()],
        tax_rate: Some(dec!(18)),
        discount_amount: None,
        issue_date: None,
        due_date: due_date(),
        late_fee_rate: None,
        late_fee_type: None,
        notes: None,
    }
}

#[test]
fn valid_invoice_request_passes() {
    assert!(valid_invoice_request().validate().is_ok());
}

#[test]
fn invoice_requires_at_least_one_item() {
    let mut request = valid_invoice_request();
    request.items.clear();

    assert!(request.validate().is_err());
}

#[test]
fn nested_item_errors_surface() {
    let mut request = valid_invoice_request();
    request.items.push(LineItemRequest {
        description: String::new(),
        quantity: dec!(0),
        rate: dec!(-5),
    });

    assert!(request.validate().is_err());
}

#[test]
fn tax_rate_must_be_a_percentage() {
    let mut request = valid_invoice_request();

    request.tax_rate = Some(dec!(100));
    assert!(request.validate().is_ok());

    request.tax_rate = Some(dec!(100.01));
    assert!(request.validate().is_err());

    request.tax_rate = Some(dec!(-0.01));
    assert!(request.validate().is_err());
}

#[test]
fn negative_discount_is_rejected() {
    let mut request = valid_invoice_request();
    request.discount_amount = Some(dec!(-1));

    assert!(request.validate().is_err());
}

#[test]
fn generate_request_rejects_non_positive_rate_override() {
    let request = GenerateInvoiceRequest {
        project_id: Uuid::new_v4(),
        hourly_rate: Some(dec!(0)),
        tax_rate: None,
        discount_amount: None,
        issue_date: None,
        due_date: due_date(),
        late_fee_rate: None,
        late_fee_type: None,
        notes: None,
    };

    assert!(request.validate().is_err());
}

#[test]
fn time_log_hours_are_bounded() {
    let base = |hours| CreateTimeLogRequest {
        project_id: Uuid::new_v4(),
        log_date: due_date(),
        hours,
        description: "Pairing session".to_string(),
        billable: true,
    };

    assert!(base(dec!(0.1)).validate().is_ok());
    assert!(base(dec!(24)).validate().is_ok());
    assert!(base(dec!(0.05)).validate().is_err());
    assert!(base(dec!(24.5)).validate().is_err());
}

#[test]
fn empty_mark_paid_body_is_valid() {
    assert!(MarkPaidRequest::default().validate().is_ok());
}

#[test]
fn mark_paid_amount_must_be_positive() {
    let request = MarkPaidRequest {
        amount: Some(dec!(0)),
        ..Default::default()
    };

    assert!(request.validate().is_err());
}
