//! Invoice handlers: composition, generation from unbilled time, payment.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use solobooks_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        CreateInvoiceRequest, GenerateInvoiceRequest, InvoiceDetailResponse, ListInvoicesQuery,
        MarkPaidRequest,
    },
    middleware::AuthUser,
    models::{CreateInvoice, CreatePayment, Invoice, LateFeeType, LineItem, ListInvoicesFilter},
    services::billing::{self, BillableItem},
    services::metrics::{INVOICES_TOTAL, PAYMENTS_TOTAL},
    AppState,
};

fn detail_response(
    invoice: Invoice,
    items: Vec<LineItem>,
    payments: Vec<crate::models::Payment>,
) -> InvoiceDetailResponse {
    let today = Utc::now().date_naive();
    let effective_status = billing::effective_status(&invoice, today);
    let accrued_late_fee = billing::accrued_late_fee(&invoice, today);
    InvoiceDetailResponse {
        invoice,
        items,
        payments,
        effective_status,
        accrued_late_fee,
    }
}

/// Create an invoice from manually entered line items.
pub async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetailResponse>), AppError> {
    payload.validate()?;

    let items: Vec<BillableItem> = payload
        .items
        .iter()
        .map(|item| BillableItem {
            description: item.description.clone(),
            quantity: item.quantity,
            rate: item.rate,
            time_log_id: None,
        })
        .collect();

    let tax_rate = payload.tax_rate.unwrap_or(Decimal::ZERO);
    let discount = payload.discount_amount.unwrap_or(Decimal::ZERO);
    let composed = billing::compose(&items, tax_rate, discount)?;

    let input = CreateInvoice {
        user_id: auth.user_id,
        client_id: payload.client_id,
        project_id: payload.project_id,
        issue_date: payload.issue_date.unwrap_or_else(|| Utc::now().date_naive()),
        due_date: payload.due_date,
        subtotal: composed.subtotal,
        tax_rate,
        tax_amount: composed.tax_amount,
        discount_amount: discount,
        late_fee_rate: payload.late_fee_rate.unwrap_or(Decimal::ZERO),
        late_fee_type: payload.late_fee_type.unwrap_or(LateFeeType::Percentage),
        total: composed.total,
        notes: payload.notes,
    };

    tracing::info!(
        user_id = %auth.user_id,
        client_id = %payload.client_id,
        items = composed.items.len(),
        total = %composed.total,
        "Creating invoice"
    );

    let (invoice, items) = state.db.create_invoice(&input, &composed.items).await?;
    INVOICES_TOTAL.with_label_values(&["manual"]).inc();

    Ok((
        StatusCode::CREATED,
        Json(detail_response(invoice, items, Vec::new())),
    ))
}

/// Generate an invoice from the project's unbilled, billable time logs.
///
/// The read-compose-write sequence commits atomically with the
/// mark-as-invoiced update; a concurrent generation against the same logs
/// gets a 409 and should re-fetch the unbilled set.
pub async fn generate_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetailResponse>), AppError> {
    payload.validate()?;

    let project = state
        .db
        .get_project(auth.user_id, payload.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    let hourly_rate = payload.hourly_rate.unwrap_or(project.hourly_rate);
    if hourly_rate <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Project has no hourly rate; provide one in the request"
        )));
    }

    let logs = state.db.find_unbilled(auth.user_id, payload.project_id).await?;
    let items = billing::line_items_from_time_logs(payload.project_id, &logs, hourly_rate)?;

    let tax_rate = payload.tax_rate.unwrap_or(Decimal::ZERO);
    let discount = payload.discount_amount.unwrap_or(Decimal::ZERO);
    let composed = billing::compose(&items, tax_rate, discount)?;

    let time_log_ids: Vec<Uuid> = logs.iter().map(|log| log.time_log_id).collect();
    let input = CreateInvoice {
        user_id: auth.user_id,
        client_id: project.client_id,
        project_id: Some(project.project_id),
        issue_date: payload.issue_date.unwrap_or_else(|| Utc::now().date_naive()),
        due_date: payload.due_date,
        subtotal: composed.subtotal,
        tax_rate,
        tax_amount: composed.tax_amount,
        discount_amount: discount,
        late_fee_rate: payload.late_fee_rate.unwrap_or(Decimal::ZERO),
        late_fee_type: payload.late_fee_type.unwrap_or(LateFeeType::Percentage),
        total: composed.total,
        notes: payload.notes,
    };

    tracing::info!(
        user_id = %auth.user_id,
        project_id = %project.project_id,
        time_logs = time_log_ids.len(),
        total = %composed.total,
        "Generating invoice from unbilled time logs"
    );

    let (invoice, items) = state
        .db
        .create_invoice_from_time_logs(&input, &composed.items, &time_log_ids)
        .await?;
    INVOICES_TOTAL.with_label_values(&["time_logs"]).inc();

    Ok((
        StatusCode::CREATED,
        Json(detail_response(invoice, items, Vec::new())),
    ))
}

/// Get an invoice with its line items, payments, effective status and the
/// late fee accrued as of today.
pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(auth.user_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let items = state.db.get_line_items(auth.user_id, invoice_id).await?;
    let payments = state.db.list_payments(auth.user_id, invoice_id).await?;

    Ok(Json(detail_response(invoice, items, payments)))
}

/// List invoices, optionally filtered by effective status, client and
/// issue date.
pub async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let filter = ListInvoicesFilter {
        status: query.status,
        client_id: query.client_id,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size,
        page_token: query.page_token,
    };

    let invoices = state.db.list_invoices(auth.user_id, &filter).await?;

    Ok(Json(invoices))
}

/// Mark an invoice paid, recording a payment. 409 when already paid.
pub async fn mark_paid(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<Uuid>,
    payload: Option<Json<MarkPaidRequest>>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;

    let existing = state
        .db
        .get_invoice(auth.user_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let payment = CreatePayment {
        amount: payload.amount.unwrap_or(existing.total),
        payment_date: payload
            .payment_date
            .unwrap_or_else(|| Utc::now().date_naive()),
        method: payload.method,
        notes: payload.notes,
    };

    tracing::info!(
        user_id = %auth.user_id,
        invoice_id = %invoice_id,
        amount = %payment.amount,
        "Marking invoice paid"
    );

    let (invoice, recorded) = state
        .db
        .mark_invoice_paid(auth.user_id, invoice_id, &payment)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    PAYMENTS_TOTAL
        .with_label_values(&[recorded.method.as_deref().unwrap_or("unspecified")])
        .inc();

    let items = state.db.get_line_items(auth.user_id, invoice_id).await?;
    let payments = state.db.list_payments(auth.user_id, invoice_id).await?;

    Ok(Json(detail_response(invoice, items, payments)))
}

/// Delete an unpaid invoice, releasing its time logs for rebilling.
pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_invoice(auth.user_id, invoice_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
