//! Database models for solobooks-api.

mod client;
mod expense;
mod invoice;
mod line_item;
mod payment;
mod project;
mod time_log;

pub use client::{Client, CreateClient, UpdateClient};
pub use expense::{CreateExpense, Expense, ListExpensesFilter, UpdateExpense};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceStatus, LateFeeType, ListInvoicesFilter,
};
pub use line_item::{CreateLineItem, LineItem};
pub use payment::{CreatePayment, Payment};
pub use project::{CreateProject, Project, ProjectStatus, UpdateProject};
pub use time_log::{CreateTimeLog, TimeLog, UpdateTimeLog};
