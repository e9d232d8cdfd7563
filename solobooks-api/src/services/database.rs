//! Database service for solobooks-api.

use crate::models::{
    Client, CreateClient, CreateExpense, CreateInvoice, CreateLineItem, CreatePayment,
    CreateProject, CreateTimeLog, Expense, Invoice, LineItem, ListExpensesFilter,
    ListInvoicesFilter, Payment, Project, TimeLog, UpdateClient, UpdateExpense, UpdateProject,
    UpdateTimeLog,
};
use crate::services::metrics::{DB_QUERY_DURATION, GENERATION_CONFLICTS_TOTAL};
use rust_decimal::Decimal;
use solobooks_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, user_id, invoice_number, client_id, project_id, status, \
     issue_date, due_date, subtotal, tax_rate, tax_amount, discount_amount, \
     late_fee_rate, late_fee_type, total, notes, paid_utc, created_utc";

const TIME_LOG_COLUMNS: &str = "time_log_id, user_id, project_id, log_date, hours, description, \
     billable, invoiced, invoice_id, created_utc";

/// Financial summary aggregates for the dashboard report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FinancialSummary {
    pub outstanding_total: Decimal,
    pub collected_total: Decimal,
    pub unbilled_hours: Decimal,
    pub expense_total: Decimal,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "solobooks-api"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// Create a new client.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client_id = Uuid::new_v4();
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (client_id, user_id, name, email, phone, company, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING client_id, user_id, name, email, phone, company, address, created_utc
            "#,
        )
        .bind(client_id)
        .bind(input.user_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)))?;

        timer.observe_duration();

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn get_client(
        &self,
        user_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, user_id, name, email, phone, company, address, created_utc
            FROM clients
            WHERE user_id = $1 AND client_id = $2
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// List clients for a user.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_clients(
        &self,
        user_id: Uuid,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, user_id, name, email, phone, company, address, created_utc
            FROM clients
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR client_id > $2)
            ORDER BY client_id
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Update a client.
    #[instrument(skip(self, input), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn update_client(
        &self,
        user_id: Uuid,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                company = COALESCE($6, company),
                address = COALESCE($7, address)
            WHERE user_id = $1 AND client_id = $2
            RETURNING client_id, user_id, name, email, phone, company, address, created_utc
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// Delete a client. Fails with a conflict while invoices reference it.
    #[instrument(skip(self), fields(user_id = %user_id, client_id = %client_id))]
    pub async fn delete_client(&self, user_id: Uuid, client_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM clients
            WHERE user_id = $1 AND client_id = $2
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Client has projects or invoices and cannot be deleted"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete client: {}", e)),
        })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Project Operations
    // -------------------------------------------------------------------------

    /// Create a new project.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, client_id = %input.client_id))]
    pub async fn create_project(&self, input: &CreateProject) -> Result<Project, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_project"])
            .start_timer();

        let project_id = Uuid::new_v4();
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (project_id, user_id, client_id, name, description, hourly_rate, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'active')
            RETURNING project_id, user_id, client_id, name, description, hourly_rate, status, created_utc
            "#,
        )
        .bind(project_id)
        .bind(input.user_id)
        .bind(input.client_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.hourly_rate)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest(anyhow::anyhow!("Client does not exist"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create project: {}", e)),
        })?;

        timer.observe_duration();

        info!(project_id = %project.project_id, "Project created");

        Ok(project)
    }

    /// Get a project by ID.
    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    pub async fn get_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_project"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT project_id, user_id, client_id, name, description, hourly_rate, status, created_utc
            FROM projects
            WHERE user_id = $1 AND project_id = $2
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get project: {}", e)))?;

        timer.observe_duration();

        Ok(project)
    }

    /// List projects for a user, optionally filtered by client.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_projects(
        &self,
        user_id: Uuid,
        client_id: Option<Uuid>,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_projects"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT project_id, user_id, client_id, name, description, hourly_rate, status, created_utc
            FROM projects
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::uuid IS NULL OR project_id > $3)
            ORDER BY project_id
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list projects: {}", e)))?;

        timer.observe_duration();

        Ok(projects)
    }

    /// Update a project.
    #[instrument(skip(self, input), fields(user_id = %user_id, project_id = %project_id))]
    pub async fn update_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        input: &UpdateProject,
    ) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_project"])
            .start_timer();

        let status = input.status.map(|s| s.as_str().to_string());

        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                hourly_rate = COALESCE($5, hourly_rate),
                status = COALESCE($6, status)
            WHERE user_id = $1 AND project_id = $2
            RETURNING project_id, user_id, client_id, name, description, hourly_rate, status, created_utc
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.hourly_rate)
        .bind(&status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update project: {}", e)))?;

        timer.observe_duration();

        Ok(project)
    }

    /// Delete a project. Fails with a conflict while time logs reference it.
    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    pub async fn delete_project(&self, user_id: Uuid, project_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_project"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM projects
            WHERE user_id = $1 AND project_id = $2
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Project has time logs or invoices and cannot be deleted"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete project: {}", e)),
        })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Time Log Operations
    // -------------------------------------------------------------------------

    /// Create a new time log.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, project_id = %input.project_id))]
    pub async fn create_time_log(&self, input: &CreateTimeLog) -> Result<TimeLog, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_time_log"])
            .start_timer();

        let time_log_id = Uuid::new_v4();
        let time_log = sqlx::query_as::<_, TimeLog>(&format!(
            r#"
            INSERT INTO time_logs (time_log_id, user_id, project_id, log_date, hours, description, billable)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TIME_LOG_COLUMNS}
            "#,
        ))
        .bind(time_log_id)
        .bind(input.user_id)
        .bind(input.project_id)
        .bind(input.log_date)
        .bind(input.hours)
        .bind(&input.description)
        .bind(input.billable)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest(anyhow::anyhow!("Project does not exist"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create time log: {}", e)),
        })?;

        timer.observe_duration();

        info!(time_log_id = %time_log.time_log_id, "Time log created");

        Ok(time_log)
    }

    /// Get a time log by ID.
    #[instrument(skip(self), fields(user_id = %user_id, time_log_id = %time_log_id))]
    pub async fn get_time_log(
        &self,
        user_id: Uuid,
        time_log_id: Uuid,
    ) -> Result<Option<TimeLog>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_time_log"])
            .start_timer();

        let time_log = sqlx::query_as::<_, TimeLog>(&format!(
            r#"
            SELECT {TIME_LOG_COLUMNS}
            FROM time_logs
            WHERE user_id = $1 AND time_log_id = $2
            "#,
        ))
        .bind(user_id)
        .bind(time_log_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get time log: {}", e)))?;

        timer.observe_duration();

        Ok(time_log)
    }

    /// List time logs for a user, optionally filtered by project.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_time_logs(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<TimeLog>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_time_logs"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let time_logs = sqlx::query_as::<_, TimeLog>(&format!(
            r#"
            SELECT {TIME_LOG_COLUMNS}
            FROM time_logs
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR project_id = $2)
              AND ($3::uuid IS NULL OR time_log_id > $3)
            ORDER BY time_log_id
            LIMIT $4
            "#,
        ))
        .bind(user_id)
        .bind(project_id)
        .bind(page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list time logs: {}", e)))?;

        timer.observe_duration();

        Ok(time_logs)
    }

    /// Find unbilled, billable time logs for a project.
    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    pub async fn find_unbilled(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<TimeLog>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_unbilled"])
            .start_timer();

        let time_logs = sqlx::query_as::<_, TimeLog>(&format!(
            r#"
            SELECT {TIME_LOG_COLUMNS}
            FROM time_logs
            WHERE user_id = $1
              AND project_id = $2
              AND billable = TRUE
              AND invoiced = FALSE
            ORDER BY log_date, created_utc
            "#,
        ))
        .bind(user_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find unbilled time logs: {}", e))
        })?;

        timer.observe_duration();

        Ok(time_logs)
    }

    /// Update an uninvoiced time log. Billed hours are frozen for audit.
    #[instrument(skip(self, input), fields(user_id = %user_id, time_log_id = %time_log_id))]
    pub async fn update_time_log(
        &self,
        user_id: Uuid,
        time_log_id: Uuid,
        input: &UpdateTimeLog,
    ) -> Result<Option<TimeLog>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_time_log"])
            .start_timer();

        let existing = self.get_time_log(user_id, time_log_id).await?;
        match existing {
            Some(log) if !log.invoiced => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invoiced time logs cannot be modified"
                )))
            }
            None => return Ok(None),
        };

        let time_log = sqlx::query_as::<_, TimeLog>(&format!(
            r#"
            UPDATE time_logs
            SET log_date = COALESCE($3, log_date),
                hours = COALESCE($4, hours),
                description = COALESCE($5, description),
                billable = COALESCE($6, billable)
            WHERE user_id = $1 AND time_log_id = $2 AND invoiced = FALSE
            RETURNING {TIME_LOG_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(time_log_id)
        .bind(input.log_date)
        .bind(input.hours)
        .bind(&input.description)
        .bind(input.billable)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update time log: {}", e)))?;

        timer.observe_duration();

        Ok(time_log)
    }

    /// Delete an uninvoiced time log.
    #[instrument(skip(self), fields(user_id = %user_id, time_log_id = %time_log_id))]
    pub async fn delete_time_log(&self, user_id: Uuid, time_log_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_time_log"])
            .start_timer();

        let existing = self.get_time_log(user_id, time_log_id).await?;
        match existing {
            Some(log) if !log.invoiced => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invoiced time logs must be retained for audit"
                )))
            }
            None => return Ok(false),
        };

        let result = sqlx::query(
            r#"
            DELETE FROM time_logs
            WHERE user_id = $1 AND time_log_id = $2 AND invoiced = FALSE
            "#,
        )
        .bind(user_id)
        .bind(time_log_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete time log: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Persist a composed invoice with its line items.
    #[instrument(skip(self, input, items), fields(user_id = %input.user_id, client_id = %input.client_id))]
    pub async fn create_invoice(
        &self,
        input: &CreateInvoice,
        items: &[CreateLineItem],
    ) -> Result<(Invoice, Vec<LineItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = Self::insert_invoice(&mut tx, input).await?;
        let line_items = Self::insert_line_items(&mut tx, &invoice, items).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total,
            "Invoice created"
        );

        Ok((invoice, line_items))
    }

    /// Persist an invoice generated from unbilled time logs, marking the
    /// logs invoiced in the same transaction.
    ///
    /// The mark is a conditional write (`invoiced = FALSE` in the WHERE
    /// clause): if a concurrent generation already billed any of the logs,
    /// the row count comes up short, the transaction rolls back and the
    /// caller gets a conflict. Either everything commits or nothing does.
    #[instrument(skip(self, input, items, time_log_ids), fields(user_id = %input.user_id))]
    pub async fn create_invoice_from_time_logs(
        &self,
        input: &CreateInvoice,
        items: &[CreateLineItem],
        time_log_ids: &[Uuid],
    ) -> Result<(Invoice, Vec<LineItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice_from_time_logs"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = Self::insert_invoice(&mut tx, input).await?;
        let line_items = Self::insert_line_items(&mut tx, &invoice, items).await?;

        let marked = sqlx::query(
            r#"
            UPDATE time_logs
            SET invoiced = TRUE, invoice_id = $1
            WHERE user_id = $2 AND time_log_id = ANY($3) AND invoiced = FALSE
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(input.user_id)
        .bind(time_log_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark time logs invoiced: {}", e))
        })?;

        if marked.rows_affected() != time_log_ids.len() as u64 {
            tx.rollback().await.map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to roll back: {}", e))
            })?;
            GENERATION_CONFLICTS_TOTAL
                .with_label_values(&["conflict"])
                .inc();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Some time logs were already invoiced; re-fetch the unbilled set and retry"
            )));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            time_logs = time_log_ids.len(),
            total = %invoice.total,
            "Invoice generated from time logs"
        );

        Ok((invoice, line_items))
    }

    async fn insert_invoice(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &CreateInvoice,
    ) -> Result<Invoice, AppError> {
        sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, user_id, invoice_number, client_id, project_id, status,
                issue_date, due_date, subtotal, tax_rate, tax_amount, discount_amount,
                late_fee_rate, late_fee_type, total, notes
            )
            VALUES ($1, $2, next_invoice_number(), $3, $4, 'unpaid', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.subtotal)
        .bind(input.tax_rate)
        .bind(input.tax_amount)
        .bind(input.discount_amount)
        .bind(input.late_fee_rate)
        .bind(input.late_fee_type.as_str())
        .bind(input.total)
        .bind(&input.notes)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest(anyhow::anyhow!("Client or project does not exist"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })
    }

    async fn insert_line_items(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        invoice: &Invoice,
        items: &[CreateLineItem],
    ) -> Result<Vec<LineItem>, AppError> {
        let mut line_items = Vec::with_capacity(items.len());
        for item in items {
            let line_item = sqlx::query_as::<_, LineItem>(
                r#"
                INSERT INTO line_items (
                    line_item_id, invoice_id, user_id, description, quantity, rate,
                    amount, time_log_id, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING line_item_id, invoice_id, user_id, description, quantity, rate,
                    amount, time_log_id, sort_order, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice.invoice_id)
            .bind(invoice.user_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.rate)
            .bind(item.amount)
            .bind(item.time_log_id)
            .bind(item.sort_order)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;
            line_items.push(line_item);
        }
        Ok(line_items)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE user_id = $1 AND invoice_id = $2
            "#,
        ))
        .bind(user_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get line items for an invoice.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn get_line_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_line_items"])
            .start_timer();

        let line_items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, invoice_id, user_id, description, quantity, rate,
                amount, time_log_id, sort_order, created_utc
            FROM line_items
            WHERE user_id = $1 AND invoice_id = $2
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(line_items)
    }

    /// List invoices for a user.
    ///
    /// The status filter matches the effective status, not the stored one:
    /// `overdue` selects unpaid invoices past their due date and `unpaid`
    /// selects those still within it. `overdue` is never stored, so a
    /// stored-status comparison would always come up empty.
    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    pub async fn list_invoices(
        &self,
        user_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE user_id = $1
              AND ($2::varchar IS NULL
                   OR ($2 = 'paid' AND status = 'paid')
                   OR ($2 = 'unpaid' AND status = 'unpaid' AND due_date >= CURRENT_DATE)
                   OR ($2 = 'overdue' AND status = 'unpaid' AND due_date < CURRENT_DATE))
              AND ($3::uuid IS NULL OR client_id = $3)
              AND ($4::date IS NULL OR issue_date >= $4)
              AND ($5::date IS NULL OR issue_date <= $5)
              AND ($6::uuid IS NULL OR invoice_id > $6)
            ORDER BY invoice_id
            LIMIT $7
            "#,
        ))
        .bind(user_id)
        .bind(&status_str)
        .bind(filter.client_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Mark an invoice paid and record the payment.
    ///
    /// The status flip is gated on `status = 'unpaid'` so a repeated or
    /// concurrent mark-as-paid surfaces as a conflict instead of a second
    /// payment row.
    #[instrument(skip(self, payment), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn mark_invoice_paid(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        payment: &CreatePayment,
    ) -> Result<Option<(Invoice, Payment)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_invoice_paid"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_utc = NOW()
            WHERE user_id = $1 AND invoice_id = $2 AND status = 'unpaid'
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark invoice paid: {}", e))
        })?;

        let invoice = match invoice {
            Some(inv) => inv,
            None => {
                // Distinguish "missing" from "already paid".
                let existing = self.get_invoice(user_id, invoice_id).await?;
                return match existing {
                    Some(_) => Err(AppError::Conflict(anyhow::anyhow!(
                        "Invoice is already paid"
                    ))),
                    None => Ok(None),
                };
            }
        };

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (payment_id, user_id, invoice_id, amount, payment_date, method, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING payment_id, user_id, invoice_id, amount, payment_date, method, notes, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(invoice_id)
        .bind(payment.amount)
        .bind(payment.payment_date)
        .bind(&payment.method)
        .bind(&payment.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit payment: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            "Invoice marked paid"
        );

        Ok(Some((invoice, payment)))
    }

    /// Delete an unpaid invoice, releasing any attached time logs so the
    /// hours become billable again.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let existing = self.get_invoice(user_id, invoice_id).await?;
        match existing {
            Some(inv) if inv.status == "unpaid" => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Paid invoices cannot be deleted"
                )))
            }
            None => return Ok(false),
        };

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            UPDATE time_logs
            SET invoiced = FALSE, invoice_id = NULL
            WHERE user_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to release time logs: {}", e))
        })?;

        let result = sqlx::query(
            r#"
            DELETE FROM invoices
            WHERE user_id = $1 AND invoice_id = $2 AND status = 'unpaid'
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit delete: {}", e))
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    /// List payments for an invoice.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn list_payments(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, user_id, invoice_id, amount, payment_date, method, notes, created_utc
            FROM payments
            WHERE user_id = $1 AND invoice_id = $2
            ORDER BY payment_date, created_utc
            "#,
        )
        .bind(user_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Expense Operations
    // -------------------------------------------------------------------------

    /// Create a new expense.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_expense(&self, input: &CreateExpense) -> Result<Expense, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_expense"])
            .start_timer();

        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (expense_id, user_id, project_id, category, amount, expense_date, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING expense_id, user_id, project_id, category, amount, expense_date, description, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(input.project_id)
        .bind(&input.category)
        .bind(input.amount)
        .bind(input.expense_date)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest(anyhow::anyhow!("Project does not exist"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create expense: {}", e)),
        })?;

        timer.observe_duration();

        info!(expense_id = %expense.expense_id, "Expense created");

        Ok(expense)
    }

    /// List expenses for a user.
    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    pub async fn list_expenses(
        &self,
        user_id: Uuid,
        filter: &ListExpensesFilter,
    ) -> Result<Vec<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_expenses"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT expense_id, user_id, project_id, category, amount, expense_date, description, created_utc
            FROM expenses
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR project_id = $2)
              AND ($3::varchar IS NULL OR category = $3)
              AND ($4::date IS NULL OR expense_date >= $4)
              AND ($5::date IS NULL OR expense_date <= $5)
              AND ($6::uuid IS NULL OR expense_id > $6)
            ORDER BY expense_id
            LIMIT $7
            "#,
        )
        .bind(user_id)
        .bind(filter.project_id)
        .bind(&filter.category)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list expenses: {}", e)))?;

        timer.observe_duration();

        Ok(expenses)
    }

    /// Update an expense.
    #[instrument(skip(self, input), fields(user_id = %user_id, expense_id = %expense_id))]
    pub async fn update_expense(
        &self,
        user_id: Uuid,
        expense_id: Uuid,
        input: &UpdateExpense,
    ) -> Result<Option<Expense>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_expense"])
            .start_timer();

        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET project_id = COALESCE($3, project_id),
                category = COALESCE($4, category),
                amount = COALESCE($5, amount),
                expense_date = COALESCE($6, expense_date),
                description = COALESCE($7, description)
            WHERE user_id = $1 AND expense_id = $2
            RETURNING expense_id, user_id, project_id, category, amount, expense_date, description, created_utc
            "#,
        )
        .bind(user_id)
        .bind(expense_id)
        .bind(input.project_id)
        .bind(&input.category)
        .bind(input.amount)
        .bind(input.expense_date)
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update expense: {}", e)))?;

        timer.observe_duration();

        Ok(expense)
    }

    /// Delete an expense.
    #[instrument(skip(self), fields(user_id = %user_id, expense_id = %expense_id))]
    pub async fn delete_expense(&self, user_id: Uuid, expense_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_expense"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM expenses
            WHERE user_id = $1 AND expense_id = $2
            "#,
        )
        .bind(user_id)
        .bind(expense_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete expense: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Report Operations
    // -------------------------------------------------------------------------

    /// Aggregate the dashboard summary for a user.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn financial_summary(&self, user_id: Uuid) -> Result<FinancialSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["financial_summary"])
            .start_timer();

        let outstanding_total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total), 0)
            FROM invoices
            WHERE user_id = $1 AND status = 'unpaid'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum outstanding invoices: {}", e))
        })?;

        let collected_total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payments
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e)))?;

        let unbilled_hours: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(hours), 0)
            FROM time_logs
            WHERE user_id = $1 AND billable = TRUE AND invoiced = FALSE
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum unbilled hours: {}", e))
        })?;

        let expense_total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM expenses
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum expenses: {}", e)))?;

        timer.observe_duration();

        Ok(FinancialSummary {
            outstanding_total: outstanding_total.unwrap_or(Decimal::ZERO),
            collected_total: collected_total.unwrap_or(Decimal::ZERO),
            unbilled_hours: unbilled_hours.unwrap_or(Decimal::ZERO),
            expense_total: expense_total.unwrap_or(Decimal::ZERO),
        })
    }
}
