//! PostgreSQL store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::Query,
    PgConnection, Pool, Postgres, Row, Transaction,
};

use super::{IncidentSink, StoreTx, WorkflowStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        activity::{ActivityEntry, NewActivity},
        batch::{Aggregate, BatchQuery, Ledger, Target, WorkflowBatch, WorkflowLine},
        incident::{Incident, IncidentQuery, NewIncident},
        inventory::{CreateInventoryItem, InventoryItem, InventoryQuery, Reservation},
        request::{Request, RequestQuery},
        status::{Action, BatchStatus, RequestStatus, Signoff, Signoffs},
    },
};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Actions with a `<past_tense>_by` / `<past_tense>_at` pair on batch and line tables
const BATCH_STAMPS: &[Action] = &[
    Action::Submit,
    Action::Verify,
    Action::Approve,
    Action::Release,
    Action::Return,
    Action::Cancel,
];

const REQUEST_STAMPS: &[Action] = &[
    Action::Submit,
    Action::Verify,
    Action::Approve,
    Action::Decline,
    Action::Procure,
    Action::Fulfill,
    Action::Cancel,
];

const BATCH_COLUMNS: &[&str] = &[
    "requested_by",
    "project_id",
    "purpose",
    "expected_return",
    "status",
    "cancel_reason",
    "created_at",
    "updated_at",
];

const LINE_COLUMNS: &[&str] = &[
    "batch_id",
    "inventory_item_id",
    "quantity",
    "quantity_returned",
    "status",
    "condition_returned",
    "return_notes",
    "notes",
    "requested_by",
    "project_id",
    "purpose",
    "expected_return",
    "cancel_reason",
    "created_at",
    "updated_at",
];

const BATCH_UPDATE_COLUMNS: &[&str] = &["status", "expected_return", "cancel_reason", "updated_at"];

const LINE_UPDATE_COLUMNS: &[&str] = &[
    "status",
    "quantity_returned",
    "condition_returned",
    "return_notes",
    "expected_return",
    "cancel_reason",
    "updated_at",
];

const REQUEST_COLUMNS: &[&str] = &[
    "request_type",
    "project_id",
    "description",
    "quantity",
    "unit",
    "urgency",
    "date_needed",
    "estimated_cost",
    "status",
    "requested_by",
    "remarks",
    "created_at",
    "updated_at",
];

const REQUEST_UPDATE_COLUMNS: &[&str] = &["status", "remarks", "updated_at"];

fn stamp_columns(actions: &[Action]) -> Vec<String> {
    actions
        .iter()
        .flat_map(|a| {
            [
                format!("{}_by", a.past_tense()),
                format!("{}_at", a.past_tense()),
            ]
        })
        .collect()
}

/// `INSERT INTO table (...) VALUES ($1, ...) RETURNING id`
fn insert_sql(table: &str, columns: &[&str], stamps: &[Action]) -> String {
    let mut names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    names.extend(stamp_columns(stamps));
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
        table,
        names.join(", "),
        placeholders.join(", ")
    )
}

/// `UPDATE table SET ... WHERE id = $n AND status = $n+1`
fn update_sql(table: &str, columns: &[&str], stamps: &[Action]) -> String {
    let mut names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    names.extend(stamp_columns(stamps));
    let assignments: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{} = ${}", name, i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE id = ${} AND status = ${}",
        table,
        assignments.join(", "),
        names.len() + 1,
        names.len() + 2
    )
}

fn bind_stamps<'q>(mut query: PgQuery<'q>, signoffs: &Signoffs, actions: &[Action]) -> PgQuery<'q> {
    for action in actions {
        let signoff = signoffs.get(*action);
        query = query.bind(signoff.map(|s| s.by)).bind(signoff.map(|s| s.at));
    }
    query
}

fn read_signoffs(row: &PgRow, actions: &[Action]) -> Signoffs {
    let mut signoffs = Signoffs::default();
    for action in actions {
        let by: Option<i32> = row
            .try_get(format!("{}_by", action.past_tense()).as_str())
            .ok()
            .flatten();
        let at: Option<DateTime<Utc>> = row
            .try_get(format!("{}_at", action.past_tense()).as_str())
            .ok()
            .flatten();
        if let (Some(by), Some(at)) = (by, at) {
            signoffs.set(*action, Signoff { by, at });
        }
    }
    signoffs
}

fn parse_column<T>(row: &PgRow, column: &str) -> AppResult<T>
where
    T: std::str::FromStr<Err = AppError>,
{
    let text: String = row.try_get(column)?;
    text.parse()
}

fn parse_optional<T>(row: &PgRow, column: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr<Err = AppError>,
{
    let text: Option<String> = row.try_get(column)?;
    text.map(|t| t.parse()).transpose()
}

fn batch_from_row(ledger: Ledger, row: &PgRow) -> AppResult<WorkflowBatch> {
    let status: BatchStatus = parse_column(row, "status")?;
    Ok(WorkflowBatch {
        id: row.try_get("id")?,
        ledger,
        reference: row
            .try_get::<Option<String>, _>("reference")?
            .unwrap_or_default(),
        requested_by: row.try_get("requested_by")?,
        project_id: row.try_get("project_id")?,
        purpose: row.try_get("purpose")?,
        expected_return: row.try_get("expected_return")?,
        status,
        signoffs: read_signoffs(row, BATCH_STAMPS),
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        loaded_status: status,
    })
}

fn line_from_row(ledger: Ledger, row: &PgRow) -> AppResult<WorkflowLine> {
    let status: BatchStatus = parse_column(row, "status")?;
    Ok(WorkflowLine {
        id: row.try_get("id")?,
        ledger,
        batch_id: row.try_get("batch_id")?,
        reference: row.try_get("reference")?,
        inventory_item_id: row.try_get("inventory_item_id")?,
        quantity: row.try_get("quantity")?,
        quantity_returned: row.try_get("quantity_returned")?,
        status,
        condition_returned: parse_optional(row, "condition_returned")?,
        return_notes: row.try_get("return_notes")?,
        notes: row.try_get("notes")?,
        requested_by: row.try_get("requested_by")?,
        project_id: row.try_get("project_id")?,
        purpose: row.try_get("purpose")?,
        expected_return: row.try_get("expected_return")?,
        signoffs: read_signoffs(row, BATCH_STAMPS),
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        loaded_status: status,
    })
}

fn request_from_row(row: &PgRow) -> AppResult<Request> {
    let status: RequestStatus = parse_column(row, "status")?;
    Ok(Request {
        id: row.try_get("id")?,
        reference: row
            .try_get::<Option<String>, _>("reference")?
            .unwrap_or_default(),
        request_type: parse_column(row, "request_type")?,
        project_id: row.try_get("project_id")?,
        description: row.try_get("description")?,
        quantity: row.try_get("quantity")?,
        unit: row.try_get("unit")?,
        urgency: parse_column(row, "urgency")?,
        date_needed: row.try_get("date_needed")?,
        estimated_cost: row.try_get("estimated_cost")?,
        status,
        requested_by: row.try_get("requested_by")?,
        signoffs: read_signoffs(row, REQUEST_STAMPS),
        remarks: row.try_get("remarks")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        loaded_status: status,
    })
}

fn incident_from_row(row: &PgRow) -> AppResult<Incident> {
    Ok(Incident {
        id: row.try_get("id")?,
        inventory_item_id: row.try_get("inventory_item_id")?,
        source: parse_column(row, "source")?,
        source_id: row.try_get("source_id")?,
        batch_id: row.try_get("batch_id")?,
        incident_type: parse_column(row, "incident_type")?,
        severity: parse_column(row, "severity")?,
        quantity: row.try_get("quantity")?,
        description: row.try_get("description")?,
        reported_by: row.try_get("reported_by")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn load_aggregate(
    conn: &mut PgConnection,
    ledger: Ledger,
    target: Target,
) -> AppResult<Aggregate> {
    match target {
        Target::Batch(id) => {
            let row = sqlx::query(&format!(
                "SELECT * FROM {} WHERE id = $1",
                ledger.batch_table()
            ))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("{} {} not found", ledger.batch_label(), id))
            })?;
            let batch = batch_from_row(ledger, &row)?;

            let rows = sqlx::query(&format!(
                "SELECT * FROM {} WHERE batch_id = $1 ORDER BY id",
                ledger.line_table()
            ))
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;
            let lines = rows
                .iter()
                .map(|r| line_from_row(ledger, r))
                .collect::<AppResult<Vec<_>>>()?;

            Ok(Aggregate {
                ledger,
                batch: Some(batch),
                lines,
            })
        }
        Target::Item(id) => {
            let row = sqlx::query(&format!(
                "SELECT * FROM {} WHERE id = $1",
                ledger.line_table()
            ))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("{} {} not found", ledger.line_label(), id))
            })?;
            let line = line_from_row(ledger, &row)?;
            if let Some(batch_id) = line.batch_id {
                return Err(AppError::Validation(format!(
                    "{} {} belongs to batch {}; act on the batch",
                    ledger.line_label(),
                    id,
                    batch_id
                )));
            }
            Ok(Aggregate {
                ledger,
                batch: None,
                lines: vec![line],
            })
        }
    }
}

fn conflict(label: &str) -> AppError {
    AppError::ConcurrencyConflict(format!(
        "{} was modified by another request; reload and try again",
        label
    ))
}

/// Statuses of batches and standalone lines together
fn union_sql(ledger: Ledger, columns: &str) -> String {
    format!(
        "SELECT {cols} FROM {batches} UNION ALL SELECT {cols} FROM {lines} WHERE batch_id IS NULL",
        cols = columns,
        batches = ledger.batch_table(),
        lines = ledger.line_table()
    )
}

/// PostgreSQL-backed [`WorkflowStore`]
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn create_inventory_item(&self, data: &CreateInventoryItem) -> AppResult<InventoryItem> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM inventory_items WHERE code = $1)")
                .bind(&data.code)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            return Err(AppError::Validation(format!(
                "Inventory code {} already exists",
                data.code
            )));
        }

        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            INSERT INTO inventory_items
                (code, name, category, unit, total_quantity, available_quantity, is_critical)
            VALUES ($1, $2, $3, $4, $5, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&data.code)
        .bind(&data.name)
        .bind(&data.category)
        .bind(data.unit.as_deref().unwrap_or("pcs"))
        .bind(data.quantity)
        .bind(data.is_critical)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    async fn get_inventory_item(&self, id: i64) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory item {} not found", id)))
    }

    async fn list_inventory(&self, query: &InventoryQuery) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory_items
            WHERE ($1::TEXT IS NULL OR category = $1)
              AND (NOT $2 OR available_quantity > 0)
            ORDER BY name
            "#,
        )
        .bind(&query.category)
        .bind(query.available_only.unwrap_or(false))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn list_aggregates(
        &self,
        ledger: Ledger,
        query: &BatchQuery,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Aggregate>> {
        let sql = format!(
            r#"
            SELECT is_batch, id FROM ({}) a
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::INT IS NULL OR requested_by = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            format!(
                "SELECT TRUE AS is_batch, id, status, requested_by, created_at FROM {} \
                 UNION ALL SELECT FALSE, id, status, requested_by, created_at FROM {} \
                 WHERE batch_id IS NULL",
                ledger.batch_table(),
                ledger.line_table()
            )
        );
        let keys = sqlx::query(&sql)
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.requested_by)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut conn = self.pool.acquire().await?;
        let mut aggregates = Vec::with_capacity(keys.len());
        for key in keys {
            let id: i64 = key.try_get("id")?;
            let target = if key.try_get::<bool, _>("is_batch")? {
                Target::Batch(id)
            } else {
                Target::Item(id)
            };
            aggregates.push(load_aggregate(&mut *conn, ledger, target).await?);
        }
        Ok(aggregates)
    }

    async fn status_counts(&self, ledger: Ledger) -> AppResult<Vec<(BatchStatus, i64)>> {
        let rows = sqlx::query(&format!(
            "SELECT status, COUNT(*)::BIGINT AS total FROM ({}) s GROUP BY status ORDER BY status",
            union_sql(ledger, "status")
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> AppResult<(BatchStatus, i64)> {
                Ok((parse_column(row, "status")?, row.try_get("total")?))
            })
            .collect()
    }

    async fn count_overdue(&self, ledger: Ledger, now: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            r#"
            SELECT COUNT(*)::BIGINT FROM ({}) s
            WHERE status IN ('released', 'partially_returned')
              AND expected_return < $1
            "#,
            union_sql(ledger, "status, expected_return")
        ))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn outstanding_quantity(&self, ledger: Ledger) -> AppResult<i64> {
        let holding: Vec<String> = BatchStatus::ALL
            .iter()
            .filter(|s| ledger.holds_stock(**s))
            .map(|s| s.as_str().to_string())
            .collect();
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(quantity - quantity_returned), 0)::BIGINT FROM {} WHERE status = ANY($1)",
            ledger.line_table()
        ))
        .bind(holding)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn list_requests(
        &self,
        query: &RequestQuery,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Request>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM requests
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::INT IS NULL OR project_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.project_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    async fn list_activity(&self, table_name: &str, record_id: i64) -> AppResult<Vec<ActivityEntry>> {
        let entries = sqlx::query_as::<_, ActivityEntry>(
            "SELECT * FROM activity_logs WHERE table_name = $1 AND record_id = $2 ORDER BY id",
        )
        .bind(table_name)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn list_incidents(&self, query: &IncidentQuery) -> AppResult<Vec<Incident>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM incidents
            WHERE ($1::TEXT IS NULL OR severity = $1)
              AND ($2::BIGINT IS NULL OR inventory_item_id = $2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(query.severity.map(|s| s.as_str()))
        .bind(query.inventory_item_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(incident_from_row).collect()
    }

    async fn get_incident(&self, id: i64) -> AppResult<Incident> {
        let row = sqlx::query("SELECT * FROM incidents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))?;
        incident_from_row(&row)
    }
}

#[async_trait]
impl IncidentSink for PgStore {
    async fn record_incident(&self, incident: &NewIncident) -> AppResult<Incident> {
        let row = sqlx::query(
            r#"
            INSERT INTO incidents
                (inventory_item_id, source, source_id, batch_id, incident_type,
                 severity, quantity, description, reported_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(incident.inventory_item_id)
        .bind(incident.source.as_str())
        .bind(incident.source_id)
        .bind(incident.batch_id)
        .bind(incident.incident_type.as_str())
        .bind(incident.severity.as_str())
        .bind(incident.quantity)
        .bind(&incident.description)
        .bind(incident.reported_by)
        .fetch_one(&self.pool)
        .await?;
        incident_from_row(&row)
    }
}

/// One database transaction; rolled back when dropped uncommitted
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    async fn insert_line(&mut self, line: &WorkflowLine, ledger: Ledger) -> AppResult<i64> {
        let sql = insert_sql(ledger.line_table(), LINE_COLUMNS, BATCH_STAMPS);
        let query = sqlx::query(&sql)
            .bind(line.batch_id)
            .bind(line.inventory_item_id)
            .bind(line.quantity)
            .bind(line.quantity_returned)
            .bind(line.status.as_str())
            .bind(line.condition_returned.map(|c| c.as_str()))
            .bind(&line.return_notes)
            .bind(&line.notes)
            .bind(line.requested_by)
            .bind(line.project_id)
            .bind(&line.purpose)
            .bind(line.expected_return)
            .bind(&line.cancel_reason)
            .bind(line.created_at)
            .bind(line.updated_at);
        let id: i64 = bind_stamps(query, &line.signoffs, BATCH_STAMPS)
            .fetch_one(&mut *self.tx)
            .await?
            .try_get("id")?;
        Ok(id)
    }

    async fn set_reference(&mut self, table: &str, id: i64, reference: &str) -> AppResult<()> {
        sqlx::query(&format!("UPDATE {} SET reference = $1 WHERE id = $2", table))
            .bind(reference)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn load(&mut self, ledger: Ledger, target: Target) -> AppResult<Aggregate> {
        load_aggregate(&mut *self.tx, ledger, target).await
    }

    async fn insert_aggregate(&mut self, draft: &Aggregate) -> AppResult<Aggregate> {
        let ledger = draft.ledger;
        let mut stored = draft.clone();

        let batch_id = match stored.batch.as_mut() {
            Some(batch) => {
                let sql = insert_sql(ledger.batch_table(), BATCH_COLUMNS, BATCH_STAMPS);
                let query = sqlx::query(&sql)
                    .bind(batch.requested_by)
                    .bind(batch.project_id)
                    .bind(&batch.purpose)
                    .bind(batch.expected_return)
                    .bind(batch.status.as_str())
                    .bind(&batch.cancel_reason)
                    .bind(batch.created_at)
                    .bind(batch.updated_at);
                let id: i64 = bind_stamps(query, &batch.signoffs, BATCH_STAMPS)
                    .fetch_one(&mut *self.tx)
                    .await?
                    .try_get("id")?;

                batch.id = id;
                batch.ledger = ledger;
                batch.reference = ledger.reference(id, batch.created_at);
                batch.loaded_status = batch.status;
                let reference = batch.reference.clone();
                self.set_reference(ledger.batch_table(), id, &reference)
                    .await?;
                Some(id)
            }
            None => None,
        };

        for line in stored.lines.iter_mut() {
            line.ledger = ledger;
            line.batch_id = batch_id;
            line.id = self.insert_line(line, ledger).await?;
            line.loaded_status = line.status;
            if batch_id.is_none() {
                let reference = ledger.reference(line.id, line.created_at);
                self.set_reference(ledger.line_table(), line.id, &reference)
                    .await?;
                line.reference = Some(reference);
            }
        }

        Ok(stored)
    }

    async fn save(&mut self, aggregate: &Aggregate) -> AppResult<()> {
        let ledger = aggregate.ledger;
        let label = aggregate.label();

        if let Some(batch) = &aggregate.batch {
            let sql = update_sql(ledger.batch_table(), BATCH_UPDATE_COLUMNS, BATCH_STAMPS);
            let query = sqlx::query(&sql)
                .bind(batch.status.as_str())
                .bind(batch.expected_return)
                .bind(&batch.cancel_reason)
                .bind(batch.updated_at);
            let result = bind_stamps(query, &batch.signoffs, BATCH_STAMPS)
                .bind(batch.id)
                .bind(batch.loaded_status.as_str())
                .execute(&mut *self.tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(conflict(&label));
            }
        }

        let sql = update_sql(ledger.line_table(), LINE_UPDATE_COLUMNS, BATCH_STAMPS);
        for line in &aggregate.lines {
            let query = sqlx::query(&sql)
                .bind(line.status.as_str())
                .bind(line.quantity_returned)
                .bind(line.condition_returned.map(|c| c.as_str()))
                .bind(&line.return_notes)
                .bind(line.expected_return)
                .bind(&line.cancel_reason)
                .bind(line.updated_at);
            let result = bind_stamps(query, &line.signoffs, BATCH_STAMPS)
                .bind(line.id)
                .bind(line.loaded_status.as_str())
                .execute(&mut *self.tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(conflict(&label));
            }
        }
        Ok(())
    }

    async fn try_reserve(&mut self, inventory_item_id: i64, quantity: i32) -> AppResult<Reservation> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE inventory_items
            SET available_quantity = available_quantity - $1, updated_at = NOW()
            WHERE id = $2 AND available_quantity >= $1
            RETURNING available_quantity
            "#,
        )
        .bind(quantity)
        .bind(inventory_item_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(Reservation::Reserved { remaining });
        }

        let available: i32 =
            sqlx::query_scalar("SELECT available_quantity FROM inventory_items WHERE id = $1")
                .bind(inventory_item_id)
                .fetch_optional(&mut *self.tx)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Inventory item {} not found", inventory_item_id))
                })?;
        Ok(Reservation::Insufficient { available })
    }

    async fn restore(&mut self, inventory_item_id: i64, quantity: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET available_quantity = available_quantity + $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(quantity)
        .bind(inventory_item_id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Inventory item {} not found",
                inventory_item_id
            )));
        }
        Ok(())
    }

    async fn inventory_item(&mut self, id: i64) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory item {} not found", id)))
    }

    async fn insert_request(&mut self, draft: &Request) -> AppResult<Request> {
        let sql = insert_sql("requests", REQUEST_COLUMNS, REQUEST_STAMPS);
        let query = sqlx::query(&sql)
            .bind(draft.request_type.as_str())
            .bind(draft.project_id)
            .bind(&draft.description)
            .bind(draft.quantity)
            .bind(&draft.unit)
            .bind(draft.urgency.as_str())
            .bind(draft.date_needed)
            .bind(draft.estimated_cost)
            .bind(draft.status.as_str())
            .bind(draft.requested_by)
            .bind(&draft.remarks)
            .bind(draft.created_at)
            .bind(draft.updated_at);
        let id: i64 = bind_stamps(query, &draft.signoffs, REQUEST_STAMPS)
            .fetch_one(&mut *self.tx)
            .await?
            .try_get("id")?;

        let mut request = draft.clone();
        request.id = id;
        request.reference = Request::reference_for(id, request.created_at);
        request.loaded_status = request.status;
        let reference = request.reference.clone();
        self.set_reference("requests", id, &reference).await?;
        Ok(request)
    }

    async fn load_request(&mut self, id: i64) -> AppResult<Request> {
        let row = sqlx::query("SELECT * FROM requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?;
        request_from_row(&row)
    }

    async fn save_request(&mut self, request: &Request) -> AppResult<()> {
        let sql = update_sql("requests", REQUEST_UPDATE_COLUMNS, REQUEST_STAMPS);
        let query = sqlx::query(&sql)
            .bind(request.status.as_str())
            .bind(&request.remarks)
            .bind(request.updated_at);
        let result = bind_stamps(query, &request.signoffs, REQUEST_STAMPS)
            .bind(request.id)
            .bind(request.loaded_status.as_str())
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(conflict(&request.label()));
        }
        Ok(())
    }

    async fn log_activity(&mut self, entry: &NewActivity) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (user_id, action, description, table_name, record_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.description)
        .bind(entry.table_name)
        .bind(entry.record_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sql_guards_on_loaded_status() {
        let sql = update_sql("withdrawals", &["status", "updated_at"], &[Action::Approve]);
        assert_eq!(
            sql,
            "UPDATE withdrawals SET status = $1, updated_at = $2, approved_by = $3, approved_at = $4 \
             WHERE id = $5 AND status = $6"
        );
    }

    #[test]
    fn test_insert_sql_placeholders() {
        let sql = insert_sql("borrowed_tool_batches", &["status"], &[Action::Submit]);
        assert_eq!(
            sql,
            "INSERT INTO borrowed_tool_batches (status, submitted_by, submitted_at) \
             VALUES ($1, $2, $3) RETURNING id"
        );
    }
}
