// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rollcall_app::{
    Column, Order, Participant, ParticipantId, ParticipantPayload, ParticipantQuery,
    ParticipantStatus, ParticipantUpdate, Predicate, RecordGateway, SortDirection, Table,
    Transaction, TransactionQuery, format_date, not_found, parse_date, parse_datetime,
};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};

pub const APP_NAME: &str = "rollcall";

const PARTICIPANT_COLUMNS: &str = "participant_id, name, employer, department, status, updated_at";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "participants",
        &[
            "participant_id",
            "name",
            "employer",
            "department",
            "status",
            "updated_at",
        ],
    ),
    (
        "transactions",
        &[
            "transaction_id",
            "participant_id",
            "tx_date",
            "tx_type",
            "amount_cents",
            "description",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_participants_updated_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_participants_updated_at ON participants (updated_at);",
    },
    RequiredIndex {
        name: "idx_participants_department",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_participants_department ON participants (department);",
    },
    RequiredIndex {
        name: "idx_transactions_participant_date",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_transactions_participant_date ON transactions (participant_id, tx_date);",
    },
];

/// SQLite-backed registry used for local and demo runs.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn bootstrap(&self) -> Result<()> {
        let conn = self.conn()?;
        if has_user_tables(&conn)? {
            validate_schema(&conn)?;
        } else {
            conn.execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            info!("created registry schema");
        }

        ensure_required_indexes(&conn)
    }

    /// Runs `f` against the underlying connection. Meant for maintenance and
    /// tests; gateway calls go through [`RecordGateway`].
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn()?;
        f(&conn)
    }

    pub fn create_participant(&self, payload: &ParticipantPayload) -> Result<ParticipantId> {
        self.create_participant_at(payload, OffsetDateTime::now_utc())
    }

    /// Inserts with an explicit `updated_at`, for seeding history.
    pub fn create_participant_at(
        &self,
        payload: &ParticipantPayload,
        updated_at: OffsetDateTime,
    ) -> Result<ParticipantId> {
        payload.validate()?;
        let conn = self.conn()?;
        conn.execute(
            "
            INSERT INTO participants (name, employer, department, status, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![
                payload.name,
                payload.employer,
                payload.department,
                payload.status.as_str(),
                format_stored_timestamp(updated_at)?,
            ],
        )
        .context("insert participant")?;
        Ok(ParticipantId::from(conn.last_insert_rowid()))
    }

    pub fn create_transaction(&self, transaction: &Transaction) -> Result<()> {
        let participant_id = sql_id(&transaction.participant_id)?;
        let conn = self.conn()?;
        conn.execute(
            "
            INSERT INTO transactions
              (participant_id, tx_date, tx_type, amount_cents, description)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![
                participant_id,
                format_date(transaction.tx_date),
                transaction.tx_type,
                transaction.amount_cents,
                transaction.description,
            ],
        )
        .context("insert transaction")?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }
}

impl RecordGateway for Store {
    fn read_participants(&self, query: &ParticipantQuery) -> Result<Vec<Participant>> {
        let mut values = Vec::new();
        let mut sql = format!("SELECT {PARTICIPANT_COLUMNS} FROM participants");
        if let Some(filter) = &query.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate_sql(Table::Participants, filter, &mut values)?);
        }
        sql.push_str(&order_sql(Table::Participants, query.order)?);
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        debug!(sql = %sql, "read participants");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).context("prepare participants query")?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), participant_from_row)
            .context("query participants")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect participants")
    }

    fn read_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let participant_id = sql_id(&query.participant_id)?;
        let mut sql = String::from(
            "
            SELECT participant_id, tx_date, tx_type, amount_cents, description
            FROM transactions
            WHERE participant_id = ?
            ",
        );
        sql.push_str(&order_sql(Table::Transactions, query.order)?);
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).context("prepare transactions query")?;
        let rows = stmt
            .query_map(params![participant_id], |row| {
                let tx_date_raw: String = row.get(1)?;
                Ok(Transaction {
                    participant_id: ParticipantId::from(row.get::<_, i64>(0)?),
                    tx_date: parse_date(&tx_date_raw).map_err(to_sql_error)?,
                    tx_type: row.get(2)?,
                    amount_cents: row.get(3)?,
                    description: row.get(4)?,
                })
            })
            .context("query transactions")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect transactions")
    }

    fn insert_participant(&self, payload: &ParticipantPayload) -> Result<()> {
        let id = self.create_participant(payload)?;
        debug!(participant_id = %id, "inserted participant");
        Ok(())
    }

    fn update_participant(&self, id: &ParticipantId, update: &ParticipantUpdate) -> Result<()> {
        update.validate()?;
        let key = sql_id(id)?;
        let updated_at = format_stored_timestamp(OffsetDateTime::now_utc())?;
        let conn = self.conn()?;
        let changed = match update {
            ParticipantUpdate::Full(payload) => conn
                .execute(
                    "
                    UPDATE participants
                    SET name = ?, employer = ?, department = ?, status = ?, updated_at = ?
                    WHERE participant_id = ?
                    ",
                    params![
                        payload.name,
                        payload.employer,
                        payload.department,
                        payload.status.as_str(),
                        updated_at,
                        key,
                    ],
                )
                .with_context(|| format!("update participant {id}"))?,
            ParticipantUpdate::Status(status) => conn
                .execute(
                    "UPDATE participants SET status = ?, updated_at = ? WHERE participant_id = ?",
                    params![status.as_str(), updated_at, key],
                )
                .with_context(|| format!("update status of participant {id}"))?,
        };
        debug!(participant_id = %id, changed, "updated participant");
        Ok(())
    }

    fn delete_participant(&self, id: &ParticipantId) -> Result<()> {
        let key = sql_id(id)?;
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM participants WHERE participant_id = ?",
            params![key],
        )
        .with_context(|| format!("delete participant {id}"))?;
        Ok(())
    }

    fn delete_transactions(&self, participant_id: &ParticipantId) -> Result<()> {
        let key = sql_id(participant_id)?;
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM transactions WHERE participant_id = ?",
                params![key],
            )
            .with_context(|| format!("delete transactions of participant {participant_id}"))?;
        debug!(participant_id = %participant_id, removed, "deleted transactions");
        Ok(())
    }

    fn delete_participant_cascade(&self, id: &ParticipantId) -> Result<()> {
        let key = sql_id(id)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("begin cascade delete")?;
        tx.execute(
            "DELETE FROM transactions WHERE participant_id = ?",
            params![key],
        )
        .with_context(|| format!("delete transactions of participant {id}"))?;
        tx.execute(
            "DELETE FROM participants WHERE participant_id = ?",
            params![key],
        )
        .with_context(|| format!("delete participant {id}"))?;
        tx.commit().context("commit cascade delete")
    }

    fn read_departments(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT department FROM participants WHERE department IS NOT NULL")
            .context("prepare departments query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query departments")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect departments")
    }

    fn read_one_participant(&self, id: &ParticipantId) -> Result<Participant> {
        let key = sql_id(id)?;
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE participant_id = ?"),
            params![key],
            participant_from_row,
        )
        .optional()
        .with_context(|| format!("load participant {id}"))?
        .ok_or_else(|| not_found(id))
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("ROLLCALL_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set ROLLCALL_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("rollcall.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); set remote.base_url for a remote store instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

/// Fixed-width UTC text so `ORDER BY updated_at` sorts chronologically.
pub fn format_stored_timestamp(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(time::UtcOffset::UTC)
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .context("format timestamp")
}

fn participant_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    let status_raw: String = row.get(4)?;
    let status = ParticipantStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown participant status {status_raw}"),
            )),
        )
    })?;
    let updated_at_raw: Option<String> = row.get(5)?;

    Ok(Participant {
        participant_id: ParticipantId::from(row.get::<_, i64>(0)?),
        name: row.get(1)?,
        employer: row.get(2)?,
        department: row.get(3)?,
        status,
        updated_at: updated_at_raw
            .as_deref()
            .map(parse_datetime)
            .transpose()
            .map_err(to_sql_error)?,
    })
}

fn sql_column(table: Table, column: Column) -> Result<&'static str> {
    let name = match (table, column) {
        (Table::Participants, Column::ParticipantId)
        | (Table::Transactions, Column::ParticipantId) => "participant_id",
        (Table::Participants, Column::Name) => "name",
        (Table::Participants, Column::Employer) => "employer",
        (Table::Participants, Column::Department) => "department",
        (Table::Participants, Column::Status) => "status",
        (Table::Participants, Column::UpdatedAt) => "updated_at",
        (Table::Transactions, Column::TxDate) => "tx_date",
        (Table::Transactions, Column::TxType) => "tx_type",
        (Table::Transactions, Column::Amount) => "amount_cents",
        (Table::Transactions, Column::Description) => "description",
        _ => bail!(
            "column {} does not belong to {}",
            column.as_str(),
            table.as_str()
        ),
    };
    Ok(name)
}

fn predicate_sql(table: Table, predicate: &Predicate, values: &mut Vec<Value>) -> Result<String> {
    let sql = match predicate {
        Predicate::Eq(column, value) => {
            values.push(Value::Text(value.clone()));
            format!("{} = ?", sql_column(table, *column)?)
        }
        Predicate::ILike(column, needle) => {
            values.push(Value::Text(format!("%{}%", escape_like(needle))));
            format!(
                "fold_case({}) LIKE fold_case(?) ESCAPE '\\'",
                sql_column(table, *column)?
            )
        }
        Predicate::NotNull(column) => format!("{} IS NOT NULL", sql_column(table, *column)?),
        Predicate::And(parts) => join_predicates(table, parts, " AND ", "1", values)?,
        Predicate::Or(parts) => join_predicates(table, parts, " OR ", "0", values)?,
    };
    Ok(sql)
}

fn join_predicates(
    table: Table,
    parts: &[Predicate],
    separator: &str,
    empty: &str,
    values: &mut Vec<Value>,
) -> Result<String> {
    if parts.is_empty() {
        return Ok(empty.to_owned());
    }
    let rendered = parts
        .iter()
        .map(|part| predicate_sql(table, part, values).map(|sql| format!("({sql})")))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(separator))
}

/// Nulls last ascending and first descending, with a stable tiebreak.
fn order_sql(table: Table, order: Order) -> Result<String> {
    let column = sql_column(table, order.column)?;
    let tiebreak = match table {
        Table::Participants => "participant_id",
        Table::Transactions => "transaction_id",
    };
    let sql = match order.direction {
        SortDirection::Asc => format!(" ORDER BY {column} IS NULL, {column} ASC, {tiebreak} ASC"),
        SortDirection::Desc => {
            format!(" ORDER BY {column} IS NULL DESC, {column} DESC, {tiebreak} DESC")
        }
    };
    Ok(sql)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn sql_id(id: &ParticipantId) -> Result<i64> {
    id.as_integer()
        .ok_or_else(|| anyhow!("participant id {id} is not a valid key"))
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            bail!(
                "database is missing required table `{table}`; point storage.db_path at a rollcall database"
            );
        }

        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")?;
    register_functions(conn)
}

/// SQLite's own `lower` only folds ASCII.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value = ctx.get::<Option<String>>(0)?;
            Ok(value.map(|text| text.to_lowercase()))
        },
    )
    .context("register fold_case")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}
