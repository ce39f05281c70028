// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Record gateway over a PostgREST-compatible HTTP API.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use rollcall_app::{
    Column, Order, Participant, ParticipantId, ParticipantPayload, ParticipantQuery,
    ParticipantStatus, ParticipantUpdate, Predicate, RecordGateway, SortDirection, Table,
    Transaction, TransactionQuery, not_found, parse_amount_cents, parse_date, parse_datetime,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_CASCADE_FUNCTION: &str = "delete_participant_cascade";

const PARTICIPANT_SELECT: &str = "participant_id,name,employer,department,status,updated_at";
const TRANSACTION_SELECT: &str = "participant_id,tx_date,tx_type,amount,description";

/// Characters that must be quoted inside `or=(...)` / `and=(...)` trees.
const RESERVED: [char; 6] = [',', '.', ':', '(', ')', '"'];

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    api_key: String,
    cascade_function: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("remote.base_url must not be empty");
        }
        let base_url =
            Url::parse(trimmed).with_context(|| format!("parse remote.base_url {trimmed:?}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "remote.base_url {trimmed:?} must use http or https, got {}",
                base_url.scheme()
            );
        }
        if api_key.trim().is_empty() {
            bail!("remote.api_key must not be empty; set it in the config or ROLLCALL_API_KEY");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.trim().to_owned(),
            cascade_function: DEFAULT_CASCADE_FUNCTION.to_owned(),
            timeout,
            http,
        })
    }

    pub fn with_cascade_function(mut self, name: &str) -> Self {
        self.cascade_function = name.to_owned();
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cascade_function(&self) -> &str {
        &self.cascade_function
    }

    fn endpoint(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{path}", self.base_url()))
            .with_context(|| format!("build URL for {path}"))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn get_rows<T: DeserializeOwned>(
        &self,
        table: Table,
        params: &[(String, String)],
    ) -> Result<Vec<T>> {
        let url = self.endpoint(table.as_str(), params)?;
        debug!(url = %url, "GET");
        let response = self.send(self.http.get(url))?;
        response
            .json()
            .with_context(|| format!("decode {} rows", table.as_str()))
    }

    fn delete_where(&self, table: Table, participant_id: &ParticipantId) -> Result<()> {
        let url = self.endpoint(table.as_str(), &[eq_param(participant_id)])?;
        debug!(url = %url, "DELETE");
        self.send(self.http.delete(url).header("Prefer", "return=minimal"))?;
        Ok(())
    }
}

impl RecordGateway for Client {
    fn read_participants(&self, query: &ParticipantQuery) -> Result<Vec<Participant>> {
        let mut params = vec![("select".to_owned(), PARTICIPANT_SELECT.to_owned())];
        if let Some(filter) = &query.filter {
            params.extend(filter_params(filter)?);
        }
        params.push(order_param(query.order));
        if let Some(limit) = query.limit {
            params.push(("limit".to_owned(), limit.to_string()));
        }

        self.get_rows::<ParticipantRow>(Table::Participants, &params)?
            .into_iter()
            .map(ParticipantRow::into_participant)
            .collect()
    }

    fn read_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let mut params = vec![
            ("select".to_owned(), TRANSACTION_SELECT.to_owned()),
            eq_param(&query.participant_id),
            order_param(query.order),
        ];
        if let Some(limit) = query.limit {
            params.push(("limit".to_owned(), limit.to_string()));
        }

        self.get_rows::<TransactionRow>(Table::Transactions, &params)?
            .into_iter()
            .map(TransactionRow::into_transaction)
            .collect()
    }

    fn insert_participant(&self, payload: &ParticipantPayload) -> Result<()> {
        payload.validate()?;
        let url = self.endpoint(Table::Participants.as_str(), &[])?;
        debug!(url = %url, "POST");
        self.send(
            self.http
                .post(url)
                .header("Prefer", "return=minimal")
                .json(&[payload]),
        )?;
        Ok(())
    }

    fn update_participant(&self, id: &ParticipantId, update: &ParticipantUpdate) -> Result<()> {
        update.validate()?;
        let body = match update {
            ParticipantUpdate::Full(payload) => {
                serde_json::to_value(payload).context("encode participant payload")?
            }
            ParticipantUpdate::Status(status) => json!({ "status": status.as_str() }),
        };
        let url = self.endpoint(Table::Participants.as_str(), &[eq_param(id)])?;
        debug!(url = %url, "PATCH");
        self.send(
            self.http
                .patch(url)
                .header("Prefer", "return=minimal")
                .json(&body),
        )?;
        Ok(())
    }

    fn delete_participant(&self, id: &ParticipantId) -> Result<()> {
        self.delete_where(Table::Participants, id)
    }

    fn delete_transactions(&self, participant_id: &ParticipantId) -> Result<()> {
        self.delete_where(Table::Transactions, participant_id)
    }

    fn delete_participant_cascade(&self, id: &ParticipantId) -> Result<()> {
        let url = self.endpoint(&format!("rpc/{}", self.cascade_function), &[])?;
        debug!(url = %url, "POST");
        self.send(
            self.http
                .post(url)
                .json(&json!({ "p_participant_id": id_value(id) })),
        )?;
        Ok(())
    }

    fn read_departments(&self) -> Result<Vec<String>> {
        let params = [
            ("select".to_owned(), "department".to_owned()),
            ("department".to_owned(), "not.is.null".to_owned()),
        ];
        let rows = self.get_rows::<DepartmentRow>(Table::Participants, &params)?;
        Ok(rows.into_iter().filter_map(|row| row.department).collect())
    }

    fn read_one_participant(&self, id: &ParticipantId) -> Result<Participant> {
        let params = [
            ("select".to_owned(), PARTICIPANT_SELECT.to_owned()),
            eq_param(id),
            ("limit".to_owned(), "1".to_owned()),
        ];
        self.get_rows::<ParticipantRow>(Table::Participants, &params)?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(id))?
            .into_participant()
    }

    fn probe(&self) -> Result<()> {
        let params = [
            ("select".to_owned(), "participant_id".to_owned()),
            ("limit".to_owned(), "1".to_owned()),
        ];
        self.get_rows::<Value>(Table::Participants, &params)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ParticipantRow {
    participant_id: Value,
    name: String,
    employer: Option<String>,
    department: Option<String>,
    status: String,
    updated_at: Option<String>,
}

impl ParticipantRow {
    fn into_participant(self) -> Result<Participant> {
        let status = ParticipantStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("unknown participant status {:?}", self.status))?;
        Ok(Participant {
            participant_id: id_from_value(&self.participant_id)?,
            name: self.name,
            employer: self.employer,
            department: self.department,
            status,
            updated_at: self.updated_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    participant_id: Value,
    tx_date: String,
    tx_type: String,
    amount: Value,
    description: Option<String>,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<Transaction> {
        let amount_cents = match &self.amount {
            Value::Number(number) => parse_amount_cents(&number.to_string())?,
            Value::String(text) => parse_amount_cents(text)?,
            other => bail!("unsupported amount value {other}"),
        };
        Ok(Transaction {
            participant_id: id_from_value(&self.participant_id)?,
            tx_date: parse_date(&self.tx_date)?,
            tx_type: self.tx_type,
            amount_cents,
            description: self.description,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DepartmentRow {
    department: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn id_from_value(value: &Value) -> Result<ParticipantId> {
    match value {
        Value::Number(number) => Ok(ParticipantId::new(number.to_string())),
        Value::String(text) => Ok(ParticipantId::new(text.clone())),
        other => bail!("unsupported participant_id value {other}"),
    }
}

/// Integer keys travel as JSON numbers, anything else as strings.
fn id_value(id: &ParticipantId) -> Value {
    match id.as_integer() {
        Some(number) => json!(number),
        None => json!(id.as_str()),
    }
}

fn eq_param(participant_id: &ParticipantId) -> (String, String) {
    (
        Column::ParticipantId.as_str().to_owned(),
        format!("eq.{participant_id}"),
    )
}

fn order_param(order: Order) -> (String, String) {
    let direction = match order.direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    };
    (
        "order".to_owned(),
        format!("{}.{direction}", order.column.as_str()),
    )
}

/// Top-level conjunctions become separate query parameters; everything else
/// is a single parameter.
fn filter_params(predicate: &Predicate) -> Result<Vec<(String, String)>> {
    match predicate {
        Predicate::And(parts) => {
            let mut params = Vec::new();
            for part in parts {
                params.extend(filter_params(part)?);
            }
            Ok(params)
        }
        Predicate::Or(parts) => Ok(vec![(
            "or".to_owned(),
            format!("({})", nested_list(parts)?),
        )]),
        Predicate::Eq(column, value) => Ok(vec![(
            column.as_str().to_owned(),
            format!("eq.{value}"),
        )]),
        Predicate::ILike(column, needle) => Ok(vec![(
            column.as_str().to_owned(),
            format!("ilike.{}", ilike_pattern(needle)),
        )]),
        Predicate::NotNull(column) => {
            Ok(vec![(column.as_str().to_owned(), "not.is.null".to_owned())])
        }
    }
}

fn nested_list(parts: &[Predicate]) -> Result<String> {
    if parts.is_empty() {
        bail!("logical filter needs at least one condition");
    }
    let rendered = parts.iter().map(nested).collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(","))
}

fn nested(predicate: &Predicate) -> Result<String> {
    let rendered = match predicate {
        Predicate::Eq(column, value) => format!("{}.eq.{}", column.as_str(), quote(value)),
        Predicate::ILike(column, needle) => {
            format!("{}.ilike.{}", column.as_str(), quote(&ilike_pattern(needle)))
        }
        Predicate::NotNull(column) => format!("{}.not.is.null", column.as_str()),
        Predicate::And(parts) => format!("and({})", nested_list(parts)?),
        Predicate::Or(parts) => format!("or({})", nested_list(parts)?),
    };
    Ok(rendered)
}

/// Substring pattern with LIKE metacharacters in the needle escaped.
fn ilike_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('*');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

fn quote(value: &str) -> String {
    if !value.contains(RESERVED) && !value.contains('\\') {
        return value.to_owned();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {base_url} timed out");
    }
    anyhow!("cannot reach {base_url}: {error}")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = parsed
            .message
            .or(parsed.error_description)
            .or(parsed.error)
            .filter(|message| !message.is_empty());
        if let Some(message) = message {
            return anyhow!(message);
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}
