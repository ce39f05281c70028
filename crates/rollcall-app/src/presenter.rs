// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::ParticipantId;
use crate::model::{Participant, Transaction};
use crate::values::{format_amount, format_date};

pub const EMPTY_TEXT: &str = "No results.";
pub const LOADING_TEXT: &str = "Loading...";
pub const TRANSACTIONS_PLACEHOLDER: &str = "Select a record to view its transactions.";
pub const VIEW_AFFORDANCE: &str = "[View]";

pub const RECENT_COLUMNS: [&str; 4] = ["ID", "Name", "Department", "Status"];
pub const RECORD_COLUMNS: [&str; 5] = ["ID", "Name", "Employer", "Status", ""];
pub const TRANSACTION_COLUMNS: [&str; 4] = ["Date", "Type", "Amount", "Description"];

/// Content of one table on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel<T> {
    /// Nothing requested yet; shows the placeholder text.
    Idle(&'static str),
    Loading,
    Loaded(Vec<T>),
    Failed(String),
}

impl<T> Panel<T> {
    pub fn rows(&self) -> &[T] {
        match self {
            Self::Loaded(rows) => rows,
            _ => &[],
        }
    }
}

impl<T> Default for Panel<T> {
    fn default() -> Self {
        Self::Loading
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedRow {
    Record {
        id: ParticipantId,
        cells: Vec<String>,
    },
    /// One cell stretched over every declared column.
    Spanning { text: String, span: usize },
}

impl RenderedRow {
    pub fn id(&self) -> Option<&ParticipantId> {
        match self {
            Self::Record { id, .. } => Some(id),
            Self::Spanning { .. } => None,
        }
    }

    pub fn cells(&self) -> Vec<String> {
        match self {
            Self::Record { cells, .. } => cells.clone(),
            Self::Spanning { text, .. } => vec![text.clone()],
        }
    }

    fn spanning(text: impl Into<String>, span: usize) -> Self {
        Self::Spanning {
            text: text.into(),
            span,
        }
    }
}

/// Full replacement rendering of a panel against its declared columns.
pub fn render_panel<T>(
    panel: &Panel<T>,
    columns: &[&str],
    render_row: impl Fn(&T) -> RenderedRow,
) -> Vec<RenderedRow> {
    let span = columns.len();
    match panel {
        Panel::Idle(text) => vec![RenderedRow::spanning(*text, span)],
        Panel::Loading => vec![RenderedRow::spanning(LOADING_TEXT, span)],
        Panel::Failed(message) => vec![RenderedRow::spanning(message.clone(), span)],
        Panel::Loaded(rows) if rows.is_empty() => vec![RenderedRow::spanning(EMPTY_TEXT, span)],
        Panel::Loaded(rows) => rows.iter().map(render_row).collect(),
    }
}

pub fn recent_rows(panel: &Panel<Participant>) -> Vec<RenderedRow> {
    render_panel(panel, &RECENT_COLUMNS, |participant| RenderedRow::Record {
        id: participant.participant_id.clone(),
        cells: vec![
            participant.participant_id.to_string(),
            participant.name.clone(),
            participant.department.clone().unwrap_or_default(),
            participant.status.as_str().to_owned(),
        ],
    })
}

pub fn record_rows(panel: &Panel<Participant>) -> Vec<RenderedRow> {
    render_panel(panel, &RECORD_COLUMNS, |participant| RenderedRow::Record {
        id: participant.participant_id.clone(),
        cells: vec![
            participant.participant_id.to_string(),
            participant.name.clone(),
            participant.employer.clone().unwrap_or_default(),
            participant.status.as_str().to_owned(),
            VIEW_AFFORDANCE.to_owned(),
        ],
    })
}

pub fn transaction_rows(panel: &Panel<Transaction>) -> Vec<RenderedRow> {
    render_panel(panel, &TRANSACTION_COLUMNS, |transaction| {
        RenderedRow::Record {
            id: transaction.participant_id.clone(),
            cells: vec![
                format_date(transaction.tx_date),
                transaction.tx_type.clone(),
                format_amount(transaction.amount_cents),
                transaction.description.clone().unwrap_or_default(),
            ],
        }
    })
}
