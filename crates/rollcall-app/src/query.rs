// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::ids::ParticipantId;
use crate::model::{Participant, SortDirection, Transaction};
use crate::values::format_date;

pub const RECENT_LIMIT: usize = 3;
pub const TRANSACTION_LIMIT: usize = 3;
pub const PROBE_LIMIT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Table {
    Participants,
    Transactions,
}

impl Table {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Participants => "participants",
            Self::Transactions => "transactions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    ParticipantId,
    Name,
    Employer,
    Department,
    Status,
    UpdatedAt,
    TxDate,
    TxType,
    Amount,
    Description,
}

impl Column {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParticipantId => "participant_id",
            Self::Name => "name",
            Self::Employer => "employer",
            Self::Department => "department",
            Self::Status => "status",
            Self::UpdatedAt => "updated_at",
            Self::TxDate => "tx_date",
            Self::TxType => "tx_type",
            Self::Amount => "amount",
            Self::Description => "description",
        }
    }
}

/// Row filter understood by every gateway backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    Eq(Column, String),
    /// Case-insensitive substring match; the needle carries no wildcards.
    ILike(Column, String),
    NotNull(Column),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        match self {
            Self::Eq(column, value) => record.column_text(*column).as_deref() == Some(value),
            Self::ILike(column, needle) => record.column_text(*column).is_some_and(|text| {
                text.to_lowercase().contains(&needle.to_lowercase())
            }),
            Self::NotNull(column) => record.column_text(*column).is_some(),
            Self::And(parts) => parts.iter().all(|part| part.matches(record)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(record)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: Column,
    pub direction: SortDirection,
}

impl Order {
    pub const fn asc(column: Column) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    pub const fn desc(column: Column) -> Self {
        Self {
            column,
            direction: SortDirection::Desc,
        }
    }

    /// Nulls sort last ascending and first descending, like Postgres.
    pub fn compare<R: Record>(&self, left: &R, right: &R) -> Ordering {
        let ordering = left.compare_column(right, self.column);
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantQuery {
    pub filter: Option<Predicate>,
    pub order: Order,
    pub limit: Option<usize>,
}

impl ParticipantQuery {
    /// Management list: filtered, ascending by id, unbounded.
    pub fn management(filter: &ParticipantFilter) -> Self {
        Self {
            filter: filter.predicate(),
            order: Order::asc(Column::ParticipantId),
            limit: None,
        }
    }

    /// Recency summary: newest three by `updated_at`.
    pub fn recent() -> Self {
        Self {
            filter: None,
            order: Order::desc(Column::UpdatedAt),
            limit: Some(RECENT_LIMIT),
        }
    }

    pub fn probe() -> Self {
        Self {
            filter: None,
            order: Order::asc(Column::ParticipantId),
            limit: Some(PROBE_LIMIT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionQuery {
    pub participant_id: ParticipantId,
    pub order: Order,
    pub limit: Option<usize>,
}

impl TransactionQuery {
    pub fn recent_for(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            order: Order::desc(Column::TxDate),
            limit: Some(TRANSACTION_LIMIT),
        }
    }
}

/// Inputs of the management list filter bar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParticipantFilter {
    pub search: String,
    pub department: String,
}

impl ParticipantFilter {
    pub fn new(search: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            department: department.into(),
        }
    }

    /// `None` when both inputs are blank.
    pub fn predicate(&self) -> Option<Predicate> {
        let term = self.search.trim();
        let department = self.department.trim();

        let mut parts = Vec::new();
        if !term.is_empty() {
            parts.push(Predicate::Or(vec![
                Predicate::ILike(Column::Name, term.to_owned()),
                Predicate::ILike(Column::Employer, term.to_owned()),
            ]));
        }
        if !department.is_empty() {
            parts.push(Predicate::Eq(Column::Department, department.to_owned()));
        }

        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::And(parts)),
        }
    }
}

/// Distinct, non-blank, ascending department names.
pub fn department_vocabulary<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|value| {
            let trimmed = value.as_ref().trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Column access used to evaluate predicates and orderings in memory.
pub trait Record {
    fn column_text(&self, column: Column) -> Option<String>;
    fn compare_column(&self, other: &Self, column: Column) -> Ordering;
}

impl Record for Participant {
    fn column_text(&self, column: Column) -> Option<String> {
        match column {
            Column::ParticipantId => Some(self.participant_id.to_string()),
            Column::Name => Some(self.name.clone()),
            Column::Employer => self.employer.clone(),
            Column::Department => self.department.clone(),
            Column::Status => Some(self.status.as_str().to_owned()),
            Column::UpdatedAt => self.updated_at.map(|value| value.to_string()),
            Column::TxDate
            | Column::TxType
            | Column::Amount
            | Column::Description => None,
        }
    }

    fn compare_column(&self, other: &Self, column: Column) -> Ordering {
        match column {
            Column::ParticipantId => self.participant_id.cmp(&other.participant_id),
            Column::UpdatedAt => nulls_last(self.updated_at, other.updated_at),
            _ => nulls_last(self.column_text(column), other.column_text(column)),
        }
    }
}

impl Record for Transaction {
    fn column_text(&self, column: Column) -> Option<String> {
        match column {
            Column::ParticipantId => Some(self.participant_id.to_string()),
            Column::TxDate => Some(format_date(self.tx_date)),
            Column::TxType => Some(self.tx_type.clone()),
            Column::Amount => Some(self.amount_cents.to_string()),
            Column::Description => self.description.clone(),
            Column::Name
            | Column::Employer
            | Column::Department
            | Column::Status
            | Column::UpdatedAt => None,
        }
    }

    fn compare_column(&self, other: &Self, column: Column) -> Ordering {
        match column {
            Column::ParticipantId => self.participant_id.cmp(&other.participant_id),
            Column::TxDate => self.tx_date.cmp(&other.tx_date),
            Column::Amount => self.amount_cents.cmp(&other.amount_cents),
            _ => nulls_last(self.column_text(column), other.column_text(column)),
        }
    }
}

fn nulls_last<T: Ord>(left: Option<T>, right: Option<T>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
