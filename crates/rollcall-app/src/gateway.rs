// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use tracing::{debug, warn};

use crate::forms::{ParticipantPayload, ParticipantUpdate};
use crate::ids::ParticipantId;
use crate::model::{Participant, Transaction};
use crate::query::{ParticipantQuery, TransactionQuery};

/// Typed access to the participant and transaction collections.
///
/// Every call is attempted exactly once. Failures come back as `Err` with a
/// message fit for display; implementations must not panic.
pub trait RecordGateway: Send + Sync {
    fn read_participants(&self, query: &ParticipantQuery) -> Result<Vec<Participant>>;
    fn read_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>>;
    fn insert_participant(&self, payload: &ParticipantPayload) -> Result<()>;
    fn update_participant(&self, id: &ParticipantId, update: &ParticipantUpdate) -> Result<()>;
    fn delete_participant(&self, id: &ParticipantId) -> Result<()>;
    fn delete_transactions(&self, participant_id: &ParticipantId) -> Result<()>;
    /// Removes the participant and its transactions as one store-side unit.
    fn delete_participant_cascade(&self, id: &ParticipantId) -> Result<()>;
    /// Raw non-null department values, duplicates included.
    fn read_departments(&self) -> Result<Vec<String>>;
    fn read_one_participant(&self, id: &ParticipantId) -> Result<Participant>;

    fn probe(&self) -> Result<()> {
        self.read_participants(&ParticipantQuery::probe()).map(|_| ())
    }
}

/// One gateway call, described as data so it can cross a thread boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOp {
    Probe,
    ReadParticipants(ParticipantQuery),
    ReadTransactions(TransactionQuery),
    ReadDepartments,
    ReadOne(ParticipantId),
    Insert(ParticipantPayload),
    Update(ParticipantId, ParticipantUpdate),
    DeleteTransactions(ParticipantId),
    DeleteParticipant(ParticipantId),
    DeleteCascade(ParticipantId),
}

impl GatewayOp {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::ReadParticipants(_) => "read_participants",
            Self::ReadTransactions(_) => "read_transactions",
            Self::ReadDepartments => "read_departments",
            Self::ReadOne(_) => "read_one_participant",
            Self::Insert(_) => "insert_participant",
            Self::Update(_, _) => "update_participant",
            Self::DeleteTransactions(_) => "delete_transactions",
            Self::DeleteParticipant(_) => "delete_participant",
            Self::DeleteCascade(_) => "delete_participant_cascade",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Participants(Vec<Participant>),
    Transactions(Vec<Transaction>),
    Departments(Vec<String>),
    One(Participant),
    Done,
    Failed(String),
}

impl Outcome {
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Runs one operation and folds the result into an [`Outcome`].
pub fn perform(gateway: &dyn RecordGateway, op: &GatewayOp) -> Outcome {
    debug!(op = op.name(), "gateway call");
    let result = match op {
        GatewayOp::Probe => gateway.probe().map(|()| Outcome::Done),
        GatewayOp::ReadParticipants(query) => {
            gateway.read_participants(query).map(Outcome::Participants)
        }
        GatewayOp::ReadTransactions(query) => {
            gateway.read_transactions(query).map(Outcome::Transactions)
        }
        GatewayOp::ReadDepartments => gateway.read_departments().map(Outcome::Departments),
        GatewayOp::ReadOne(id) => gateway.read_one_participant(id).map(Outcome::One),
        GatewayOp::Insert(payload) => gateway.insert_participant(payload).map(|()| Outcome::Done),
        GatewayOp::Update(id, update) => gateway
            .update_participant(id, update)
            .map(|()| Outcome::Done),
        GatewayOp::DeleteTransactions(id) => {
            gateway.delete_transactions(id).map(|()| Outcome::Done)
        }
        GatewayOp::DeleteParticipant(id) => gateway.delete_participant(id).map(|()| Outcome::Done),
        GatewayOp::DeleteCascade(id) => gateway
            .delete_participant_cascade(id)
            .map(|()| Outcome::Done),
    };

    result.unwrap_or_else(|error| {
        warn!(op = op.name(), error = %error, "gateway call failed");
        Outcome::Failed(format!("{error:#}"))
    })
}

pub fn not_found(id: &ParticipantId) -> anyhow::Error {
    anyhow!("participant {id} not found")
}
