// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use rollcall_app::{
    Participant, ParticipantId, ParticipantPayload, ParticipantQuery, ParticipantUpdate,
    RecordGateway, SortDirection, Transaction, TransactionQuery, not_found,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use time::{Duration, OffsetDateTime};

use crate::fixture_datetime;

#[derive(Debug)]
struct MemoryState {
    participants: Vec<Participant>,
    transactions: Vec<Transaction>,
    next_id: i64,
    clock: OffsetDateTime,
    failures: BTreeMap<&'static str, VecDeque<String>>,
    calls: Vec<&'static str>,
}

/// In-process registry with scripted failures and a call log.
///
/// Operation names match [`rollcall_app::GatewayOp::name`].
#[derive(Debug)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                participants: Vec::new(),
                transactions: Vec::new(),
                next_id: 1,
                clock: fixture_datetime(),
                failures: BTreeMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Adds a participant without touching the call log.
    pub fn seed(&self, payload: ParticipantPayload) -> ParticipantId {
        let mut state = self.lock();
        let updated_at = state.tick();
        state.push_participant(payload, updated_at)
    }

    pub fn seed_transaction(&self, transaction: Transaction) {
        self.lock().transactions.push(transaction);
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.lock().participants.clone()
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<Participant> {
        self.lock()
            .participants
            .iter()
            .find(|participant| &participant.participant_id == id)
            .cloned()
    }

    pub fn transactions_of(&self, id: &ParticipantId) -> Vec<Transaction> {
        self.lock()
            .transactions
            .iter()
            .filter(|transaction| &transaction.participant_id == id)
            .cloned()
            .collect()
    }

    /// The next call to `op` fails with `message`. Repeated calls queue up.
    pub fn fail_next(&self, op: &'static str, message: impl Into<String>) {
        self.lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(message.into());
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|name| **name == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, op: &'static str) -> Result<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock();
        state.calls.push(op);
        if let Some(message) = state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            bail!(message);
        }
        Ok(state)
    }
}

impl MemoryState {
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += Duration::minutes(1);
        self.clock
    }

    fn push_participant(
        &mut self,
        payload: ParticipantPayload,
        updated_at: OffsetDateTime,
    ) -> ParticipantId {
        let id = ParticipantId::from(self.next_id);
        self.next_id += 1;
        self.participants.push(Participant {
            participant_id: id.clone(),
            name: payload.name,
            employer: payload.employer,
            department: payload.department,
            status: payload.status,
            updated_at: Some(updated_at),
        });
        id
    }
}

impl RecordGateway for MemoryGateway {
    fn read_participants(&self, query: &ParticipantQuery) -> Result<Vec<Participant>> {
        let state = self.begin("read_participants")?;
        let mut rows: Vec<Participant> = state
            .participants
            .iter()
            .filter(|participant| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|predicate| predicate.matches(*participant))
            })
            .cloned()
            .collect();
        rows.sort_by(|left, right| {
            let tiebreak = left.participant_id.cmp(&right.participant_id);
            let tiebreak = match query.order.direction {
                SortDirection::Asc => tiebreak,
                SortDirection::Desc => tiebreak.reverse(),
            };
            query.order.compare(left, right).then(tiebreak)
        });
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn read_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let state = self.begin("read_transactions")?;
        let mut rows: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|transaction| transaction.participant_id == query.participant_id)
            .cloned()
            .collect();
        rows.sort_by(|left, right| query.order.compare(left, right));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn insert_participant(&self, payload: &ParticipantPayload) -> Result<()> {
        let mut state = self.begin("insert_participant")?;
        payload.validate()?;
        let updated_at = state.tick();
        state.push_participant(payload.clone(), updated_at);
        Ok(())
    }

    fn update_participant(&self, id: &ParticipantId, update: &ParticipantUpdate) -> Result<()> {
        let mut state = self.begin("update_participant")?;
        update.validate()?;
        let updated_at = state.tick();
        if let Some(participant) = state
            .participants
            .iter_mut()
            .find(|participant| &participant.participant_id == id)
        {
            match update {
                ParticipantUpdate::Full(payload) => {
                    participant.name = payload.name.clone();
                    participant.employer = payload.employer.clone();
                    participant.department = payload.department.clone();
                    participant.status = payload.status;
                }
                ParticipantUpdate::Status(status) => participant.status = *status,
            }
            participant.updated_at = Some(updated_at);
        }
        Ok(())
    }

    fn delete_participant(&self, id: &ParticipantId) -> Result<()> {
        let mut state = self.begin("delete_participant")?;
        state
            .participants
            .retain(|participant| &participant.participant_id != id);
        Ok(())
    }

    fn delete_transactions(&self, participant_id: &ParticipantId) -> Result<()> {
        let mut state = self.begin("delete_transactions")?;
        state
            .transactions
            .retain(|transaction| &transaction.participant_id != participant_id);
        Ok(())
    }

    fn delete_participant_cascade(&self, id: &ParticipantId) -> Result<()> {
        let mut state = self.begin("delete_participant_cascade")?;
        state
            .transactions
            .retain(|transaction| &transaction.participant_id != id);
        state
            .participants
            .retain(|participant| &participant.participant_id != id);
        Ok(())
    }

    fn read_departments(&self) -> Result<Vec<String>> {
        let state = self.begin("read_departments")?;
        Ok(state
            .participants
            .iter()
            .filter_map(|participant| participant.department.clone())
            .collect())
    }

    fn read_one_participant(&self, id: &ParticipantId) -> Result<Participant> {
        let state = self.begin("read_one_participant")?;
        state
            .participants
            .iter()
            .find(|participant| &participant.participant_id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    fn probe(&self) -> Result<()> {
        self.begin("probe").map(|_| ())
    }
}
