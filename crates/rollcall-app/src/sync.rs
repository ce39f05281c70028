// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::gateway::{GatewayOp, Outcome};

/// Render target a request feeds. Completions are matched per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Probe,
    Recent,
    Records,
    Departments,
    Transactions,
    EditLoad,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub target: Target,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub ticket: Ticket,
    pub op: GatewayOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub request: Request,
    pub outcome: Outcome,
}

impl Completion {
    pub fn new(request: Request, outcome: Outcome) -> Self {
        Self { request, outcome }
    }
}

/// Hands out monotonically increasing generations per target so that only
/// the most recently issued request for a target is applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestTracker {
    latest: BTreeMap<Target, u64>,
}

impl RequestTracker {
    pub fn issue(&mut self, target: Target, op: GatewayOp) -> Request {
        let generation = self.bump(target);
        Request {
            ticket: Ticket { target, generation },
            op,
        }
    }

    /// Supersedes whatever is in flight for `target` without issuing anything.
    pub fn invalidate(&mut self, target: Target) {
        self.bump(target);
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest(ticket.target) == ticket.generation
    }

    pub fn latest(&self, target: Target) -> u64 {
        self.latest.get(&target).copied().unwrap_or(0)
    }

    fn bump(&mut self, target: Target) -> u64 {
        let generation = self.latest.entry(target).or_insert(0);
        *generation = generation.saturating_add(1);
        *generation
    }
}
