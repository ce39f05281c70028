// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use rollcall_app::{
    Completion, ConsoleCommand, ConsoleEvent, ConsoleState, Outcome, RecordGateway, RenderedRow,
    Request, Target, perform, record_rows, recent_rows, transaction_rows,
};
use std::collections::VecDeque;
use tracing::debug;

/// Drives a [`ConsoleState`] against a gateway on the calling thread.
///
/// By default every issued request is performed as soon as it is issued, in
/// issue order. After [`Harness::hold`], requests queue up instead so a test
/// can complete them in any order.
pub struct Harness<G: RecordGateway> {
    pub state: ConsoleState,
    pub gateway: G,
    queued: VecDeque<Request>,
    events: Vec<ConsoleEvent>,
    holding: bool,
}

impl<G: RecordGateway> Harness<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_state(ConsoleState::default(), gateway)
    }

    pub fn with_state(state: ConsoleState, gateway: G) -> Self {
        Self {
            state,
            gateway,
            queued: VecDeque::new(),
            events: Vec::new(),
            holding: false,
        }
    }

    /// Builds a harness and runs startup to completion.
    pub fn started(gateway: G) -> Self {
        let mut harness = Self::new(gateway);
        harness.dispatch(ConsoleCommand::Startup);
        harness
    }

    pub fn dispatch(&mut self, command: ConsoleCommand) -> Vec<ConsoleEvent> {
        let events = self.apply(command);
        if !self.holding {
            self.settle();
        }
        events
    }

    pub fn hold(&mut self) {
        self.holding = true;
    }

    /// Stops holding and drains everything queued.
    pub fn release(&mut self) {
        self.holding = false;
        self.settle();
    }

    pub fn settle(&mut self) {
        while let Some(request) = self.queued.pop_front() {
            self.run(request);
        }
    }

    pub fn queued(&self) -> &VecDeque<Request> {
        &self.queued
    }

    /// Removes and returns the oldest queued request for `target`.
    pub fn take(&mut self, target: Target) -> Option<Request> {
        let index = self
            .queued
            .iter()
            .position(|request| request.ticket.target == target)?;
        self.queued.remove(index)
    }

    /// Performs `request` against the gateway now and applies the result.
    pub fn run(&mut self, request: Request) -> Vec<ConsoleEvent> {
        let outcome = perform(&self.gateway, &request.op);
        self.deliver(request, outcome)
    }

    /// Applies a hand-made outcome without touching the gateway.
    pub fn deliver(&mut self, request: Request, outcome: Outcome) -> Vec<ConsoleEvent> {
        debug!(op = request.op.name(), "delivering completion");
        self.apply(ConsoleCommand::Complete(Completion::new(request, outcome)))
    }

    /// Every event observed so far, in order.
    pub fn events(&self) -> &[ConsoleEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn alerts(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ConsoleEvent::Alert(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn records(&self) -> Vec<RenderedRow> {
        record_rows(&self.state.records)
    }

    pub fn recent(&self) -> Vec<RenderedRow> {
        recent_rows(&self.state.recent)
    }

    pub fn transactions(&self) -> Vec<RenderedRow> {
        transaction_rows(&self.state.transactions)
    }

    fn apply(&mut self, command: ConsoleCommand) -> Vec<ConsoleEvent> {
        let events = self.state.dispatch(command);
        for event in &events {
            if let ConsoleEvent::Issue(request) = event {
                self.queued.push_back(request.clone());
            }
        }
        self.events.extend(events.iter().cloned());
        events
    }
}
