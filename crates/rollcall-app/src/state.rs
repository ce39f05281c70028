// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, info, warn};

use crate::forms::{FormField, FormMode, ParticipantForm, ParticipantUpdate};
use crate::gateway::{GatewayOp, Outcome};
use crate::ids::ParticipantId;
use crate::model::{CascadeMode, ConnectionStatus, Participant, Transaction, ViewKind};
use crate::presenter::{Panel, TRANSACTIONS_PLACEHOLDER};
use crate::query::{ParticipantFilter, ParticipantQuery, TransactionQuery, department_vocabulary};
use crate::sync::{Completion, Request, RequestTracker, Target, Ticket};

pub const DELETE_PROMPT: &str = "Delete this participant? This cannot be undone.";

/// The one mutation allowed in flight at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMutation {
    /// `form` is the serial of the form that submitted.
    Save {
        form: u64,
    },
    Archive(ParticipantId),
    Delete {
        id: ParticipantId,
        step: DeleteStep,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    Cascade,
    Transactions,
    Participant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleState {
    pub active_view: ViewKind,
    pub connection: ConnectionStatus,
    pub selection: Option<ParticipantId>,
    pub dashboard_search: String,
    pub filter: ParticipantFilter,
    pub departments: Vec<String>,
    pub recent: Panel<Participant>,
    pub records: Panel<Participant>,
    pub transactions: Panel<Transaction>,
    pub form: Option<ParticipantForm>,
    pub confirm_delete: Option<ParticipantId>,
    pub alert: Option<String>,
    pub pending: Option<PendingMutation>,
    pub cascade_mode: CascadeMode,
    tracker: RequestTracker,
    form_serial: u64,
    listed_records: Vec<ParticipantId>,
    listed_recent: Vec<ParticipantId>,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new(ViewKind::Dashboard, CascadeMode::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Startup,
    ActivateView(ViewKind),
    NextView,
    PrevView,
    SetDashboardSearch(String),
    RunDashboardSearch,
    SetSearchText(String),
    SetDepartment(String),
    ApplyFilters,
    Select(ParticipantId),
    ClearSelection,
    OpenAddForm,
    OpenEditForm,
    EditFormField(FormField, String),
    ToggleFormStatus,
    SubmitForm,
    CancelForm,
    Archive,
    RequestDelete,
    ConfirmDelete,
    DeclineDelete,
    DismissAlert,
    Reload,
    Complete(Completion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// A gateway call the runtime must perform and report back on.
    Issue(Request),
    ViewChanged(ViewKind),
    SelectionChanged(Option<ParticipantId>),
    FormOpened(FormMode),
    FormClosed,
    ConfirmationRequested(ParticipantId),
    Alert(String),
    ValidationFailed(String),
    ConnectionChanged(ConnectionStatus),
    Discarded(Ticket),
}

impl ConsoleState {
    pub fn new(start_view: ViewKind, cascade_mode: CascadeMode) -> Self {
        Self {
            active_view: start_view,
            connection: ConnectionStatus::Unknown,
            selection: None,
            dashboard_search: String::new(),
            filter: ParticipantFilter::default(),
            departments: Vec::new(),
            recent: Panel::Loading,
            records: Panel::Loading,
            transactions: Panel::Idle(TRANSACTIONS_PLACEHOLDER),
            form: None,
            confirm_delete: None,
            alert: None,
            pending: None,
            cascade_mode,
            tracker: RequestTracker::default(),
            form_serial: 0,
            listed_records: Vec::new(),
            listed_recent: Vec::new(),
        }
    }

    /// Edit, archive and delete need a selection.
    pub const fn selection_actions_enabled(&self) -> bool {
        self.selection.is_some()
    }

    pub const fn mutation_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn title(&self) -> &'static str {
        self.active_view.label()
    }

    pub fn dispatch(&mut self, command: ConsoleCommand) -> Vec<ConsoleEvent> {
        match command {
            ConsoleCommand::Startup => {
                let mut events = vec![ConsoleEvent::ViewChanged(self.active_view)];
                events.push(self.issue(Target::Probe, GatewayOp::Probe));
                events.extend(self.reload_lists());
                events
            }
            ConsoleCommand::ActivateView(view) => self.activate_view(view),
            ConsoleCommand::NextView => self.rotate_view(1),
            ConsoleCommand::PrevView => self.rotate_view(-1),
            ConsoleCommand::SetDashboardSearch(text) => {
                self.dashboard_search = text;
                Vec::new()
            }
            ConsoleCommand::RunDashboardSearch => {
                let mut events = self.activate_view(ViewKind::Records);
                self.filter.search = self.dashboard_search.clone();
                events.push(self.load_records());
                events
            }
            ConsoleCommand::SetSearchText(text) => {
                self.filter.search = text;
                Vec::new()
            }
            ConsoleCommand::SetDepartment(department) => {
                self.filter.department = department;
                vec![self.load_records()]
            }
            ConsoleCommand::ApplyFilters => vec![self.load_records()],
            ConsoleCommand::Select(id) => self.select(id),
            ConsoleCommand::ClearSelection => self.clear_selection(),
            ConsoleCommand::OpenAddForm => {
                // a pending edit load must not reopen the form over this one
                self.tracker.invalidate(Target::EditLoad);
                self.open_form(ParticipantForm::blank())
            }
            ConsoleCommand::OpenEditForm => match self.selection.clone() {
                Some(id) => vec![self.issue(Target::EditLoad, GatewayOp::ReadOne(id))],
                None => Vec::new(),
            },
            ConsoleCommand::EditFormField(field, value) => {
                if let Some(form) = self.form.as_mut() {
                    form.set_text(field, value);
                }
                Vec::new()
            }
            ConsoleCommand::ToggleFormStatus => {
                if let Some(form) = self.form.as_mut() {
                    form.status = form.status.toggled();
                }
                Vec::new()
            }
            ConsoleCommand::SubmitForm => self.submit_form(),
            ConsoleCommand::CancelForm => {
                if self.form.is_none() {
                    return Vec::new();
                }
                // an in-flight save still completes; only the modal goes away
                self.form = None;
                vec![ConsoleEvent::FormClosed]
            }
            ConsoleCommand::Archive => self.archive(),
            ConsoleCommand::RequestDelete => match self.selection.clone() {
                Some(id) if !self.mutation_in_flight() => {
                    self.confirm_delete = Some(id.clone());
                    vec![ConsoleEvent::ConfirmationRequested(id)]
                }
                _ => Vec::new(),
            },
            ConsoleCommand::ConfirmDelete => self.confirm_delete(),
            ConsoleCommand::DeclineDelete => {
                self.confirm_delete = None;
                Vec::new()
            }
            ConsoleCommand::DismissAlert => {
                self.alert = None;
                Vec::new()
            }
            ConsoleCommand::Reload => self.reload_lists(),
            ConsoleCommand::Complete(completion) => self.complete(completion),
        }
    }

    fn open_form(&mut self, form: ParticipantForm) -> Vec<ConsoleEvent> {
        self.form_serial += 1;
        let mode = form.mode.clone();
        self.form = Some(form);
        vec![ConsoleEvent::FormOpened(mode)]
    }

    /// The open form, if it is the one numbered `serial`.
    fn form_numbered(&mut self, serial: u64) -> Option<&mut ParticipantForm> {
        if self.form_serial == serial {
            self.form.as_mut()
        } else {
            None
        }
    }

    fn activate_view(&mut self, view: ViewKind) -> Vec<ConsoleEvent> {
        self.active_view = view;
        vec![ConsoleEvent::ViewChanged(view)]
    }

    fn rotate_view(&mut self, delta: isize) -> Vec<ConsoleEvent> {
        let views = ViewKind::ALL;
        let current = views
            .iter()
            .position(|view| *view == self.active_view)
            .unwrap_or(0) as isize;
        let len = views.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.activate_view(views[next])
    }

    fn issue(&mut self, target: Target, op: GatewayOp) -> ConsoleEvent {
        let request = self.tracker.issue(target, op);
        debug!(
            target = ?request.ticket.target,
            generation = request.ticket.generation,
            op = request.op.name(),
            "issued request"
        );
        ConsoleEvent::Issue(request)
    }

    fn load_records(&mut self) -> ConsoleEvent {
        self.records = Panel::Loading;
        let query = ParticipantQuery::management(&self.filter);
        self.issue(Target::Records, GatewayOp::ReadParticipants(query))
    }

    fn load_recent(&mut self) -> ConsoleEvent {
        self.recent = Panel::Loading;
        self.issue(
            Target::Recent,
            GatewayOp::ReadParticipants(ParticipantQuery::recent()),
        )
    }

    fn reload_lists(&mut self) -> Vec<ConsoleEvent> {
        vec![
            self.load_recent(),
            self.issue(Target::Departments, GatewayOp::ReadDepartments),
            self.load_records(),
        ]
    }

    fn select(&mut self, id: ParticipantId) -> Vec<ConsoleEvent> {
        self.selection = Some(id.clone());
        self.transactions = Panel::Loading;
        let query = TransactionQuery::recent_for(id.clone());
        vec![
            ConsoleEvent::SelectionChanged(Some(id)),
            self.issue(Target::Transactions, GatewayOp::ReadTransactions(query)),
        ]
    }

    fn clear_selection(&mut self) -> Vec<ConsoleEvent> {
        if self.selection.is_none() {
            return Vec::new();
        }
        self.selection = None;
        self.confirm_delete = None;
        self.tracker.invalidate(Target::Transactions);
        self.transactions = Panel::Idle(TRANSACTIONS_PLACEHOLDER);
        vec![ConsoleEvent::SelectionChanged(None)]
    }

    fn submit_form(&mut self) -> Vec<ConsoleEvent> {
        if self.mutation_in_flight() {
            debug!("submit ignored while a mutation is pending");
            return Vec::new();
        }
        let Some(form) = self.form.as_mut() else {
            return Vec::new();
        };

        let payload = match form.payload() {
            Ok(payload) => payload,
            Err(error) => {
                let message = error.to_string();
                form.error = Some(message.clone());
                return vec![ConsoleEvent::ValidationFailed(message)];
            }
        };
        form.error = None;
        form.submitting = true;

        let op = match &form.mode {
            FormMode::Add => GatewayOp::Insert(payload),
            FormMode::Edit(id) => GatewayOp::Update(id.clone(), ParticipantUpdate::Full(payload)),
        };
        self.pending = Some(PendingMutation::Save {
            form: self.form_serial,
        });
        vec![self.issue(Target::Mutation, op)]
    }

    fn archive(&mut self) -> Vec<ConsoleEvent> {
        if self.mutation_in_flight() {
            debug!("archive ignored while a mutation is pending");
            return Vec::new();
        }
        let Some(id) = self.selection.clone() else {
            return Vec::new();
        };
        self.pending = Some(PendingMutation::Archive(id.clone()));
        vec![self.issue(
            Target::Mutation,
            GatewayOp::Update(id, ParticipantUpdate::archive()),
        )]
    }

    fn confirm_delete(&mut self) -> Vec<ConsoleEvent> {
        let Some(id) = self.confirm_delete.take() else {
            return Vec::new();
        };
        if self.mutation_in_flight() {
            debug!("delete ignored while a mutation is pending");
            return Vec::new();
        }

        let (step, op) = match self.cascade_mode {
            CascadeMode::Atomic => (DeleteStep::Cascade, GatewayOp::DeleteCascade(id.clone())),
            CascadeMode::Sequential => (
                DeleteStep::Transactions,
                GatewayOp::DeleteTransactions(id.clone()),
            ),
        };
        self.pending = Some(PendingMutation::Delete { id, step });
        vec![self.issue(Target::Mutation, op)]
    }

    fn complete(&mut self, completion: Completion) -> Vec<ConsoleEvent> {
        let Completion { request, outcome } = completion;
        let ticket = request.ticket;
        if !self.tracker.is_current(ticket) {
            debug!(
                target = ?ticket.target,
                generation = ticket.generation,
                latest = self.tracker.latest(ticket.target),
                "discarding superseded completion"
            );
            return vec![ConsoleEvent::Discarded(ticket)];
        }

        match ticket.target {
            Target::Probe => {
                self.connection = match outcome {
                    Outcome::Failed(message) => {
                        warn!(error = %message, "connection probe failed");
                        ConnectionStatus::Unreachable
                    }
                    _ => ConnectionStatus::Connected,
                };
                vec![ConsoleEvent::ConnectionChanged(self.connection)]
            }
            Target::Recent => {
                self.recent = participants_panel(outcome);
                if let Panel::Loaded(rows) = &self.recent {
                    self.listed_recent = listed_ids(rows);
                    return self.revalidate_selection();
                }
                Vec::new()
            }
            Target::Records => {
                self.records = participants_panel(outcome);
                if let Panel::Loaded(rows) = &self.records {
                    self.listed_records = listed_ids(rows);
                    return self.revalidate_selection();
                }
                Vec::new()
            }
            Target::Departments => {
                match outcome {
                    Outcome::Departments(values) => {
                        self.departments = department_vocabulary(values);
                    }
                    other => {
                        warn!(
                            error = other.failure_message().unwrap_or("unexpected outcome"),
                            "department vocabulary not refreshed"
                        );
                    }
                }
                Vec::new()
            }
            Target::Transactions => {
                self.transactions = match outcome {
                    Outcome::Transactions(rows) => Panel::Loaded(rows),
                    other => Panel::Failed(failure_text(&other)),
                };
                Vec::new()
            }
            Target::EditLoad => match outcome {
                Outcome::One(participant) => self.open_form(ParticipantForm::edit(&participant)),
                other => self.raise_alert(format!("Load failed: {}", failure_text(&other))),
            },
            Target::Mutation => self.complete_mutation(outcome),
        }
    }

    /// Drops a selection that neither the management list nor the recency
    /// summary shows any more. Each list counts with its last loaded rows.
    fn revalidate_selection(&mut self) -> Vec<ConsoleEvent> {
        let Some(selected) = self.selection.as_ref() else {
            return Vec::new();
        };
        if self.listed_records.contains(selected) || self.listed_recent.contains(selected) {
            return Vec::new();
        }
        info!(participant_id = %selected, "selection no longer listed, clearing");
        self.clear_selection()
    }

    fn complete_mutation(&mut self, outcome: Outcome) -> Vec<ConsoleEvent> {
        let Some(pending) = self.pending.take() else {
            warn!("mutation completion with nothing pending");
            return Vec::new();
        };

        if let Outcome::Failed(message) = &outcome {
            let prefix = match pending {
                PendingMutation::Save { form } => {
                    if let Some(form) = self.form_numbered(form) {
                        form.submitting = false;
                    }
                    "Save failed"
                }
                PendingMutation::Archive(_) => "Archive failed",
                PendingMutation::Delete { .. } => "Delete failed",
            };
            return self.raise_alert(format!("{prefix}: {message}"));
        }

        match pending {
            PendingMutation::Save { form } => {
                info!("participant saved");
                let mut events = Vec::new();
                // a form opened after the submit stays open
                if self.form_numbered(form).is_some() {
                    self.form = None;
                    events.push(ConsoleEvent::FormClosed);
                }
                events.extend(self.reload_lists());
                events
            }
            PendingMutation::Archive(id) => {
                info!(participant_id = %id, "participant archived");
                vec![self.load_records(), self.load_recent()]
            }
            PendingMutation::Delete {
                id,
                step: DeleteStep::Transactions,
            } => {
                debug!(participant_id = %id, "transactions removed, deleting participant");
                self.pending = Some(PendingMutation::Delete {
                    id: id.clone(),
                    step: DeleteStep::Participant,
                });
                vec![self.issue(Target::Mutation, GatewayOp::DeleteParticipant(id))]
            }
            PendingMutation::Delete { id, .. } => {
                info!(participant_id = %id, "participant deleted");
                let mut events = Vec::new();
                if self.selection.as_ref() == Some(&id) {
                    events.extend(self.clear_selection());
                }
                events.extend(self.reload_lists());
                events
            }
        }
    }

    fn raise_alert(&mut self, message: String) -> Vec<ConsoleEvent> {
        warn!(alert = %message, "surfacing failure");
        self.alert = Some(message.clone());
        vec![ConsoleEvent::Alert(message)]
    }
}

fn listed_ids(rows: &[Participant]) -> Vec<ParticipantId> {
    rows.iter().map(|row| row.participant_id.clone()).collect()
}

fn participants_panel(outcome: Outcome) -> Panel<Participant> {
    match outcome {
        Outcome::Participants(rows) => Panel::Loaded(rows),
        other => Panel::Failed(failure_text(&other)),
    }
}

fn failure_text(outcome: &Outcome) -> String {
    outcome
        .failure_message()
        .unwrap_or("unexpected response from store")
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::{ConsoleCommand, ConsoleEvent, ConsoleState, DeleteStep, PendingMutation};
    use crate::{
        CascadeMode, Completion, ConnectionStatus, FormField, FormMode, GatewayOp, NAME_REQUIRED,
        Outcome, Panel, Participant, ParticipantId, ParticipantStatus, Request, Target,
        TRANSACTIONS_PLACEHOLDER, ViewKind,
    };

    fn participant(id: i64) -> Participant {
        Participant {
            participant_id: ParticipantId::from(id),
            name: format!("Person {id}"),
            employer: None,
            department: None,
            status: ParticipantStatus::Active,
            updated_at: None,
        }
    }

    fn issued(events: &[ConsoleEvent]) -> Vec<Request> {
        events
            .iter()
            .filter_map(|event| match event {
                ConsoleEvent::Issue(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn issued_for(events: &[ConsoleEvent], target: Target) -> Request {
        issued(events)
            .into_iter()
            .find(|request| request.ticket.target == target)
            .expect("request for target")
    }

    fn complete(state: &mut ConsoleState, request: Request, outcome: Outcome) -> Vec<ConsoleEvent> {
        state.dispatch(ConsoleCommand::Complete(Completion::new(request, outcome)))
    }

    #[test]
    fn startup_probes_and_loads_every_list() {
        let mut state = ConsoleState::default();
        let events = state.dispatch(ConsoleCommand::Startup);
        let targets: Vec<Target> = issued(&events)
            .iter()
            .map(|request| request.ticket.target)
            .collect();
        assert_eq!(
            targets,
            vec![
                Target::Probe,
                Target::Recent,
                Target::Departments,
                Target::Records
            ]
        );
        assert_eq!(events[0], ConsoleEvent::ViewChanged(ViewKind::Dashboard));

        let probe = issued_for(&events, Target::Probe);
        complete(&mut state, probe, Outcome::Failed("offline".to_owned()));
        assert_eq!(state.connection, ConnectionStatus::Unreachable);
    }

    #[test]
    fn view_rotation_wraps_and_title_follows() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::PrevView);
        assert_eq!(state.active_view, ViewKind::Help);
        state.dispatch(ConsoleCommand::NextView);
        assert_eq!(state.active_view, ViewKind::Dashboard);
        state.dispatch(ConsoleCommand::ActivateView(ViewKind::Records));
        assert_eq!(state.title(), "Records");
    }

    #[test]
    fn dashboard_search_copies_term_and_switches_view() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::SetDashboardSearch("acme".to_owned()));
        let events = state.dispatch(ConsoleCommand::RunDashboardSearch);

        assert_eq!(state.active_view, ViewKind::Records);
        assert_eq!(state.filter.search, "acme");
        let request = issued_for(&events, Target::Records);
        let GatewayOp::ReadParticipants(query) = request.op else {
            panic!("expected a participant read");
        };
        assert!(query.filter.is_some());
    }

    #[test]
    fn selection_loads_transactions_and_clear_restores_placeholder() {
        let mut state = ConsoleState::default();
        let events = state.dispatch(ConsoleCommand::Select(ParticipantId::from(4)));
        assert!(state.selection_actions_enabled());
        let request = issued_for(&events, Target::Transactions);

        state.dispatch(ConsoleCommand::ClearSelection);
        assert!(!state.selection_actions_enabled());
        assert_eq!(state.transactions, Panel::Idle(TRANSACTIONS_PLACEHOLDER));

        let late = complete(&mut state, request.clone(), Outcome::Transactions(Vec::new()));
        assert_eq!(late, vec![ConsoleEvent::Discarded(request.ticket)]);
        assert_eq!(state.transactions, Panel::Idle(TRANSACTIONS_PLACEHOLDER));
    }

    #[test]
    fn older_records_completion_never_overwrites_newer() {
        let mut state = ConsoleState::default();
        let first = issued_for(
            &state.dispatch(ConsoleCommand::ApplyFilters),
            Target::Records,
        );
        let second = issued_for(
            &state.dispatch(ConsoleCommand::ApplyFilters),
            Target::Records,
        );

        complete(&mut state, second, Outcome::Participants(vec![participant(2)]));
        complete(&mut state, first, Outcome::Participants(vec![participant(1)]));
        assert_eq!(state.records, Panel::Loaded(vec![participant(2)]));
    }

    #[test]
    fn empty_name_blocks_submit_without_a_request() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::OpenAddForm);
        let events = state.dispatch(ConsoleCommand::SubmitForm);

        assert_eq!(
            events,
            vec![ConsoleEvent::ValidationFailed(NAME_REQUIRED.to_owned())]
        );
        assert!(!state.mutation_in_flight());
        assert!(state.form.is_some());
    }

    #[test]
    fn second_submit_while_pending_is_a_no_op() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::OpenAddForm);
        state.dispatch(ConsoleCommand::EditFormField(
            FormField::Name,
            "Ada".to_owned(),
        ));
        let first = state.dispatch(ConsoleCommand::SubmitForm);
        assert_eq!(issued(&first).len(), 1);
        assert!(state.dispatch(ConsoleCommand::SubmitForm).is_empty());
        assert!(state.dispatch(ConsoleCommand::Archive).is_empty());
    }

    #[test]
    fn save_failure_keeps_form_open_with_alert() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::OpenAddForm);
        state.dispatch(ConsoleCommand::EditFormField(
            FormField::Name,
            "Ada".to_owned(),
        ));
        let request = issued_for(&state.dispatch(ConsoleCommand::SubmitForm), Target::Mutation);

        let events = complete(&mut state, request, Outcome::Failed("duplicate".to_owned()));
        assert_eq!(
            events,
            vec![ConsoleEvent::Alert("Save failed: duplicate".to_owned())]
        );
        let form = state.form.as_ref().expect("form stays open");
        assert!(!form.submitting);
        assert!(!state.mutation_in_flight());
    }

    #[test]
    fn late_save_leaves_a_newer_form_open() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::OpenAddForm);
        state.dispatch(ConsoleCommand::EditFormField(
            FormField::Name,
            "Ada".to_owned(),
        ));
        let request = issued_for(&state.dispatch(ConsoleCommand::SubmitForm), Target::Mutation);
        state.dispatch(ConsoleCommand::CancelForm);
        state.dispatch(ConsoleCommand::OpenAddForm);
        state.dispatch(ConsoleCommand::EditFormField(
            FormField::Name,
            "Grace Hopper".to_owned(),
        ));

        let events = complete(&mut state, request, Outcome::Done);
        assert!(!events.contains(&ConsoleEvent::FormClosed));
        let form = state.form.as_ref().expect("newer form stays open");
        assert_eq!(form.name, "Grace Hopper");
        assert!(!state.mutation_in_flight());
        assert!(issued(&events).iter().any(|r| r.ticket.target == Target::Records));
    }

    #[test]
    fn late_save_failure_leaves_a_newer_form_untouched() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::OpenAddForm);
        state.dispatch(ConsoleCommand::EditFormField(
            FormField::Name,
            "Ada".to_owned(),
        ));
        let request = issued_for(&state.dispatch(ConsoleCommand::SubmitForm), Target::Mutation);
        state.dispatch(ConsoleCommand::CancelForm);
        state.dispatch(ConsoleCommand::OpenAddForm);
        state.dispatch(ConsoleCommand::EditFormField(
            FormField::Name,
            "Grace Hopper".to_owned(),
        ));
        state.dispatch(ConsoleCommand::SubmitForm);
        let newer = state.form.clone();

        // the second submit was ignored, so only the first is pending
        complete(&mut state, request, Outcome::Failed("duplicate".to_owned()));
        assert_eq!(state.form, newer);
        assert_eq!(state.alert.as_deref(), Some("Save failed: duplicate"));
    }

    #[test]
    fn save_success_closes_the_submitting_form() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::OpenAddForm);
        state.dispatch(ConsoleCommand::EditFormField(
            FormField::Name,
            "Ada".to_owned(),
        ));
        let request = issued_for(&state.dispatch(ConsoleCommand::SubmitForm), Target::Mutation);

        let events = complete(&mut state, request, Outcome::Done);
        assert_eq!(events[0], ConsoleEvent::FormClosed);
        assert_eq!(state.form, None);
    }

    #[test]
    fn edit_load_opens_populated_form() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::Select(ParticipantId::from(9)));
        let request = issued_for(
            &state.dispatch(ConsoleCommand::OpenEditForm),
            Target::EditLoad,
        );
        let events = complete(&mut state, request, Outcome::One(participant(9)));

        assert_eq!(
            events,
            vec![ConsoleEvent::FormOpened(FormMode::Edit(ParticipantId::from(9)))]
        );
        assert_eq!(state.form.as_ref().map(|form| form.name.as_str()), Some("Person 9"));
    }

    #[test]
    fn declined_delete_changes_nothing() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::Select(ParticipantId::from(3)));
        state.dispatch(ConsoleCommand::RequestDelete);
        let before = state.clone();
        let events = state.dispatch(ConsoleCommand::DeclineDelete);

        assert!(events.is_empty());
        assert_eq!(state.selection, before.selection);
        assert_eq!(state.confirm_delete, None);
        assert!(!state.mutation_in_flight());
    }

    #[test]
    fn sequential_delete_runs_two_steps_then_clears_selection() {
        let mut state = ConsoleState::new(ViewKind::Records, CascadeMode::Sequential);
        let id = ParticipantId::from(5);
        state.dispatch(ConsoleCommand::Select(id.clone()));
        state.dispatch(ConsoleCommand::RequestDelete);

        let first = issued_for(&state.dispatch(ConsoleCommand::ConfirmDelete), Target::Mutation);
        assert_eq!(first.op, GatewayOp::DeleteTransactions(id.clone()));

        let events = complete(&mut state, first, Outcome::Done);
        let second = issued_for(&events, Target::Mutation);
        assert_eq!(second.op, GatewayOp::DeleteParticipant(id.clone()));
        assert_eq!(
            state.pending,
            Some(PendingMutation::Delete {
                id,
                step: DeleteStep::Participant
            })
        );

        let events = complete(&mut state, second, Outcome::Done);
        assert!(events.contains(&ConsoleEvent::SelectionChanged(None)));
        assert_eq!(state.selection, None);
        assert_eq!(state.transactions, Panel::Idle(TRANSACTIONS_PLACEHOLDER));
        assert!(issued(&events).iter().any(|r| r.ticket.target == Target::Records));
    }

    #[test]
    fn atomic_delete_failure_keeps_selection() {
        let mut state = ConsoleState::default();
        let id = ParticipantId::from(5);
        state.dispatch(ConsoleCommand::Select(id.clone()));
        state.dispatch(ConsoleCommand::RequestDelete);
        let request = issued_for(&state.dispatch(ConsoleCommand::ConfirmDelete), Target::Mutation);
        assert_eq!(request.op, GatewayOp::DeleteCascade(id.clone()));

        complete(&mut state, request, Outcome::Failed("permission denied".to_owned()));
        assert_eq!(state.selection, Some(id));
        assert_eq!(state.alert.as_deref(), Some("Delete failed: permission denied"));
    }

    #[test]
    fn reload_without_selected_row_clears_selection() {
        let mut state = ConsoleState::default();
        state.dispatch(ConsoleCommand::Select(ParticipantId::from(8)));
        let request = issued_for(
            &state.dispatch(ConsoleCommand::ApplyFilters),
            Target::Records,
        );

        let events = complete(&mut state, request, Outcome::Participants(vec![participant(1)]));
        assert_eq!(events, vec![ConsoleEvent::SelectionChanged(None)]);
        assert!(!state.selection_actions_enabled());
    }

    #[test]
    fn selection_from_recent_summary_survives_filtered_records() {
        let mut state = ConsoleState::default();
        let events = state.dispatch(ConsoleCommand::Startup);
        let recent = issued_for(&events, Target::Recent);
        complete(&mut state, recent, Outcome::Participants(vec![participant(7)]));
        state.dispatch(ConsoleCommand::Select(ParticipantId::from(7)));

        let request = issued_for(
            &state.dispatch(ConsoleCommand::ApplyFilters),
            Target::Records,
        );
        let events = complete(&mut state, request, Outcome::Participants(vec![participant(1)]));
        assert!(events.is_empty());
        assert_eq!(state.selection, Some(ParticipantId::from(7)));
    }

    #[test]
    fn selection_missing_from_both_lists_is_cleared() {
        let mut state = ConsoleState::default();
        let events = state.dispatch(ConsoleCommand::Startup);
        let recent = issued_for(&events, Target::Recent);
        let records = issued_for(&events, Target::Records);
        complete(&mut state, recent, Outcome::Participants(vec![participant(7)]));
        complete(&mut state, records, Outcome::Participants(vec![participant(7)]));
        state.dispatch(ConsoleCommand::Select(ParticipantId::from(7)));

        let events = state.dispatch(ConsoleCommand::Reload);
        let recent = issued_for(&events, Target::Recent);
        let records = issued_for(&events, Target::Records);
        let first = complete(&mut state, recent, Outcome::Participants(vec![participant(2)]));
        // the management list still shows it until its own reload lands
        assert!(first.is_empty());
        let second = complete(&mut state, records, Outcome::Participants(vec![participant(2)]));
        assert_eq!(second, vec![ConsoleEvent::SelectionChanged(None)]);
    }

    #[test]
    fn reload_with_selected_row_keeps_panel() {
        let mut state = ConsoleState::default();
        let tx_request = issued_for(
            &state.dispatch(ConsoleCommand::Select(ParticipantId::from(1))),
            Target::Transactions,
        );
        complete(&mut state, tx_request, Outcome::Transactions(Vec::new()));
        let request = issued_for(
            &state.dispatch(ConsoleCommand::ApplyFilters),
            Target::Records,
        );

        let events = complete(&mut state, request, Outcome::Participants(vec![participant(1)]));
        assert!(events.is_empty());
        assert_eq!(state.transactions, Panel::Loaded(Vec::new()));
    }
}
