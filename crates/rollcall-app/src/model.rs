// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::ParticipantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParticipantStatus {
    #[default]
    Active,
    Inactive,
}

impl ParticipantStatus {
    pub const ALL: [Self; 2] = [Self::Active, Self::Inactive];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Active" | "active" => Some(Self::Active),
            "Inactive" | "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub participant_id: ParticipantId,
    pub name: String,
    pub employer: Option<String>,
    pub department: Option<String>,
    pub status: ParticipantStatus,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub participant_id: ParticipantId,
    pub tx_date: Date,
    pub tx_type: String,
    pub amount_cents: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewKind {
    Dashboard,
    Records,
    Help,
}

impl ViewKind {
    pub const ALL: [Self; 3] = [Self::Dashboard, Self::Records, Self::Help];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Records => "Records",
            Self::Help => "Help",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dashboard" => Some(Self::Dashboard),
            "records" => Some(Self::Records),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Unreachable,
}

impl ConnectionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Checking connection",
            Self::Connected => "Connected",
            Self::Unreachable => "Unable to connect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// How a participant and its transactions are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CascadeMode {
    /// One store-side operation removes both in a single transaction.
    #[default]
    Atomic,
    /// Transactions first, then the participant; no rollback between steps.
    Sequential,
}

impl CascadeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Sequential => "sequential",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "atomic" => Some(Self::Atomic),
            "sequential" => Some(Self::Sequential),
            _ => None,
        }
    }
}
