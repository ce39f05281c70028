// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::ids::ParticipantId;
use crate::model::{Participant, ParticipantStatus};
use crate::values::normalize_optional;

pub const NAME_REQUIRED: &str = "Name is required.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Add,
    /// Carries the id captured when the record was loaded.
    Edit(ParticipantId),
}

impl FormMode {
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Add => "Add Record",
            Self::Edit(_) => "Edit Record",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Employer,
    Department,
    Status,
}

impl FormField {
    pub const ALL: [Self; 4] = [Self::Name, Self::Employer, Self::Department, Self::Status];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Employer => "employer",
            Self::Department => "department",
            Self::Status => "status",
        }
    }
}

/// Raw field values as typed into the add/edit modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantForm {
    pub mode: FormMode,
    pub name: String,
    pub employer: String,
    pub department: String,
    pub status: ParticipantStatus,
    pub error: Option<String>,
    pub submitting: bool,
}

impl ParticipantForm {
    pub fn blank() -> Self {
        Self {
            mode: FormMode::Add,
            name: String::new(),
            employer: String::new(),
            department: String::new(),
            status: ParticipantStatus::Active,
            error: None,
            submitting: false,
        }
    }

    pub fn edit(participant: &Participant) -> Self {
        Self {
            mode: FormMode::Edit(participant.participant_id.clone()),
            name: participant.name.clone(),
            employer: participant.employer.clone().unwrap_or_default(),
            department: participant.department.clone().unwrap_or_default(),
            status: participant.status,
            error: None,
            submitting: false,
        }
    }

    pub fn text(&self, field: FormField) -> String {
        match field {
            FormField::Name => self.name.clone(),
            FormField::Employer => self.employer.clone(),
            FormField::Department => self.department.clone(),
            FormField::Status => self.status.as_str().to_owned(),
        }
    }

    /// Updates a field from typed text. Status accepts only known values and
    /// keeps its previous value otherwise.
    pub fn set_text(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::Name => self.name = value,
            FormField::Employer => self.employer = value,
            FormField::Department => self.department = value,
            FormField::Status => {
                if let Some(status) = ParticipantStatus::parse(&value) {
                    self.status = status;
                }
            }
        }
    }

    pub fn payload(&self) -> Result<ParticipantPayload> {
        let payload = ParticipantPayload {
            name: self.name.trim().to_owned(),
            employer: normalize_optional(&self.employer),
            department: normalize_optional(&self.department),
            status: self.status,
        };
        payload.validate()?;
        Ok(payload)
    }
}

/// Column values written on insert and full update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantPayload {
    pub name: String,
    pub employer: Option<String>,
    pub department: Option<String>,
    pub status: ParticipantStatus,
}

impl ParticipantPayload {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!(NAME_REQUIRED);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantUpdate {
    Full(ParticipantPayload),
    /// Touches only `status`; used by archive.
    Status(ParticipantStatus),
}

impl ParticipantUpdate {
    pub const fn archive() -> Self {
        Self::Status(ParticipantStatus::Inactive)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Full(payload) => payload.validate(),
            Self::Status(_) => Ok(()),
        }
    }
}
