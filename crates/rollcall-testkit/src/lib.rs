// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod harness;
mod memory;

pub use harness::Harness;
pub use memory::MemoryGateway;

use anyhow::{Context, Result};
use rollcall_app::{ParticipantId, ParticipantPayload, ParticipantStatus, Transaction};
use std::path::PathBuf;
use time::{Date, Duration, OffsetDateTime};

const DEPARTMENTS: [&str; 8] = [
    "Finance",
    "Operations",
    "Engineering",
    "Legal",
    "Facilities",
    "Marketing",
    "Support",
    "Human Resources",
];

const EMPLOYERS: [&str; 12] = [
    "Acme Freight",
    "Globex",
    "Initech",
    "Northwind Traders",
    "Umbrella Health",
    "Stark Fabrication",
    "Wayne Logistics",
    "Hooli",
    "Vandelay Imports",
    "Soylent Foods",
    "Cyberdyne Labs",
    "Pied Piper",
];

const TX_TYPES: [&str; 5] = ["Deposit", "Withdrawal", "Fee", "Refund", "Transfer"];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];

const MEMO_WORDS: [&str; 16] = [
    "monthly",
    "payroll",
    "adjustment",
    "annual",
    "membership",
    "dues",
    "reimbursement",
    "travel",
    "equipment",
    "deposit",
    "correction",
    "quarterly",
    "bonus",
    "stipend",
    "late",
    "processing",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    /// True roughly `percent` times out of a hundred.
    fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }
}

/// One participant plus its history, ready to be written to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRecord {
    pub payload: ParticipantPayload,
    pub updated_at: OffsetDateTime,
    /// `participant_id` is a placeholder; rebind it to the id the store issues.
    pub transactions: Vec<Transaction>,
}

impl SeedRecord {
    pub fn transactions_for(&self, participant_id: &ParticipantId) -> Vec<Transaction> {
        self.transactions
            .iter()
            .map(|transaction| Transaction {
                participant_id: participant_id.clone(),
                ..transaction.clone()
            })
            .collect()
    }
}

/// Seeded generator of plausible registry data.
#[derive(Debug, Clone)]
pub struct RegistryFaker {
    rng: DeterministicRng,
    anchor: OffsetDateTime,
}

impl RegistryFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            anchor: fixture_datetime(),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn name(&mut self) -> String {
        format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES))
    }

    pub fn participant(&mut self) -> ParticipantPayload {
        let name = self.name();
        let employer = self
            .rng
            .chance(80)
            .then(|| self.pick(&EMPLOYERS).to_owned());
        let department = self
            .rng
            .chance(90)
            .then(|| self.pick(&DEPARTMENTS).to_owned());
        let status = if self.rng.chance(85) {
            ParticipantStatus::Active
        } else {
            ParticipantStatus::Inactive
        };
        ParticipantPayload {
            name,
            employer,
            department,
            status,
        }
    }

    pub fn transaction(&mut self, participant_id: ParticipantId, tx_date: Date) -> Transaction {
        let tx_type = self.pick(&TX_TYPES).to_owned();
        let magnitude = self.int_range_i64(500, 250_000);
        let amount_cents = match tx_type.as_str() {
            "Withdrawal" | "Fee" => -magnitude,
            _ => magnitude,
        };
        let description = self.rng.chance(70).then(|| self.memo());
        Transaction {
            participant_id,
            tx_date,
            tx_type,
            amount_cents,
            description,
        }
    }

    /// A point within `days` before the faker's fixed anchor.
    pub fn recent_datetime(&mut self, days: i64) -> OffsetDateTime {
        let seconds = self.int_range_i64(0, days.max(0) * 86_400);
        self.anchor - Duration::seconds(seconds)
    }

    pub fn seed_record(&mut self) -> SeedRecord {
        let payload = self.participant();
        let updated_at = self.recent_datetime(90);
        let count = self.int_n(6);
        let placeholder = ParticipantId::from(0);
        let transactions = (0..count)
            .map(|_| {
                let tx_date = self.recent_datetime(365).date();
                self.transaction(placeholder.clone(), tx_date)
            })
            .collect();
        SeedRecord {
            payload,
            updated_at,
            transactions,
        }
    }

    pub fn registry(&mut self, count: usize) -> Vec<SeedRecord> {
        (0..count).map(|_| self.seed_record()).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }

    fn memo(&mut self) -> String {
        let count = 2 + self.int_n(3);
        let mut memo = (0..count)
            .map(|_| self.pick(&MEMO_WORDS))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = memo.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        memo
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("rollcall.db");
    Ok((dir, db_path))
}

/// Fixed instant every generated timestamp is measured from.
pub fn fixture_datetime() -> OffsetDateTime {
    time::macros::datetime!(2026-02-19 12:34:56 UTC)
}

pub fn departments() -> &'static [&'static str] {
    &DEPARTMENTS
}
