// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use rollcall_app::{
    ParticipantFilter, ParticipantId, ParticipantPayload, ParticipantQuery, ParticipantStatus,
    ParticipantUpdate, RecordGateway, Transaction, TransactionQuery, department_vocabulary,
};
use rollcall_db::{Store, validate_db_path};
use rollcall_testkit::{RegistryFaker, fixture_datetime, temp_db_path};
use time::{Date, Duration, Month};

fn payload(name: &str, employer: Option<&str>, department: Option<&str>) -> ParticipantPayload {
    ParticipantPayload {
        name: name.to_owned(),
        employer: employer.map(str::to_owned),
        department: department.map(str::to_owned),
        status: ParticipantStatus::Active,
    }
}

fn transaction(id: &ParticipantId, day: u8, amount_cents: i64) -> Transaction {
    Transaction {
        participant_id: id.clone(),
        tx_date: Date::from_calendar_date(2026, Month::March, day).expect("valid date"),
        tx_type: "Deposit".to_owned(),
        amount_cents,
        description: None,
    }
}

fn memory_store() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.supabase.co").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("/tmp/rollcall.db").is_ok());
    assert!(validate_db_path(":memory:").is_ok());
}

#[test]
fn bootstrap_is_idempotent_on_disk() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.create_participant(&payload("Avery Hill", None, None))?;
    }

    let reopened = Store::open(&path)?;
    reopened.bootstrap()?;
    let rows = reopened.read_participants(&ParticipantQuery::management(
        &ParticipantFilter::default(),
    ))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Avery Hill");
    Ok(())
}

#[test]
fn bootstrap_rejects_foreign_schema() -> Result<()> {
    let store = Store::open_memory()?;
    store.with_connection(|conn| {
        conn.execute_batch("CREATE TABLE participants (id INTEGER PRIMARY KEY, label TEXT);")?;
        Ok(())
    })?;

    let error = store.bootstrap().expect_err("foreign schema should fail");
    assert!(
        error.to_string().contains("missing required columns"),
        "unexpected error: {error:#}"
    );
    Ok(())
}

#[test]
fn management_query_is_ordered_and_searches_employer() -> Result<()> {
    let store = memory_store()?;
    let dana = store.create_participant(&payload("Dana Reyes", Some("ACME Freight"), None))?;
    store.create_participant(&payload("Lee Park", Some("Globex"), None))?;
    let acme = store.create_participant(&payload("Acme Jones", None, None))?;

    let all = store.read_participants(&ParticipantQuery::management(
        &ParticipantFilter::default(),
    ))?;
    let ids: Vec<ParticipantId> = all.into_iter().map(|row| row.participant_id).collect();
    assert_eq!(
        ids,
        vec![
            ParticipantId::from(1),
            ParticipantId::from(2),
            ParticipantId::from(3)
        ]
    );

    let matched = store.read_participants(&ParticipantQuery::management(
        &ParticipantFilter::new("acme", ""),
    ))?;
    let ids: Vec<ParticipantId> = matched.into_iter().map(|row| row.participant_id).collect();
    assert_eq!(ids, vec![dana, acme]);
    Ok(())
}

#[test]
fn search_treats_like_wildcards_literally() -> Result<()> {
    let store = memory_store()?;
    store.create_participant(&payload("Jo_Ann", None, None))?;
    store.create_participant(&payload("JoXAnn", None, None))?;

    let rows = store.read_participants(&ParticipantQuery::management(
        &ParticipantFilter::new("jo_", ""),
    ))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Jo_Ann");
    Ok(())
}

#[test]
fn search_folds_non_ascii_case() -> Result<()> {
    let store = memory_store()?;
    let elodie = store.create_participant(&payload("ÉLODIE MARTIN", Some("ÜBER GMBH"), None))?;
    store.create_participant(&payload("Lee Park", Some("Globex"), None))?;

    for term in ["élodie", "über", "Über GmbH"] {
        let rows = store.read_participants(&ParticipantQuery::management(
            &ParticipantFilter::new(term, ""),
        ))?;
        let ids: Vec<ParticipantId> = rows.into_iter().map(|row| row.participant_id).collect();
        assert_eq!(ids, vec![elodie.clone()], "term {term:?}");
    }
    Ok(())
}

#[test]
fn department_filter_is_exact() -> Result<()> {
    let store = memory_store()?;
    store.create_participant(&payload("A", None, Some("Finance")))?;
    store.create_participant(&payload("B", None, Some("Finance Ops")))?;
    store.create_participant(&payload("C", None, None))?;

    let rows = store.read_participants(&ParticipantQuery::management(
        &ParticipantFilter::new("", "Finance"),
    ))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "A");

    let vocabulary = department_vocabulary(store.read_departments()?);
    assert_eq!(
        vocabulary,
        vec!["Finance".to_owned(), "Finance Ops".to_owned()]
    );
    Ok(())
}

#[test]
fn recent_query_returns_three_newest() -> Result<()> {
    let store = memory_store()?;
    let anchor = fixture_datetime();
    for (offset, name) in ["Oldest", "Older", "Middle", "Newer", "Newest"]
        .iter()
        .enumerate()
    {
        store.create_participant_at(
            &payload(name, None, None),
            anchor + Duration::hours(offset as i64),
        )?;
    }

    let recent = store.read_participants(&ParticipantQuery::recent())?;
    let names: Vec<&str> = recent.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["Newest", "Newer", "Middle"]);
    assert_eq!(recent[0].updated_at, Some(anchor + Duration::hours(4)));
    Ok(())
}

#[test]
fn transactions_are_capped_and_newest_first() -> Result<()> {
    let store = memory_store()?;
    let id = store.create_participant(&payload("Kai Turner", None, None))?;
    let other = store.create_participant(&payload("Robin Gray", None, None))?;
    for day in 1..=5 {
        store.create_transaction(&transaction(&id, day, 1000 * i64::from(day)))?;
    }
    store.create_transaction(&transaction(&other, 28, 5))?;

    let rows = store.read_transactions(&TransactionQuery::recent_for(id.clone()))?;
    let days: Vec<u8> = rows.iter().map(|row| row.tx_date.day()).collect();
    assert_eq!(days, vec![5, 4, 3]);
    assert!(rows.iter().all(|row| row.participant_id == id));
    assert_eq!(rows[0].amount_cents, 5000);
    Ok(())
}

#[test]
fn archive_only_changes_status() -> Result<()> {
    let store = memory_store()?;
    let id = store.create_participant_at(
        &payload("Casey Ward", Some("Hooli"), Some("Legal")),
        fixture_datetime(),
    )?;

    store.update_participant(&id, &ParticipantUpdate::archive())?;
    let row = store.read_one_participant(&id)?;
    assert_eq!(row.status, ParticipantStatus::Inactive);
    assert_eq!(row.name, "Casey Ward");
    assert_eq!(row.employer.as_deref(), Some("Hooli"));
    assert_eq!(row.department.as_deref(), Some("Legal"));
    assert!(row.updated_at > Some(fixture_datetime()));
    Ok(())
}

#[test]
fn full_update_clears_absent_fields() -> Result<()> {
    let store = memory_store()?;
    let id = store.create_participant(&payload("Casey Ward", Some("Hooli"), Some("Legal")))?;

    let mut changed = payload("Casey Ward-Price", None, Some("Finance"));
    changed.status = ParticipantStatus::Inactive;
    store.update_participant(&id, &ParticipantUpdate::Full(changed))?;

    let row = store.read_one_participant(&id)?;
    assert_eq!(row.name, "Casey Ward-Price");
    assert_eq!(row.employer, None);
    assert_eq!(row.department.as_deref(), Some("Finance"));
    assert_eq!(row.status, ParticipantStatus::Inactive);
    Ok(())
}

#[test]
fn insert_rejects_blank_name() -> Result<()> {
    let store = memory_store()?;
    assert!(store.insert_participant(&payload("  ", None, None)).is_err());
    Ok(())
}

#[test]
fn cascade_delete_removes_everything() -> Result<()> {
    let store = memory_store()?;
    let id = store.create_participant(&payload("Drew Young", None, None))?;
    let keep = store.create_participant(&payload("Parker Reed", None, None))?;
    for day in 1..=4 {
        store.create_transaction(&transaction(&id, day, 100))?;
    }
    store.create_transaction(&transaction(&keep, 1, 100))?;

    store.delete_participant_cascade(&id)?;

    assert!(store.read_one_participant(&id).is_err());
    let mut unbounded = TransactionQuery::recent_for(id.clone());
    unbounded.limit = None;
    assert!(store.read_transactions(&unbounded)?.is_empty());
    assert_eq!(
        store
            .read_transactions(&TransactionQuery::recent_for(keep))?
            .len(),
        1
    );
    Ok(())
}

#[test]
fn failed_transactions_step_leaves_participant() -> Result<()> {
    let store = memory_store()?;
    let id = store.create_participant(&payload("Hayden Price", None, None))?;
    store.with_connection(|conn| {
        conn.execute_batch("DROP TABLE transactions;")?;
        Ok(())
    })?;

    assert!(store.delete_transactions(&id).is_err());
    assert!(store.delete_participant_cascade(&id).is_err());
    assert_eq!(store.read_one_participant(&id)?.name, "Hayden Price");
    Ok(())
}

#[test]
fn missing_participant_load_fails_with_message() -> Result<()> {
    let store = memory_store()?;
    let error = store
        .read_one_participant(&ParticipantId::from(41))
        .expect_err("missing participant");
    assert_eq!(error.to_string(), "participant 41 not found");

    let error = store
        .read_one_participant(&ParticipantId::new("abc"))
        .expect_err("non-numeric key");
    assert!(error.to_string().contains("not a valid key"));
    Ok(())
}

#[test]
fn faker_registry_round_trips_through_store() -> Result<()> {
    let store = memory_store()?;
    let mut faker = RegistryFaker::new(21);
    let records = faker.registry(12);
    let mut expected_transactions = 0;
    for record in &records {
        let id = store.create_participant_at(&record.payload, record.updated_at)?;
        for transaction in record.transactions_for(&id) {
            store.create_transaction(&transaction)?;
            expected_transactions += 1;
        }
    }

    let all = store.read_participants(&ParticipantQuery::management(
        &ParticipantFilter::default(),
    ))?;
    assert_eq!(all.len(), records.len());

    let mut total = 0;
    for participant in &all {
        let mut query = TransactionQuery::recent_for(participant.participant_id.clone());
        query.limit = None;
        total += store.read_transactions(&query)?.len();
    }
    assert_eq!(total, expected_transactions);
    Ok(())
}
