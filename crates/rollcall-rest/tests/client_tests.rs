// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use rollcall_app::{
    ParticipantFilter, ParticipantId, ParticipantPayload, ParticipantQuery, ParticipantStatus,
    ParticipantUpdate, RecordGateway, TransactionQuery,
};
use rollcall_rest::Client;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};
use url::Url;

#[derive(Debug)]
struct Seen {
    method: String,
    path: String,
    query: BTreeMap<String, String>,
    apikey: Option<String>,
    authorization: Option<String>,
    body: String,
}

type Mock = (String, mpsc::Receiver<Seen>, JoinHandle<()>);

/// Answers one request per entry in `replies` and reports what it saw.
fn mock(replies: Vec<(u16, &'static str)>) -> Result<Mock> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());
    let (sender, receiver) = mpsc::channel();

    let handle = thread::spawn(move || {
        for (status, body) in replies {
            let mut request = server.recv().expect("request expected");
            let url = Url::parse(&format!("http://localhost{}", request.url()))
                .expect("request url should parse");
            let header = |name: &'static str| {
                request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv(name))
                    .map(|header| header.value.as_str().to_owned())
            };
            let apikey = header("apikey");
            let authorization = header("Authorization");
            let mut request_body = String::new();
            request
                .as_reader()
                .read_to_string(&mut request_body)
                .expect("request body should read");
            sender
                .send(Seen {
                    method: request.method().as_str().to_owned(),
                    path: url.path().to_owned(),
                    query: url.query_pairs().into_owned().collect(),
                    apikey,
                    authorization,
                    body: request_body,
                })
                .expect("test should be listening");

            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(
                    Header::from_bytes("Content-Type", "application/json")
                        .expect("valid content type header"),
                );
            request.respond(response).expect("response should succeed");
        }
    });

    Ok((addr, receiver, handle))
}

fn client(addr: &str) -> Result<Client> {
    Client::new(addr, "anon-key", Duration::from_secs(2))
}

#[test]
fn new_rejects_unusable_settings() {
    assert!(Client::new("", "key", Duration::from_secs(1)).is_err());
    assert!(Client::new("ftp://example.com", "key", Duration::from_secs(1)).is_err());
    let error = Client::new("https://example.com", " ", Duration::from_secs(1))
        .expect_err("blank key should fail");
    assert!(error.to_string().contains("ROLLCALL_API_KEY"));
}

#[test]
fn management_read_sends_filter_order_and_credentials() -> Result<()> {
    let (addr, seen, handle) = mock(vec![(
        200,
        r#"[{"participant_id":7,"name":"Dana Reyes","employer":"Acme Freight","department":"Finance","status":"Active","updated_at":"2026-02-19T12:34:56.123456+00:00"}]"#,
    )])?;

    let rows = client(&addr)?.read_participants(&ParticipantQuery::management(
        &ParticipantFilter::new("acme", "Finance"),
    ))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].participant_id, ParticipantId::from(7));
    assert_eq!(rows[0].employer.as_deref(), Some("Acme Freight"));
    assert!(rows[0].updated_at.is_some());

    let request = seen.recv()?;
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/rest/v1/participants");
    assert_eq!(request.apikey.as_deref(), Some("anon-key"));
    assert_eq!(request.authorization.as_deref(), Some("Bearer anon-key"));
    assert_eq!(
        request.query.get("or").map(String::as_str),
        Some("(name.ilike.*acme*,employer.ilike.*acme*)")
    );
    assert_eq!(
        request.query.get("department").map(String::as_str),
        Some("eq.Finance")
    );
    assert_eq!(
        request.query.get("order").map(String::as_str),
        Some("participant_id.asc")
    );
    assert!(!request.query.contains_key("limit"));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn recent_read_orders_by_update_time_with_limit() -> Result<()> {
    let (addr, seen, handle) = mock(vec![(200, "[]")])?;

    let rows = client(&addr)?.read_participants(&ParticipantQuery::recent())?;
    assert!(rows.is_empty());

    let request = seen.recv()?;
    assert_eq!(
        request.query.get("order").map(String::as_str),
        Some("updated_at.desc")
    );
    assert_eq!(request.query.get("limit").map(String::as_str), Some("3"));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn transactions_accept_numeric_and_text_amounts() -> Result<()> {
    let (addr, seen, handle) = mock(vec![(
        200,
        r#"[{"participant_id":"7","tx_date":"2026-03-05","tx_type":"Fee","amount":-3.1,"description":null},{"participant_id":"7","tx_date":"2026-03-04","tx_type":"Deposit","amount":"1250.00","description":"Payroll"}]"#,
    )])?;

    let rows =
        client(&addr)?.read_transactions(&TransactionQuery::recent_for(ParticipantId::from(7)))?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].amount_cents, -310);
    assert_eq!(rows[1].amount_cents, 125_000);
    assert_eq!(rows[1].description.as_deref(), Some("Payroll"));

    let request = seen.recv()?;
    assert_eq!(request.path, "/rest/v1/transactions");
    assert_eq!(
        request.query.get("participant_id").map(String::as_str),
        Some("eq.7")
    );
    assert_eq!(
        request.query.get("order").map(String::as_str),
        Some("tx_date.desc")
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn read_one_reports_missing_participant() -> Result<()> {
    let (addr, _seen, handle) = mock(vec![(200, "[]")])?;

    let error = client(&addr)?
        .read_one_participant(&ParticipantId::from(41))
        .expect_err("empty result should fail");
    assert_eq!(error.to_string(), "participant 41 not found");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn archive_patches_only_status() -> Result<()> {
    let (addr, seen, handle) = mock(vec![(204, "")])?;

    client(&addr)?.update_participant(&ParticipantId::from(9), &ParticipantUpdate::archive())?;

    let request = seen.recv()?;
    assert_eq!(request.method, "PATCH");
    assert_eq!(
        request.query.get("participant_id").map(String::as_str),
        Some("eq.9")
    );
    let body: serde_json::Value = serde_json::from_str(&request.body)?;
    assert_eq!(body, serde_json::json!({ "status": "Inactive" }));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn insert_posts_normalized_payload() -> Result<()> {
    let (addr, seen, handle) = mock(vec![(201, "")])?;

    client(&addr)?.insert_participant(&ParticipantPayload {
        name: "Kai Turner".to_owned(),
        employer: None,
        department: Some("Legal".to_owned()),
        status: ParticipantStatus::Active,
    })?;

    let request = seen.recv()?;
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/rest/v1/participants");
    let body: serde_json::Value = serde_json::from_str(&request.body)?;
    assert_eq!(
        body,
        serde_json::json!([{
            "name": "Kai Turner",
            "employer": null,
            "department": "Legal",
            "status": "Active"
        }])
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn cascade_delete_calls_configured_function() -> Result<()> {
    let (addr, seen, handle) = mock(vec![(204, "")])?;

    client(&addr)?
        .with_cascade_function("purge_participant")
        .delete_participant_cascade(&ParticipantId::from(12))?;

    let request = seen.recv()?;
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/rest/v1/rpc/purge_participant");
    let body: serde_json::Value = serde_json::from_str(&request.body)?;
    assert_eq!(body, serde_json::json!({ "p_participant_id": 12 }));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn sequential_delete_targets_each_table() -> Result<()> {
    let (addr, seen, handle) = mock(vec![(204, ""), (204, "")])?;
    let client = client(&addr)?;
    let id = ParticipantId::from(3);

    client.delete_transactions(&id)?;
    client.delete_participant(&id)?;

    let first = seen.recv()?;
    let second = seen.recv()?;
    assert_eq!(
        (first.method.as_str(), first.path.as_str()),
        ("DELETE", "/rest/v1/transactions")
    );
    assert_eq!(
        (second.method.as_str(), second.path.as_str()),
        ("DELETE", "/rest/v1/participants")
    );
    assert_eq!(
        second.query.get("participant_id").map(String::as_str),
        Some("eq.3")
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn departments_skip_nulls() -> Result<()> {
    let (addr, seen, handle) = mock(vec![(
        200,
        r#"[{"department":"Finance"},{"department":null},{"department":"Legal"}]"#,
    )])?;

    let departments = client(&addr)?.read_departments()?;
    assert_eq!(departments, vec!["Finance".to_owned(), "Legal".to_owned()]);

    let request = seen.recv()?;
    assert_eq!(
        request.query.get("department").map(String::as_str),
        Some("not.is.null")
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn server_error_message_is_surfaced() -> Result<()> {
    let (addr, _seen, handle) = mock(vec![(
        409,
        r#"{"code":"23503","details":null,"hint":null,"message":"update or delete violates foreign key constraint"}"#,
    )])?;

    let error = client(&addr)?
        .delete_participant(&ParticipantId::from(1))
        .expect_err("conflict should fail");
    assert_eq!(
        error.to_string(),
        "update or delete violates foreign key constraint"
    );

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn unreachable_server_names_the_base_url() {
    let client = Client::new("http://127.0.0.1:1", "anon-key", Duration::from_millis(200))
        .expect("client should initialize");

    let error = client.probe().expect_err("probe should fail");
    assert!(
        error.to_string().contains("127.0.0.1:1"),
        "unexpected error: {error:#}"
    );
}
