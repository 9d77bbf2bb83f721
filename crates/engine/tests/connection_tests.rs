use serde_json::{Value, json};
use sqlrest_engine::{
    Connection, Error, ErrorPolicy, LAST_INSERT_ID_COLUMN, Method, RestRequest, RestResponse,
    Transport, TransportError,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

/// In-memory transport: records every request and plays back canned replies.
#[derive(Default)]
struct Recorder {
    sent: RefCell<Vec<RestRequest>>,
    replies: RefCell<VecDeque<Result<RestResponse, TransportError>>>,
}

impl Recorder {
    fn reply(self, status: u16, body: &str) -> Self {
        self.replies.borrow_mut().push_back(Ok(RestResponse {
            status,
            body: body.to_string(),
        }));
        self
    }

    fn fail(self, err: TransportError) -> Self {
        self.replies.borrow_mut().push_back(Err(err));
        self
    }

    fn sent(&self) -> Vec<RestRequest> {
        self.sent.borrow().clone()
    }

    fn last(&self) -> RestRequest {
        self.sent.borrow().last().cloned().expect("no request sent")
    }
}

impl Transport for Recorder {
    fn send(&self, request: &RestRequest) -> Result<RestResponse, TransportError> {
        self.sent.borrow_mut().push(request.clone());
        self.replies.borrow_mut().pop_front().unwrap_or(Ok(RestResponse {
            status: 200,
            body: "[]".to_string(),
        }))
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn connect(recorder: Recorder) -> Connection<Recorder> {
    Connection::with_transport(recorder)
}

#[test]
fn insert_then_last_insert_rowid() {
    let mut db = connect(Recorder::default().reply(
        201,
        r#"[{"id":41,"full_name":"Juan Pérez","phone":"+56911112222"}]"#,
    ));

    let inserted = db
        .execute(
            "INSERT INTO crm_leads (full_name, phone) VALUES (?, ?)",
            &[json!("Juan Pérez"), json!("+56911112222")],
        )
        .unwrap();
    let request = db.transport().last();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.table, "crm_leads");
    assert!(request.query.is_empty());
    assert_eq!(
        request.body,
        Some(json!({"full_name": "Juan Pérez", "phone": "+56911112222"}))
    );
    assert_eq!(inserted.last_insert_id(), Some(&json!(41)));
    assert_eq!(db.last_insert_id(), Some(&json!(41)));

    let id = db.execute("SELECT last_insert_rowid()", &[]).unwrap();
    let row = id.fetch_one().unwrap();
    assert_eq!(row[LAST_INSERT_ID_COLUMN], json!(41));
    assert_eq!(row[0], json!(41));
    // answered locally
    assert_eq!(db.transport().sent().len(), 1);
}

#[test]
fn fresh_connection_has_no_last_insert_id() {
    let mut db = connect(Recorder::default());
    assert_eq!(db.last_insert_id(), None);
    let id = db.execute("SELECT last_insert_rowid()", &[]).unwrap();
    assert_eq!(id.fetch_one().unwrap()[0], Value::Null);
}

#[test]
fn select_with_filter_and_order() {
    let mut db = connect(Recorder::default().reply(200, r#"[{"id":1,"stage":"agendado"}]"#));
    let rows = db
        .execute(
            "SELECT * FROM crm_leads WHERE stage=? ORDER BY updated_at DESC",
            &[json!("agendado")],
        )
        .unwrap();
    let request = db.transport().last();
    assert_eq!(request.method, Method::Get);
    assert_eq!(
        request.query,
        pairs(&[
            ("stage", "eq.agendado"),
            ("order", "updated_at.desc"),
            ("select", "*"),
        ])
    );
    assert_eq!(request.body, None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.fetch_one().unwrap().field("stage").unwrap(), "agendado");
}

#[test]
fn update_sends_patch_with_body_and_filter() {
    let mut db = connect(Recorder::default().reply(200, r#"[{"id":20,"status":"en_venta"}]"#));
    db.execute(
        "UPDATE consignaciones SET status=?, updated_at=? WHERE id=?",
        &[json!("en_venta"), json!("2026-01-01T00:00:00"), json!(20)],
    )
    .unwrap();
    let request = db.transport().last();
    assert_eq!(request.method, Method::Patch);
    assert_eq!(request.table, "consignaciones");
    assert_eq!(request.query, pairs(&[("id", "eq.20")]));
    assert_eq!(
        request.body,
        Some(json!({"status": "en_venta", "updated_at": "2026-01-01T00:00:00"}))
    );
}

#[test]
fn update_placeholders_split_between_set_and_where() {
    let mut db = connect(Recorder::default());
    db.execute(
        "UPDATE t SET a=?, b=? WHERE c=?",
        &[json!(1), json!(2), json!(3)],
    )
    .unwrap();
    let request = db.transport().last();
    assert_eq!(request.body, Some(json!({"a": 1, "b": 2})));
    assert_eq!(request.query, pairs(&[("c", "eq.3")]));
}

#[test]
fn delete_sends_filter_only() {
    let mut db = connect(Recorder::default().reply(204, ""));
    let rows = db
        .execute("DELETE FROM compradores WHERE id=?", &[json!(5)])
        .unwrap();
    let request = db.transport().last();
    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.query, pairs(&[("id", "eq.5")]));
    assert_eq!(request.body, None);
    assert!(rows.is_empty());
}

#[test]
fn repeated_select_is_identical() {
    let body = r#"[{"id":1,"brand":"Kia"},{"id":2,"brand":"BYD"}]"#;
    let mut db = connect(Recorder::default().reply(200, body).reply(200, body));
    let sql = "SELECT id, brand FROM cars WHERE status != 'sold' ORDER BY id";
    let first = db.execute(sql, &[]).unwrap();
    let second = db.execute(sql, &[]).unwrap();
    assert_eq!(first, second);
    let sent = db.transport().sent();
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[0].param("status"), Some("neq.sold"));
}

#[test]
fn count_is_computed_from_fetched_keys() {
    let mut db = connect(Recorder::default().reply(200, r#"[{"id":1},{"id":2},{"id":3}]"#));
    let rows = db
        .execute(
            "SELECT COUNT(*) FROM cars WHERE status IN ('sold','sent_dte')",
            &[],
        )
        .unwrap();
    assert_eq!(rows.fetch_one().unwrap()[0], json!(3));
    assert_eq!(rows.fetch_one().unwrap()["COUNT(*)"], json!(3));
    let request = db.transport().last();
    assert_eq!(
        request.query,
        pairs(&[("status", "in.(sold,sent_dte)"), ("select", "id")])
    );
}

#[test]
fn count_alias_and_custom_primary_key() {
    let mut db =
        connect(Recorder::default().reply(200, r#"[{"uuid":"a"}]"#)).set_primary_key("uuid");
    let rows = db
        .execute("SELECT COUNT(*) AS total FROM leads", &[])
        .unwrap();
    assert_eq!(rows.fetch_one().unwrap()["total"], json!(1));
    assert_eq!(db.transport().last().param("select"), Some("uuid"));
}

#[test]
fn strict_policy_surfaces_status_errors() {
    let mut db = connect(
        Recorder::default().reply(404, r#"{"message":"relation does not exist"}"#),
    );
    let err = db.execute("SELECT * FROM nope", &[]).unwrap_err();
    match err {
        Error::Status {
            method,
            table,
            status,
            body,
        } => {
            assert_eq!(method, Method::Get);
            assert_eq!(table, "nope");
            assert_eq!(status, 404);
            assert!(body.contains("relation does not exist"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn strict_policy_surfaces_transport_errors() {
    let mut db =
        connect(Recorder::default().fail(TransportError::Timeout(Duration::from_secs(10))));
    let err = db.execute("SELECT * FROM cars", &[]).unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Timeout(_))));
}

#[test]
fn strict_policy_surfaces_decode_errors() {
    let mut db = connect(Recorder::default().reply(200, "<html>bad gateway</html>"));
    let err = db.execute("SELECT * FROM cars", &[]).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn fail_soft_degrades_to_empty_results() {
    let mut db = connect(
        Recorder::default()
            .reply(500, "internal error")
            .fail(TransportError::Http("connection reset".into()))
            .reply(500, "internal error"),
    )
    .set_policy(ErrorPolicy::FailSoft);

    assert!(db.execute("SELECT * FROM cars", &[]).unwrap().is_empty());
    assert!(
        db.execute("DELETE FROM cars WHERE id = ?", &[json!(1)])
            .unwrap()
            .is_empty()
    );
    let count = db.execute("SELECT COUNT(*) FROM cars", &[]).unwrap();
    assert_eq!(count.fetch_one().unwrap()[0], json!(0));
}

#[test]
fn failed_insert_keeps_previous_id() {
    let mut db = connect(
        Recorder::default()
            .reply(201, r#"[{"id":7}]"#)
            .reply(409, r#"{"message":"duplicate key"}"#),
    )
    .set_policy(ErrorPolicy::FailSoft);

    db.execute("INSERT INTO cars (plate) VALUES (?)", &[json!("AB1234")])
        .unwrap();
    let failed = db
        .execute("INSERT INTO cars (plate) VALUES (?)", &[json!("AB1234")])
        .unwrap();
    assert!(failed.is_empty());
    assert_eq!(failed.last_insert_id(), None);
    assert_eq!(db.last_insert_id(), Some(&json!(7)));
}

#[test]
fn unrecognized_predicates_fail_reads_under_strict() {
    let mut db = connect(Recorder::default());
    let err = db
        .execute(
            "SELECT * FROM cars WHERE length(plate) = ? AND brand = ?",
            &[json!(6), json!("Kia")],
        )
        .unwrap_err();
    match err {
        Error::UnrecognizedPredicates { table, count, .. } => {
            assert_eq!(table, "cars");
            assert_eq!(count, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(db.transport().sent().is_empty());
}

#[test]
fn unrecognized_predicates_are_skipped_on_reads_under_fail_soft() {
    let mut db = connect(Recorder::default()).set_policy(ErrorPolicy::FailSoft);
    db.execute(
        "SELECT * FROM cars WHERE length(plate) = ? AND brand = ?",
        &[json!(6), json!("Kia")],
    )
    .unwrap();
    assert_eq!(
        db.transport().last().query,
        pairs(&[("brand", "eq.Kia"), ("select", "*")])
    );
}

#[test]
fn arithmetic_conjunct_is_skipped_under_fail_soft() {
    let mut db = connect(Recorder::default()).set_policy(ErrorPolicy::FailSoft);
    db.execute(
        "SELECT * FROM cars WHERE price + 1 > ? AND brand = ?",
        &[json!(5), json!("Kia")],
    )
    .unwrap();
    assert_eq!(
        db.transport().last().query,
        pairs(&[("brand", "eq.Kia"), ("select", "*")])
    );
}

#[test]
fn unrecognized_predicates_always_fail_writes() {
    let mut db = connect(Recorder::default()).set_policy(ErrorPolicy::FailSoft);
    let err = db
        .execute("DELETE FROM cars WHERE length(plate) = ?", &[json!(6)])
        .unwrap_err();
    assert!(matches!(err, Error::UnrecognizedPredicates { .. }));
    let err = db
        .execute(
            "UPDATE cars SET status = 'sold' WHERE length(plate) = ?",
            &[json!(6)],
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnrecognizedPredicates { .. }));
    assert!(db.transport().sent().is_empty());
}

#[test]
fn parse_errors_fail_regardless_of_policy() {
    let mut db = connect(Recorder::default()).set_policy(ErrorPolicy::FailSoft);
    let err = db
        .execute("SELECT * FROM cars WHERE a = ? OR b = ?", &[json!(1), json!(2)])
        .unwrap_err();
    match err {
        Error::Parse { sql, .. } => assert!(sql.contains(" OR ")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(db.transport().sent().is_empty());
}

#[test]
fn schema_statements_are_ignored() {
    let mut db = connect(Recorder::default());
    let rows = db
        .execute(
            "CREATE TABLE IF NOT EXISTS cars (id INTEGER PRIMARY KEY AUTOINCREMENT, brand TEXT)",
            &[],
        )
        .unwrap();
    assert!(rows.is_empty());
    let rows = db
        .execute(
            "CREATE TABLE cars (id INTEGER /* pk */, price REAL CHECK (price - 1 >= 0), \
             label TEXT AS (brand || ' ' || model))",
            &[],
        )
        .unwrap();
    assert!(rows.is_empty());
    assert!(db.execute("PRAGMA foreign_keys = ON", &[]).unwrap().is_empty());
    assert!(db.transport().sent().is_empty());
}

#[test]
fn rows_serialize_as_json_array() {
    let mut db = connect(Recorder::default().reply(200, r#"[{"id":1,"brand":"Kia"}]"#));
    let rows = db.execute("SELECT id, brand FROM cars", &[]).unwrap();
    assert_eq!(
        serde_json::to_string(&rows).unwrap(),
        r#"[{"id":1,"brand":"Kia"}]"#
    );
    let brands: Vec<String> = rows
        .iter()
        .map(|row| row.get_as::<String>("brand").unwrap())
        .collect();
    assert_eq!(brands, ["Kia"]);
}
