use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

const ADMIN: &str = "admin@campus.edu";

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .args(["--bootstrap-admin", ADMIN, "--log", "warn"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("success").and_then(|v| v.as_bool()) == Some(false) {
        let code = value.get("code").and_then(|v| v.as_str()).unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
        assert!(
            value.get("error").and_then(|v| v.as_str()).is_some(),
            "failure without error string for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = tempfile::tempdir().expect("temp workspace");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["success"], true);
    assert!(health["data"]["workspacePath"].is_null());

    // Everything that needs storage answers no_workspace before a workspace is chosen.
    let early = request(&mut stdin, &mut reader, "2", "map.locations.list", json!({}));
    assert_eq!(early["code"], "no_workspace");

    // A workspace nested under a regular file cannot be created.
    let blocker = workspace.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").expect("write blocker file");
    let refused = request(
        &mut stdin,
        &mut reader,
        "2b",
        "workspace.select",
        json!({ "path": blocker.join("ws").to_string_lossy() }),
    );
    assert_eq!(refused["success"], false);
    assert_eq!(refused["code"], "db_failed");
    assert_eq!(refused["error"], "failed to open workspace");

    let selected = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    assert_eq!(selected["success"], true);
    assert!(workspace.path().join("campus.sqlite3").is_file());

    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "users.register",
        json!({ "email": "smoke@campus.edu", "name": "Smoke Student" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.signIn",
        json!({ "email": "smoke@campus.edu" }),
    );
    let _ = request(&mut stdin, &mut reader, "6", "session.get", json!({}));
    let _ = request(&mut stdin, &mut reader, "7", "onboarding.status", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "onboarding.createProfile",
        json!({ "yearOfStudy": 1, "major": "History", "interests": [] }),
    );
    let _ = request(&mut stdin, &mut reader, "9", "scoring.profile", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "scoring.addActivity",
        json!({ "category": "READINESS", "type": "ENGAGEMENT", "description": "smoke", "points": 1 }),
    );
    let _ = request(&mut stdin, &mut reader, "11", "scoring.recentActivities", json!({}));
    let _ = request(&mut stdin, &mut reader, "12", "scoring.streak", json!({}));
    let _ = request(&mut stdin, &mut reader, "13", "scoring.audit", json!({}));
    let _ = request(&mut stdin, &mut reader, "14", "notifications.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "notifications.markRead",
        json!({ "notificationId": "missing" }),
    );
    let _ = request(&mut stdin, &mut reader, "16", "recommendations.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "17",
        "recommendations.updateStatus",
        json!({ "recommendationId": "missing", "status": "VIEWED" }),
    );
    let _ = request(&mut stdin, &mut reader, "18", "map.locations.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "19",
        "map.locations.get",
        json!({ "locationId": "missing" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "20",
        "map.locations.rate",
        json!({ "locationId": "missing", "rating": 3 }),
    );

    let _ = request(&mut stdin, &mut reader, "21", "session.signIn", json!({ "email": ADMIN }));
    let _ = request(
        &mut stdin,
        &mut reader,
        "22",
        "admin.createNotification",
        json!({ "title": "Hi", "message": "Welcome", "type": "EVENT", "priority": "LOW" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "23",
        "admin.broadcastRecommendation",
        json!({ "title": "T", "description": "D", "type": "WORKSHOP", "priority": 10, "tags": [] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "24",
        "map.locations.create",
        json!({
            "name": "Quad", "type": "OTHER", "latitude": 0.0, "longitude": 0.0,
            "building": "Outdoors", "floor": 0, "roomNumber": "-"
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "25",
        "map.locations.setAvailability",
        json!({ "locationId": "missing", "isAvailable": false }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "26",
        "users.setRole",
        json!({ "email": "smoke@campus.edu", "role": "TEACHER" }),
    );
    let _ = request(&mut stdin, &mut reader, "27", "session.signOut", json!({}));

    let unknown = {
        writeln!(stdin, "{}", json!({ "id": "28", "method": "nope.nothing" })).expect("write");
        stdin.flush().expect("flush");
        let mut line = String::new();
        reader.read_line(&mut line).expect("read");
        serde_json::from_str::<serde_json::Value>(line.trim()).expect("json")
    };
    assert_eq!(unknown["success"], false);
    assert_eq!(unknown["code"], "not_implemented");

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(bad["code"], "bad_json");

    drop(stdin);
    let _ = child.wait();
}
