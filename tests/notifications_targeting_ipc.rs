use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

const ADMIN: &str = "registrar@campus.edu";

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .env("CAMPUSD_BOOTSTRAP_ADMIN", ADMIN)
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("success").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value.get("error").and_then(|v| v.as_str()).unwrap_or("unknown error")
    );
    value.get("data").cloned().unwrap_or_else(|| json!({}))
}

fn visible_titles(data: &serde_json::Value) -> Vec<String> {
    data["notifications"]
        .as_array()
        .expect("notifications array")
        .iter()
        .map(|n| n["title"].as_str().unwrap_or("").to_string())
        .collect()
}

#[test]
fn role_targeting_visibility_and_idempotent_read_receipts() {
    let workspace = tempfile::tempdir().expect("temp workspace");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.register",
        json!({ "email": "student@campus.edu", "name": "Sam" }),
    );
    let picked = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "users.register",
        json!({ "email": "picked@campus.edu", "name": "Pat" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "users.register",
        json!({ "email": "teacher@campus.edu", "name": "Tess" }),
    );
    let picked_id = picked["id"].as_str().expect("picked id").to_string();

    // Students cannot broadcast.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.signIn",
        json!({ "email": "student@campus.edu" }),
    );
    let denied = request(
        &mut stdin,
        &mut reader,
        "6",
        "admin.createNotification",
        json!({ "title": "x", "message": "y", "type": "EVENT", "priority": "LOW" }),
    );
    assert_eq!(denied["code"], "forbidden");

    let _ = request_ok(&mut stdin, &mut reader, "7", "session.signIn", json!({ "email": ADMIN }));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "users.setRole",
        json!({ "email": "teacher@campus.edu", "role": "TEACHER" }),
    );

    // A plain ADMIN may publish but may not change roles.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8a",
        "users.register",
        json!({ "email": "officer@campus.edu", "name": "Olu" }),
    );
    let officer = request_ok(
        &mut stdin,
        &mut reader,
        "8b",
        "users.setRole",
        json!({ "email": "officer@campus.edu", "role": "ADMIN" }),
    );
    assert_eq!(officer["role"], "ADMIN");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8c",
        "session.signIn",
        json!({ "email": "officer@campus.edu" }),
    );
    let escalate = request(
        &mut stdin,
        &mut reader,
        "8d",
        "users.setRole",
        json!({ "email": "student@campus.edu", "role": "SUPER_ADMIN" }),
    );
    assert_eq!(escalate["success"], false);
    assert_eq!(escalate["code"], "forbidden");
    let me = request_ok(&mut stdin, &mut reader, "8e", "session.get", json!({}));
    assert_eq!(me["role"], "ADMIN");
    let _ = request_ok(&mut stdin, &mut reader, "8f", "session.signIn", json!({ "email": ADMIN }));
    let broadcast = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "admin.createNotification",
        json!({
            "title": "Campus closed Friday",
            "message": "Snow day",
            "type": "SYSTEM_ALERT",
            "priority": "URGENT",
            "targetRole": ""
        }),
    );
    assert!(broadcast["targetRole"].is_null());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "admin.createNotification",
        json!({
            "title": "Grades due",
            "message": "Submit by Monday",
            "type": "DEADLINE",
            "priority": "HIGH",
            "targetRole": "TEACHER",
            "targetUsers": [picked_id]
        }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "session.signIn",
        json!({ "email": "teacher@campus.edu" }),
    );
    let teacher_view = request_ok(&mut stdin, &mut reader, "12", "notifications.list", json!({}));
    assert_eq!(
        visible_titles(&teacher_view),
        vec!["Grades due".to_string(), "Campus closed Friday".to_string()]
    );
    assert_eq!(teacher_view["unreadCount"], 2);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "session.signIn",
        json!({ "email": "picked@campus.edu" }),
    );
    let picked_view = request_ok(&mut stdin, &mut reader, "14", "notifications.list", json!({}));
    assert_eq!(visible_titles(&picked_view).len(), 2);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "session.signIn",
        json!({ "email": "student@campus.edu" }),
    );
    let student_view = request_ok(&mut stdin, &mut reader, "16", "notifications.list", json!({}));
    assert_eq!(
        visible_titles(&student_view),
        vec!["Campus closed Friday".to_string()]
    );
    let hidden_id = teacher_view["notifications"][0]["id"]
        .as_str()
        .expect("hidden id")
        .to_string();
    let hidden = request(
        &mut stdin,
        &mut reader,
        "17",
        "notifications.markRead",
        json!({ "notificationId": hidden_id }),
    );
    assert_eq!(hidden["code"], "not_found");

    let broadcast_id = broadcast["id"].as_str().expect("broadcast id").to_string();
    let student_id = student["id"].as_str().expect("student id").to_string();
    for i in 0..3 {
        let marked = request_ok(
            &mut stdin,
            &mut reader,
            &format!("r{i}"),
            "notifications.markRead",
            json!({ "notificationId": broadcast_id }),
        );
        let read_by = marked["readBy"].as_array().expect("readBy");
        let hits = read_by
            .iter()
            .filter(|v| v.as_str() == Some(student_id.as_str()))
            .count();
        assert_eq!(hits, 1);
    }
    let after = request_ok(&mut stdin, &mut reader, "18", "notifications.list", json!({}));
    assert_eq!(after["unreadCount"], 0);
    assert_eq!(after["notifications"][0]["read"], true);
}
