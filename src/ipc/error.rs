use serde_json::json;

pub fn ok(id: &str, data: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "success": true,
        "data": data
    })
}

pub fn err(id: &str, code: &str, message: impl Into<String>) -> serde_json::Value {
    json!({
        "id": id,
        "success": false,
        "code": code,
        "error": message.into(),
    })
}
