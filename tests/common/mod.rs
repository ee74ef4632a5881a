#![allow(dead_code)]

use dropout_console::{AdminConsole, ConsoleConfig, MemoryTokenStore};
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

pub fn config_for(server: &MockServer, timeout_seconds: u64) -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.service.base_url = server.url("/api");
    config.service.timeout_seconds = timeout_seconds;
    config
}

pub fn file_console(server: &MockServer, dir: &Path) -> AdminConsole {
    let mut config = config_for(server, 5);
    config.session.storage_dir = dir.to_string_lossy().to_string();
    AdminConsole::from_config(config).unwrap()
}

pub fn memory_console(server: &MockServer, timeout_seconds: u64) -> AdminConsole {
    AdminConsole::with_store(
        config_for(server, timeout_seconds),
        Arc::new(MemoryTokenStore::new()),
    )
    .unwrap()
}

pub fn teacher_json() -> serde_json::Value {
    json!({"id": "t-1", "email": "meera@school.org", "full_name": "Meera Rao"})
}

pub fn mock_login<'a>(server: &'a MockServer) -> Mock<'a> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/auth/login")
            .json_body(json!({"email": "meera@school.org", "password": "secret"}));
        then.status(200).json_body(json!({
            "success": true,
            "message": "Login successful",
            "data": {
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "teacher": teacher_json()
            }
        }));
    })
}

pub fn mock_logout<'a>(server: &'a MockServer) -> Mock<'a> {
    server.mock(|when, then| {
        when.method(POST).path("/api/auth/logout");
        then.status(200)
            .json_body(json!({"success": true, "message": "Logout successful"}));
    })
}

pub fn student_json(id: &str, roll_no: u32, name: &str) -> serde_json::Value {
    json!({
        "student_id": id,
        "roll_no": roll_no,
        "student_name": name,
        "class": "8th",
        "attendance": "68.5",
        "marks": 52,
        "gender": "Male",
        "income": null,
        "location": null,
        "parent_occupation": "Farmer"
    })
}

pub fn prediction_json(label: &str, score: f64) -> serde_json::Value {
    json!({
        "dropout_risk": label,
        "risk_score": score,
        "confidence": 0.9,
        "recommendation": "Monitor attendance weekly"
    })
}
