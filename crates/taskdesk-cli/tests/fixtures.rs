//! Shared helpers for CLI integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use serde_json::{Value, json};

pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

pub fn user_json() -> Value {
    json!({
        "id": "u1",
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "createdAt": "2025-03-01T12:00:00.000Z"
    })
}

pub fn task_json(id: &str, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "status": status,
        "userId": "u1",
        "createdAt": "2025-03-01T12:00:00.000Z"
    })
}

/// Writes a stored session the way the CLI persists it.
pub fn write_session(home: &Path, access: &str, refresh: &str) {
    fs::create_dir_all(home).unwrap();
    let contents = json!({ "accessToken": access, "refreshToken": refresh });
    fs::write(home.join("session.json"), contents.to_string()).unwrap();
}

/// Reads the stored session, `None` when signed out.
pub fn read_session(home: &Path) -> Option<Value> {
    let contents = fs::read_to_string(home.join("session.json")).ok()?;
    serde_json::from_str(&contents).ok()
}
