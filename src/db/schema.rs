//! SQL DDL for initializing the user and contact storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `users.email` UNIQUE, stored normalized (trimmed, lowercase)
/// - `users.google_id` UNIQUE when present
/// - timestamps as RFC3339 TEXT
/// - `users.otp_attempts` counting wrong guesses against the pending OTP
/// - `emergency_contacts.user_id` referencing `users(id)` without cascade
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NULL,
    google_id TEXT NULL UNIQUE,
    is_verified INTEGER NOT NULL DEFAULT 0,
    otp TEXT NULL,
    otp_expiry TEXT NULL, -- RFC3339
    otp_attempts INTEGER NOT NULL DEFAULT 0,
    reset_expiry TEXT NULL, -- RFC3339
    created_at TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS emergency_contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    email TEXT NULL,
    phone TEXT NOT NULL,
    relation TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_emergency_contacts_user_id ON emergency_contacts(user_id);
"#;
