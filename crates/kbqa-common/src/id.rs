pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time as an RFC 3339 string, the format used for locally
/// created records.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
