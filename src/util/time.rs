use chrono::Utc;

/// Current time as epoch seconds, the unit of `Entry::last_updated`.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
