use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// RFC 3339 rendering of a timestamp; falls back to an empty string if
/// formatting ever fails rather than panicking inside the engine.
pub fn format_rfc3339(timestamp: OffsetDateTime) -> String {
    timestamp.format(&Rfc3339).unwrap_or_default()
}

pub fn rfc3339_now() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

/// Current wall-clock minute for the scheduler: a `HH:MM` string to match
/// against the configured check times, and a date-qualified key so each
/// matched minute fires at most once.
///
/// Local time when the platform exposes the UTC offset, UTC otherwise; the
/// configured times are interpreted in whichever clock this resolves to.
pub fn local_minute() -> (String, String) {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let minute = format!("{:02}:{:02}", now.hour(), now.minute());
    let slot_key = format!("{} {minute}", now.date());
    (slot_key, minute)
}
