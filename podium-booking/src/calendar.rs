use chrono::{DateTime, Utc};
use ulid::Ulid;

pub const INVITE_FILENAME: &str = "event.ics";
pub const INVITE_CONTENT_TYPE: &str = "text/calendar; method=REQUEST";

fn ics_timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escapes TEXT values per RFC 5545 section 3.3.11.
fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Single-event iCalendar invite with a 30 minute reminder. Lines end in CRLF.
pub fn build_invite(
    slot_id: Ulid,
    summary: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    stamped_at: DateTime<Utc>,
) -> String {
    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Podium//Booking//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:REQUEST".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@podium", slot_id),
        format!("DTSTAMP:{}", ics_timestamp(&stamped_at)),
        format!("SUMMARY:{}", escape_text(summary)),
        format!("DTSTART:{}", ics_timestamp(&start)),
        format!("DTEND:{}", ics_timestamp(&end)),
        "STATUS:CONFIRMED".to_string(),
        "SEQUENCE:0".to_string(),
        "BEGIN:VALARM".to_string(),
        "TRIGGER:-PT30M".to_string(),
        "DESCRIPTION:Event Reminder".to_string(),
        "ACTION:DISPLAY".to_string(),
        "END:VALARM".to_string(),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    let mut ics = lines.join("\r\n");
    ics.push_str("\r\n");
    ics
}
