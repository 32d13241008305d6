use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// RFC 3339 with whole seconds, e.g. `2024-05-01T12:00:00Z`.
pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.replace_nanosecond(0)
        .unwrap_or(ts)
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// RFC 3339 keeping the sub-second part, e.g. `2024-05-01T12:00:00.123456789Z`.
pub fn format_rfc3339_nanos(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

pub fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_formats() {
        let ts = datetime!(2024-05-01 12:00:00.5 UTC);
        assert_eq!(format_rfc3339(ts), "2024-05-01T12:00:00Z");
        assert_eq!(format_rfc3339_nanos(ts), "2024-05-01T12:00:00.5Z");
    }
}
