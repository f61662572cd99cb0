use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Parses a timestamp cell, trying the layouts metrics exporters commonly
/// write. Values without an offset are taken as UTC; a bare time of day is
/// placed on `reference`.
pub fn parse_timestamp(raw: &str, reference: Date) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }

    let with_offset = [
        format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]] [offset_hour sign:mandatory][offset_minute]"
        ),
        format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]] [offset_hour sign:mandatory]:[offset_minute]"
        ),
        format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ];
    for fmt in with_offset {
        if let Ok(ts) = OffsetDateTime::parse(raw, fmt) {
            return Some(ts);
        }
    }

    let naive = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"),
        format_description!("[year]/[month]/[day] [hour]:[minute]:[second][optional [.[subsecond]]]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    ];
    for fmt in naive {
        if let Ok(dt) = PrimitiveDateTime::parse(raw, fmt) {
            return Some(dt.assume_utc());
        }
    }

    if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        return Some(date.midnight().assume_utc());
    }

    if let Ok(clock) = Time::parse(
        raw,
        format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]"),
    ) {
        return Some(PrimitiveDateTime::new(reference, clock).assume_utc());
    }

    None
}

/// Position of a timestamp on a chart axis: fractional seconds since the epoch.
pub fn axis_seconds(ts: OffsetDateTime) -> f64 {
    ts.unix_timestamp_nanos() as f64 / 1e9
}

/// `HH:MM:SS` label for an axis position, shown in `offset`.
pub fn clock_label(seconds: f64, offset: UtcOffset) -> String {
    if !seconds.is_finite() {
        return String::new();
    }
    OffsetDateTime::from_unix_timestamp(seconds.floor() as i64)
        .ok()
        .and_then(|ts| {
            ts.to_offset(offset)
                .format(format_description!("[hour]:[minute]:[second]"))
                .ok()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, offset};

    const REF: Date = date!(2024-01-15);

    #[test]
    fn parses_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-05-01T12:30:00+02:00", REF).unwrap();
        assert_eq!(ts, datetime!(2024-05-01 12:30:00 +02:00));
        assert_eq!(ts.offset(), offset!(+02:00));
    }

    #[test]
    fn parses_go_style_offset() {
        let ts = parse_timestamp("2024-05-01 12:30:00.250 -0700", REF).unwrap();
        assert_eq!(ts, datetime!(2024-05-01 12:30:00.250 -07:00));
    }

    #[test]
    fn naive_values_are_utc() {
        let ts = parse_timestamp("2024-05-01 08:00:01", REF).unwrap();
        assert_eq!(ts, datetime!(2024-05-01 08:00:01 UTC));
        let ts = parse_timestamp("2024/05/01 08:00:01.5", REF).unwrap();
        assert_eq!(ts, datetime!(2024-05-01 08:00:01.5 UTC));
        let ts = parse_timestamp("2024-05-01T08:00", REF).unwrap();
        assert_eq!(ts, datetime!(2024-05-01 08:00:00 UTC));
    }

    #[test]
    fn date_and_clock_only() {
        assert_eq!(
            parse_timestamp("2024-05-01", REF),
            Some(datetime!(2024-05-01 00:00:00 UTC))
        );
        assert_eq!(
            parse_timestamp("00:01:00", REF),
            Some(datetime!(2024-01-15 00:01:00 UTC))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("", REF), None);
        assert_eq!(parse_timestamp("yesterday", REF), None);
        assert_eq!(parse_timestamp("2024-13-01 00:00:00", REF), None);
    }

    #[test]
    fn clock_label_uses_offset() {
        let secs = axis_seconds(datetime!(2024-05-01 10:15:30 UTC));
        assert_eq!(clock_label(secs, UtcOffset::UTC), "10:15:30");
        assert_eq!(clock_label(secs, offset!(+02:00)), "12:15:30");
        assert_eq!(clock_label(f64::NAN, UtcOffset::UTC), "");
    }
}
