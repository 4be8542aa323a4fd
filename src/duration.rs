//! Duration parsing and display for metadata responses.

pub const LIVE: &str = "Live";
pub const UNKNOWN: &str = "N/A";

/// Parses an ISO-8601 duration such as `PT1H2M3S` or `P1DT30M` into seconds.
/// Fractional seconds are truncated. Year/month/week designators are rejected
/// because their length in seconds is not fixed.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut seconds: u64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for character in rest.chars() {
        match character {
            '0'..='9' | '.' | ',' => number.push(character),
            'T' if !in_time && number.is_empty() => in_time = true,
            designator => {
                let whole = number
                    .split(['.', ','])
                    .next()
                    .filter(|digits| !digits.is_empty())?
                    .parse::<u64>()
                    .ok()?;
                let unit = match (in_time, designator) {
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return None,
                };
                seconds = seconds.checked_add(whole.checked_mul(unit)?)?;
                number.clear();
                saw_component = true;
            }
        }
    }

    if !number.is_empty() || !saw_component {
        return None;
    }

    Some(seconds)
}

/// Formats seconds as zero-padded `HH:MM:SS`. Hours keep growing past 24.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Display value of the `duration` field.
pub fn display_duration(seconds: Option<u64>, is_live: bool) -> String {
    if is_live {
        return LIVE.to_string();
    }

    seconds.map(format_hms).unwrap_or_else(|| UNKNOWN.to_string())
}
