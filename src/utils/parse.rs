use chrono::NaiveDateTime;

/// Parses a numeric cell that may use a decimal comma.
/// Empty cells and placeholder values yield `None`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("na") {
        return None;
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}

/// Parses a day-first timestamp, the format the CTD campaign exports use.
/// Tries the common variants in order; `None` on garbage.
pub fn parse_dayfirst_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    const FORMATS: [&str; 4] = [
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d-%m-%Y %H:%M:%S",
        "%d-%m-%Y %H:%M",
    ];

    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }

    // Date-only cells fall back to midnight.
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
        return date.and_hms_opt(0, 0, 0);
    }

    None
}

/// Decodes Latin-1 bytes into a String. Latin-1 maps byte values 1:1 onto
/// the first 256 Unicode code points, so the conversion is total.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
