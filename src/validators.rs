//! Input validation and sanitization functions
//!
//! Rule labels end up in log lines and audit entries, so they are restricted
//! to a conservative ASCII subset.

/// Maximum label length in bytes
pub const MAX_LABEL_LEN: usize = 64;

/// Sanitizes a label for safe use in logs and audit entries.
///
/// Removes control characters, quotes, and shell metacharacters.
/// Limits length to 64 bytes (ASCII characters only).
///
/// # Examples
///
/// ```
/// use sdnfw::validators::sanitize_label;
///
/// let safe = sanitize_label("Normal Label");
/// assert_eq!(safe, "Normal Label");
///
/// let unsafe_label = "Test\nNewline\"Quote";
/// let safe = sanitize_label(unsafe_label);
/// assert!(!safe.contains('\n'));
/// assert!(!safe.contains('"'));
/// ```
pub fn sanitize_label(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | ':'))
        .take(MAX_LABEL_LEN)
        .collect()
}

/// Validates and sanitizes a rule label.
///
/// # Errors
///
/// Returns `Err` if:
/// - Label exceeds 64 characters
/// - Label becomes empty after sanitization (all invalid chars)
pub fn validate_label(input: &str) -> Result<String, String> {
    if input.len() > MAX_LABEL_LEN {
        return Err(format!(
            "Label too long (max {MAX_LABEL_LEN} characters)"
        ));
    }

    let sanitized = sanitize_label(input);

    if sanitized.is_empty() && !input.is_empty() {
        return Err("Label contains only invalid characters".to_string());
    }

    Ok(sanitized)
}

/// Validates a single port number.
///
/// # Errors
///
/// Returns `Err` if port is 0 (reserved).
pub fn validate_port(port: u16) -> Result<u16, String> {
    if port == 0 {
        Err("Port must be between 1 and 65535".to_string())
    } else {
        Ok(port)
    }
}

/// Validates a port range.
///
/// # Errors
///
/// Returns `Err` if:
/// - Either port is 0
/// - Start port is greater than end port
pub fn validate_port_range(start: u16, end: u16) -> Result<(u16, u16), String> {
    validate_port(start)?;
    validate_port(end)?;

    if start > end {
        Err("Start port must be less than or equal to end port".to_string())
    } else {
        Ok((start, end))
    }
}

/// Parses a port argument of the form `22` or `8000-9000`.
///
/// # Errors
///
/// Returns `Err` on non-numeric input or an invalid range.
pub fn parse_port_spec(input: &str) -> Result<(u16, u16), String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u16>()
            .map_err(|_| format!("Invalid port: {s}"))
    };

    match input.split_once('-') {
        Some((start, end)) => validate_port_range(parse(start)?, parse(end)?),
        None => {
            let port = validate_port(parse(input)?)?;
            Ok((port, port))
        }
    }
}
