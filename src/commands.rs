//! ManageSieve command builders
//!
//! Every builder returns the complete command line including the trailing
//! CRLF. String arguments go through [`encode_string`], which picks the
//! quoted-string form when possible and the literal-c2s form otherwise.

/// Whether `s` can be sent as an RFC 5804 quoted-string
///
/// Quoted strings carry 7-bit bytes except NUL, CR and LF. Anything else,
/// including UTF-8, goes as a literal.
fn is_quotable(s: &str) -> bool {
    s.bytes()
        .all(|b| matches!(b, 0x01..=0x09 | 0x0B..=0x0C | 0x0E..=0x7F))
}

/// Encode a string argument as quoted-string or literal-c2s
///
/// Quoted strings escape `\` and `"` with a backslash. Literals use the
/// non-synchronizing form `{len+}\r\n<bytes>`.
pub fn encode_string(s: &str) -> String {
    if is_quotable(s) {
        let mut quoted = String::with_capacity(s.len() + 2);
        quoted.push('"');
        for c in s.chars() {
            if c == '\\' || c == '"' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    } else {
        literal(s)
    }
}

/// Encode data as a non-synchronizing literal `{len+}\r\n<data>`
pub fn literal(data: &str) -> String {
    format!("{{{}+}}\r\n{}", data.len(), data)
}

/// Build CAPABILITY command
pub fn capability() -> &'static str {
    "CAPABILITY\r\n"
}

/// Build STARTTLS command (RFC 5804 §2.2)
pub fn starttls() -> &'static str {
    "STARTTLS\r\n"
}

/// Build LOGOUT command
pub fn logout() -> &'static str {
    "LOGOUT\r\n"
}

/// Build LISTSCRIPTS command
pub fn listscripts() -> &'static str {
    "LISTSCRIPTS\r\n"
}

/// Build SETACTIVE command
///
/// An empty name deactivates all scripts.
pub fn setactive(name: &str) -> String {
    format!("SETACTIVE {}\r\n", encode_string(name))
}

/// Build GETSCRIPT command
pub fn getscript(name: &str) -> String {
    format!("GETSCRIPT {}\r\n", encode_string(name))
}

/// Build PUTSCRIPT command
///
/// The script body is always sent as a literal.
pub fn putscript(name: &str, content: &str) -> String {
    format!("PUTSCRIPT {} {}\r\n", encode_string(name), literal(content))
}

/// Build DELETESCRIPT command
pub fn deletescript(name: &str) -> String {
    format!("DELETESCRIPT {}\r\n", encode_string(name))
}

/// Build HAVESPACE command
pub fn havespace(name: &str, size: u64) -> String {
    format!("HAVESPACE {} {}\r\n", encode_string(name), size)
}

/// Build AUTHENTICATE command (RFC 5804 §2.1)
///
/// `initial_response` must already be base64-encoded.
pub fn authenticate(mechanism: &str, initial_response: Option<&str>) -> String {
    match initial_response {
        Some(ir) => format!(
            "AUTHENTICATE {} {}\r\n",
            encode_string(mechanism),
            encode_string(ir)
        ),
        None => format!("AUTHENTICATE {}\r\n", encode_string(mechanism)),
    }
}

/// Build a SASL continuation response, sent as a literal
///
/// `response` must already be base64-encoded; an empty response
/// acknowledges a final server step.
pub fn sasl_response(response: &str) -> String {
    format!("{}\r\n", literal(response))
}
