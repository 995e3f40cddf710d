//! ManageSieve response types and line classification

/// Completed server response
///
/// `body` holds everything the server sent before the tagged completion:
/// accumulated data lines (CRLF-separated) or the payload of a literal
/// string. `status` is the completion line itself (`OK ...`). `literal` is
/// set when `body` is a literal payload, which is kept byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SieveResponse {
    /// Data lines or literal payload preceding the completion
    pub body: String,
    /// Tagged completion line (`OK` plus optional response code and text)
    pub status: String,
    /// Whether `body` came from a literal string
    pub literal: bool,
}

impl SieveResponse {
    /// Response body followed by the completion line, trailing whitespace removed
    pub fn text(&self) -> String {
        let mut text = self.body.clone();
        text.push_str(&self.status);
        text.trim_end().to_string()
    }
}

/// Error sub-codes carried by [`crate::SieveError::Protocol`]
pub mod codes {
    /// STARTTLS accepted but the TLS handshake failed
    pub const TLS_FAILED: u16 = 2;
    /// Server answered with a tagged `NO`
    pub const NO_RESPONSE: u16 = 3;
    /// Reading from the server failed
    pub const READ_FAILED: u16 = 5;
    /// Server closed the session with `BYE` (no referral)
    pub const BYE: u16 = 6;
}

/// One line received from the server, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    /// `OK` completion; `literal` is the length of a trailing `{n}` marker
    Ok { text: String, literal: Option<usize> },
    /// `NO` completion; `literal` is the length of a trailing `{n}` marker
    No { text: String, literal: Option<usize> },
    /// `BYE`, possibly carrying a referral
    Bye(String),
    /// Line starting with a literal marker `{n}`
    Literal(usize),
    /// Anything else: capability lines, script listings, SASL challenges
    Data(String),
}

impl Line {
    pub(crate) fn parse(line: &str) -> Self {
        if starts_with_keyword(line, "OK") {
            let (text, literal) = split_trailing_literal(line);
            return Line::Ok { text, literal };
        }
        if starts_with_keyword(line, "NO") {
            let (text, literal) = split_trailing_literal(line);
            return Line::No { text, literal };
        }
        if starts_with_keyword(line, "BYE") {
            return Line::Bye(line.to_string());
        }
        if let Some((len, _)) = parse_literal_marker(line) {
            return Line::Literal(len);
        }
        Line::Data(line.to_string())
    }
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// `keyword` at the start of `line`, followed by the end of the line, a
/// space or a response code
fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    starts_with_ignore_case(line, keyword)
        && matches!(line.as_bytes().get(keyword.len()), None | Some(b' ' | b'(' | b'{'))
}

/// Parse a literal marker `{n}` or `{n+}` at the start of `s`
///
/// Returns the announced length and the number of bytes the marker occupies.
pub(crate) fn parse_literal_marker(s: &str) -> Option<(usize, usize)> {
    let rest = s.strip_prefix('{')?;
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    // Lengths too large for usize saturate and are rejected by the reader
    let len = rest[..digits].parse().unwrap_or(usize::MAX);
    let mut consumed = 1 + digits;
    let mut tail = &rest[digits..];
    if let Some(t) = tail.strip_prefix('+') {
        tail = t;
        consumed += 1;
    }
    tail.strip_prefix('}')?;
    Some((len, consumed + 1))
}

/// Split a trailing `{n}` marker off a tagged completion line
///
/// Some servers append a `+` to the marker even though literals sent by a
/// server are always synchronizing; `{n+}` is accepted as well.
fn split_trailing_literal(line: &str) -> (String, Option<usize>) {
    if line.ends_with('}') {
        if let Some(open) = line.rfind('{') {
            if let Some((len, consumed)) = parse_literal_marker(&line[open..]) {
                if open + consumed == line.len() {
                    return (line[..open].to_string(), Some(len));
                }
            }
        }
    }
    (line.to_string(), None)
}

/// Extract the referral host from a `BYE (REFERRAL "sieve://host")` line
///
/// Returns the authority part of the URL (host and optional port), without
/// the `sieve://` scheme or any path.
pub(crate) fn parse_referral(line: &str) -> Option<String> {
    const PREFIX: &str = "bye (referral \"";
    if !starts_with_ignore_case(line, PREFIX) {
        return None;
    }
    let url = &line[PREFIX.len()..];
    let url = url.split('"').next()?;
    let url = if starts_with_ignore_case(url, "sieve://") {
        &url["sieve://".len()..]
    } else {
        url
    };
    let authority = url.split('/').next()?;
    if authority.is_empty() {
        None
    } else {
        Some(authority.to_string())
    }
}

/// Split a referral authority into host and optional port
pub(crate) fn split_authority(authority: &str) -> (&str, Option<u16>) {
    if let Some(rest) = authority.strip_prefix('[') {
        // IPv6 literal: [::1]:4190
        if let Some(end) = rest.find(']') {
            let host = &rest[..end];
            let port = rest[end + 1..]
                .strip_prefix(':')
                .and_then(|p| p.parse().ok());
            return (host, port);
        }
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (authority, None),
        },
        _ => (authority, None),
    }
}

/// Replace the host part of `current`, preserving a `scheme://` prefix
pub(crate) fn replace_host(current: &str, new_host: &str) -> String {
    match current.find("://") {
        Some(pos) => format!("{}{}", &current[..pos + 3], new_host),
        None => new_host.to_string(),
    }
}

/// Remove one level of backslash escaping from a quoted-string body
pub(crate) fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Scripts stored on the server, as reported by LISTSCRIPTS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptList {
    /// All script names, in server order
    pub names: Vec<String>,
    /// Name of the active script, if any
    pub active: Option<String>,
}

impl ScriptList {
    /// Parse LISTSCRIPTS output
    ///
    /// Each line is `"name"` optionally followed by ` ACTIVE`. Lines that
    /// don't match (the completion line, blank lines) are skipped.
    pub fn parse(text: &str) -> Self {
        let mut list = ScriptList::default();

        for line in text.split("\r\n").flat_map(|l| l.split('\n')) {
            let line = line.trim_end();
            let Some(rest) = line.strip_prefix('"') else {
                continue;
            };

            let (quoted, active) = match rest.len().checked_sub(" ACTIVE".len()) {
                Some(cut)
                    if rest.is_char_boundary(cut)
                        && rest[cut..].eq_ignore_ascii_case(" ACTIVE") =>
                {
                    (&rest[..cut], true)
                }
                _ => (rest, false),
            };
            let Some(name) = quoted.strip_suffix('"') else {
                continue;
            };

            let name = unescape(name);
            if active {
                list.active = Some(name.clone());
            }
            list.names.push(name);
        }

        list
    }

    /// Whether a script with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}
