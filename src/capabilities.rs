//! ManageSieve capabilities parsing and storage (RFC 5804 Section 1.7)
//!
//! The server announces its capabilities in the greeting, after STARTTLS,
//! and in response to the CAPABILITY command. Each line is a quoted
//! capability name optionally followed by a quoted value:
//!
//! ```text
//! "IMPLEMENTATION" "Example ManageSieve v1"
//! "SASL" "PLAIN LOGIN"
//! "SIEVE" "fileinto vacation"
//! "STARTTLS"
//! OK
//! ```

/// Capabilities announced by a ManageSieve server
///
/// A snapshot is always built from scratch by [`Capabilities::parse`]; the
/// client replaces its snapshot wholesale after connecting, after STARTTLS
/// and after authentication.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Server implementation string
    pub implementation: Option<String>,
    /// Advertised SASL mechanisms
    pub sasl: Vec<String>,
    /// Supported Sieve extensions, in server order
    pub extensions: Vec<String>,
    /// Whether STARTTLS is offered
    pub starttls: bool,
    /// Protocol version (`VERSION`)
    pub version: Option<String>,
    /// Redirect limit per script execution (`MAXREDIRECTS`)
    pub max_redirects: Option<u32>,
}

impl Capabilities {
    /// Create an empty Capabilities instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse capability lines
    ///
    /// Unknown capabilities and lines that don't look like a capability
    /// (such as the trailing `OK`) are ignored.
    pub fn parse(text: &str) -> Self {
        let mut caps = Self::new();

        for line in text.lines() {
            let Some((name, value)) = parse_capability_line(line.trim_end()) else {
                continue;
            };

            match name.to_ascii_uppercase().as_str() {
                "IMPLEMENTATION" => caps.implementation = value.map(str::to_string),
                "SASL" => caps.sasl = split_words(value),
                "SIEVE" => caps.extensions = split_words(value),
                "STARTTLS" => caps.starttls = true,
                "VERSION" => caps.version = value.map(str::to_string),
                "MAXREDIRECTS" => caps.max_redirects = value.and_then(|v| v.trim().parse().ok()),
                _ => {}
            }
        }

        caps
    }

    /// Check if a Sieve extension is supported (case-insensitive)
    #[must_use]
    pub fn has_extension(&self, extension: &str) -> bool {
        let extension = extension.trim();
        self.extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Check if a SASL mechanism is advertised (case-insensitive)
    #[must_use]
    pub fn has_auth_mechanism(&self, mechanism: &str) -> bool {
        let mechanism = mechanism.trim();
        self.sasl.iter().any(|m| m.eq_ignore_ascii_case(mechanism))
    }

    /// Whether the server sends a capability response after a STARTTLS handshake
    ///
    /// RFC 5804 requires it, but Cyrus timsieved before 2.3.10 never sends
    /// one; waiting for it would block forever.
    #[must_use]
    pub fn sends_capability_after_starttls(&self) -> bool {
        const CYRUS: &str = "CYRUS TIMSIEVED V";

        let Some(implementation) = &self.implementation else {
            return true;
        };
        if implementation.len() < CYRUS.len()
            || !implementation.as_bytes()[..CYRUS.len()].eq_ignore_ascii_case(CYRUS.as_bytes())
        {
            return true;
        }

        let version: String = implementation[CYRUS.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if version.is_empty() {
            return true;
        }
        parse_version(&version) >= parse_version("2.3.10")
    }
}

/// Split `"NAME" "value"` into its parts
fn parse_capability_line(line: &str) -> Option<(&str, Option<&str>)> {
    let rest = line.strip_prefix('"')?;
    let end = rest.find('"')?;
    let name = &rest[..end];
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return None;
    }

    let tail = rest[end + 1..].trim_start();
    if tail.is_empty() {
        return Some((name, None));
    }
    let value = tail.strip_prefix('"')?.strip_suffix('"')?;
    Some((name, Some(value)))
}

fn split_words(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn parse_version(version: &str) -> Vec<u32> {
    version
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}
