//! RFC 5804 Section 2 - Command Encoding Tests
//!
//! Reference: https://datatracker.ietf.org/doc/html/rfc5804#section-2
//!
//! Strings are sent as quoted strings when they are plain ASCII and as
//! non-synchronizing literals (`{n+}`) otherwise. Script bodies are always
//! literals.

use managesieve_rs::commands;

#[test]
fn test_commands_end_with_crlf() {
    let cmds = [
        commands::capability().to_string(),
        commands::starttls().to_string(),
        commands::logout().to_string(),
        commands::listscripts().to_string(),
        commands::setactive("a"),
        commands::getscript("a"),
        commands::deletescript("a"),
        commands::havespace("a", 1),
        commands::putscript("a", "keep;"),
        commands::authenticate("PLAIN", Some("AA==")),
    ];
    for cmd in cmds {
        assert!(cmd.ends_with("\r\n"), "{:?} lacks CRLF", cmd);
    }
}

#[test]
fn test_quoted_string_escapes_backslash_and_quote() {
    assert_eq!(
        commands::getscript("my \"best\" \\ script"),
        "GETSCRIPT \"my \\\"best\\\" \\\\ script\"\r\n"
    );
}

#[test]
fn test_utf8_name_is_sent_as_literal() {
    let name = "Urlaub-Grüße";
    assert_eq!(
        commands::setactive(name),
        format!("SETACTIVE {{{}+}}\r\n{}\r\n", name.len(), name)
    );
}

#[test]
fn test_literal_length_is_in_bytes() {
    assert_eq!(commands::literal("€"), "{3+}\r\n€");
}

#[test]
fn test_putscript_body_is_always_literal() {
    assert_eq!(
        commands::putscript("a", "keep;"),
        "PUTSCRIPT \"a\" {5+}\r\nkeep;\r\n"
    );
}

#[test]
fn test_setactive_empty_name_deactivates() {
    assert_eq!(commands::setactive(""), "SETACTIVE \"\"\r\n");
}

#[test]
fn test_havespace_size_is_a_number() {
    assert_eq!(
        commands::havespace("big", 10_485_760),
        "HAVESPACE \"big\" 10485760\r\n"
    );
}

#[test]
fn test_encode_string_control_characters() {
    // CR and LF can't appear in quoted strings
    assert!(commands::encode_string("a\nb").starts_with("{3+}\r\n"));
    assert!(commands::encode_string("a\rb").starts_with("{3+}\r\n"));
    // Tab can
    assert_eq!(commands::encode_string("a\tb"), "\"a\tb\"");
}
