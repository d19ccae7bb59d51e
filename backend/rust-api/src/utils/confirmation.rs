use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// The one canonical marker the prompting contract requires the
    /// assistant to emit when an exercise has been agreed on. Detection keys
    /// on this exact phrase; free-text guessing is deliberately avoided.
    static ref CONFIRMATION_MARKER: Regex =
        Regex::new(r"(?im)ejercicio confirmado:[ \t]*(.+)$").expect("confirmation marker regex");
}

/// Result of scanning one assistant reply for the confirmation marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationResult {
    pub confirmed: bool,
    pub exercise_name: Option<String>,
}

impl ConfirmationResult {
    fn not_found() -> Self {
        Self {
            confirmed: false,
            exercise_name: None,
        }
    }
}

/// Scan an assistant reply for the canonical `Ejercicio confirmado: <name>`
/// line. Only the first matching line counts; the captured name is
/// sanitized before use and an empty result is reported as not-found.
pub fn detect_confirmed_exercise(reply: &str) -> ConfirmationResult {
    if reply.is_empty() {
        return ConfirmationResult::not_found();
    }

    let Some(captures) = CONFIRMATION_MARKER.captures(reply) else {
        return ConfirmationResult::not_found();
    };

    match sanitize_name(&captures[1]) {
        Some(name) => ConfirmationResult {
            confirmed: true,
            exercise_name: Some(name),
        },
        None => ConfirmationResult::not_found(),
    }
}

/// Derive the response flags the frontend uses to drive its UI state.
///
/// An in-progress exercise may never be silently replaced, and automatic
/// system-triggered turns are never treated as a human-negotiated exercise
/// agreement, whatever the reply says.
pub fn resolve_session_flags(
    exercise_active: bool,
    automatic_prompt: bool,
    reply: &str,
) -> (bool, Option<String>) {
    if exercise_active || automatic_prompt {
        return (false, None);
    }

    let result = detect_confirmed_exercise(reply);
    (result.confirmed, result.exercise_name)
}

const QUOTE_CHARS: [char; 7] = ['\'', '"', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '`'];

fn sanitize_name(raw: &str) -> Option<String> {
    // The capture never spans lines, but carriage returns from CRLF replies
    // can leak into it.
    let first_line = raw.split(['\r', '\n']).next().unwrap_or("");

    let mut name = first_line.trim();
    name = name.trim_end_matches(['.', '?', '!']);
    name = name.strip_prefix(QUOTE_CHARS).unwrap_or(name);
    name = name.strip_suffix(QUOTE_CHARS).unwrap_or(name);
    let name = name.trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
