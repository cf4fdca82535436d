/// Result of classifying one inbound SMS body by an ordered match: opt-out
/// tokens, then consent, then decline, then a leading run of digits, else
/// unrecognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    OptOut,
    Consent,
    Decline,
    Digit(u32),
    Unrecognized,
}

const OPT_OUT_TOKENS: &[&str] = &["STOP", "STOPALL", "UNSUBSCRIBE", "CANCEL", "END", "QUIT"];
const CONSENT_TOKENS: &[&str] = &["YES", "Y"];
const DECLINE_TOKENS: &[&str] = &["NO", "N"];

/// Normalize (trim, uppercase, strip punctuation) then classify.
pub fn parse_inbound(body: &str) -> ParsedReply {
    let normalized = normalize(body);

    if OPT_OUT_TOKENS.contains(&normalized.as_str()) {
        return ParsedReply::OptOut;
    }
    if CONSENT_TOKENS.contains(&normalized.as_str()) {
        return ParsedReply::Consent;
    }
    if DECLINE_TOKENS.contains(&normalized.as_str()) {
        return ParsedReply::Decline;
    }

    let digits: String = normalized.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        if let Ok(n) = digits.parse::<u32>() {
            return ParsedReply::Digit(n);
        }
    }
    // A leading run of digits that isn't at the very start still counts as
    // "a run of digits"; scan for the first digit run anywhere.
    let mut chars = normalized.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            let mut run = String::from(c);
            while let Some(&next) = chars.peek() {
                if next.is_ascii_digit() {
                    run.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if let Ok(n) = run.parse::<u32>() {
                return ParsedReply::Digit(n);
            }
        }
    }

    ParsedReply::Unrecognized
}

fn normalize(body: &str) -> String {
    body.trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}
