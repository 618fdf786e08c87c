//! Ordered pattern tables used to classify tool results and user text.

use once_cell::sync::Lazy;
use regex::Regex;

use friction_core::model::SignalKind;

// ═══════════════════════════════════════════════════════════════════════════════
// Tool result patterns
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_RESULT_INTERRUPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Exit code 137|Request interrupted|interrupted by user").unwrap()
});
pub static RE_SIBLING_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<tool_use_error>Sibling tool call errored</tool_use_error>").unwrap()
});
pub static RE_SIBLING_TOOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"●\s+(\w+)\(").unwrap());
pub static RE_EXIT_FAILURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Exit code [1-9]").unwrap());
pub static RE_PYTHON_FAILURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Traceback \(most recent|CalledProcessError").unwrap());
pub static RE_EXIT_SUCCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Exit code 0").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// User and assistant text patterns
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_USER_INTERRUPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Request interrupted|interrupted by user").unwrap());
pub static RE_CURSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(fuck|shit|damn)\b").unwrap());
pub static RE_NEGATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(no|didn't work|still broken)\b").unwrap());
pub static RE_SUCCESS_CLAIM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(done|complete|success|✅)\b").unwrap());

/// A tool-result rule. The first rule whose matcher accepts the text wins.
pub struct ResultRule {
    pub kind: SignalKind,
    matches: fn(&str) -> bool,
}

pub static TOOL_RESULT_RULES: [ResultRule; 4] = [
    ResultRule {
        kind: SignalKind::RequestInterrupted,
        matches: is_interrupted,
    },
    ResultRule {
        kind: SignalKind::SiblingToolError,
        matches: is_sibling_error,
    },
    ResultRule {
        kind: SignalKind::ExitError,
        matches: is_failure,
    },
    ResultRule {
        kind: SignalKind::ExitSuccess,
        matches: is_success,
    },
];

fn is_interrupted(text: &str) -> bool {
    RE_RESULT_INTERRUPT.is_match(text)
}

fn is_sibling_error(text: &str) -> bool {
    RE_SIBLING_ERROR.is_match(text)
}

fn is_failure(text: &str) -> bool {
    (RE_EXIT_FAILURE.is_match(text) && !text.contains("Exit code 137"))
        || RE_PYTHON_FAILURE.is_match(text)
}

fn is_success(text: &str) -> bool {
    RE_EXIT_SUCCESS.is_match(text)
}

pub fn classify_tool_result(text: &str) -> Option<SignalKind> {
    TOOL_RESULT_RULES
        .iter()
        .find(|rule| (rule.matches)(text))
        .map(|rule| rule.kind)
}

/// Tool named in a `● Name(` prefix of a sibling error result.
pub fn sibling_tool_name(text: &str) -> String {
    RE_SIBLING_TOOL
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or_else(|| "unknown".to_string(), |m| m.as_str().to_string())
}

/// How a user-text signal renders its details.
#[derive(Debug, Clone, Copy)]
pub enum Detail {
    Fixed(&'static str),
    Prefix(usize),
}

/// A user-text rule. Unlike tool results, every matching rule fires.
pub struct UserRule {
    pub kind: SignalKind,
    pub detail: Detail,
    pub interactive_only: bool,
    matches: fn(&str) -> bool,
}

impl UserRule {
    pub fn applies(&self, text: &str, interactive: bool) -> bool {
        (interactive || !self.interactive_only) && (self.matches)(text)
    }
}

pub static USER_TEXT_RULES: [UserRule; 4] = [
    UserRule {
        kind: SignalKind::UserIntervention,
        detail: Detail::Fixed("stash"),
        interactive_only: false,
        matches: is_stash,
    },
    UserRule {
        kind: SignalKind::RequestInterrupted,
        detail: Detail::Prefix(100),
        interactive_only: false,
        matches: is_user_interrupt,
    },
    UserRule {
        kind: SignalKind::UserCurse,
        detail: Detail::Prefix(50),
        interactive_only: false,
        matches: is_curse,
    },
    UserRule {
        kind: SignalKind::UserNegation,
        detail: Detail::Prefix(50),
        interactive_only: true,
        matches: is_negation,
    },
];

fn is_stash(text: &str) -> bool {
    text.to_lowercase().contains("/stash")
}

fn is_user_interrupt(text: &str) -> bool {
    RE_USER_INTERRUPT.is_match(text)
}

fn is_curse(text: &str) -> bool {
    RE_CURSE.is_match(text)
}

fn is_negation(text: &str) -> bool {
    RE_NEGATION.is_match(text)
}

pub fn claims_success(text: &str) -> bool {
    RE_SUCCESS_CLAIM.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_rule_order() {
        assert_eq!(
            classify_tool_result("Exit code 137\nkilled"),
            Some(SignalKind::RequestInterrupted)
        );
        assert_eq!(
            classify_tool_result("[Request interrupted by user for tool use]"),
            Some(SignalKind::RequestInterrupted)
        );
        assert_eq!(
            classify_tool_result(
                "● Read(src/lib.rs)\n<tool_use_error>Sibling tool call errored</tool_use_error>"
            ),
            Some(SignalKind::SiblingToolError)
        );
        assert_eq!(
            classify_tool_result("Exit code 2\nerror: no such file"),
            Some(SignalKind::ExitError)
        );
        assert_eq!(
            classify_tool_result("Traceback (most recent call last):"),
            Some(SignalKind::ExitError)
        );
        assert_eq!(classify_tool_result("Exit code 0"), Some(SignalKind::ExitSuccess));
        assert_eq!(classify_tool_result("all good"), None);
    }

    #[test]
    fn test_sibling_tool_name() {
        assert_eq!(sibling_tool_name("● Grep(pattern)\n..."), "Grep");
        assert_eq!(sibling_tool_name("no marker"), "unknown");
    }

    #[test]
    fn test_word_bounded_matches() {
        assert!(is_curse("this damn build"));
        assert!(!is_curse("Amsterdam is nice"));
        assert!(is_negation("no, that is wrong"));
        assert!(!is_negation("nothing to add"));
        assert!(claims_success("Done! ✅"));
        assert!(claims_success("Task complete."));
        assert!(!claims_success("undone work"));
    }

    #[test]
    fn test_negation_needs_interactive_session() {
        let rule = &USER_TEXT_RULES[3];
        assert_eq!(rule.kind, SignalKind::UserNegation);
        assert!(!rule.applies("no", false));
        assert!(rule.applies("no", true));
    }
}
