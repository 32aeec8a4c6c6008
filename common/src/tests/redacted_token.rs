use crate::RedactedToken;

/// **VALUE**: Verifies that the token never leaks through Debug or Display.
///
/// **WHY THIS MATTERS**: The channel token is logged alongside connection events.
/// A leaked token lets any local process impersonate the document.
#[test]
fn given_token_when_formatted_then_value_is_redacted() {
    // GIVEN: A token
    let token = RedactedToken::new("super-secret-token");

    // WHEN: Formatting with Debug and Display
    let debug = format!("{:?}", token);
    let display = format!("{}", token);

    // THEN: Neither contains the secret
    assert!(!debug.contains("super-secret-token"));
    assert!(!display.contains("super-secret-token"));
    assert_eq!(token.len(), "super-secret-token".len());
}

/// **VALUE**: Verifies that serialization is refused.
///
/// **BUG THIS CATCHES**: Would catch if someone derives Serialize on the token.
#[test]
fn given_token_when_serialized_then_returns_error() {
    let token = RedactedToken::new("abc");

    let result = serde_json::to_string(&token);

    assert!(result.is_err(), "Token serialization must fail");
}

/// **VALUE**: Verifies token comparison accepts only the exact value.
#[test]
fn given_token_when_matching_candidates_then_only_exact_value_matches() {
    let token = RedactedToken::new("abc123");

    assert!(token.matches("abc123"));
    assert!(!token.matches("abc124"));
    assert!(!token.matches("abc"));
    assert!(!token.matches(""));
}
