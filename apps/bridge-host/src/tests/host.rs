use crate::host::auth_token_from_env;

use serial_test::serial;

const TOKEN_VAR: &str = "BRIDGE_HOST_UNIT_TEST_TOKEN";

/// **VALUE**: Verifies a configured token is used as-is and an absent one is generated.
///
/// **BUG THIS CATCHES**: Would catch an empty variable producing an empty
/// secret that any client could match.
#[test]
#[serial]
fn given_env_token_when_resolving_then_configured_or_generated() {
    // GIVEN/WHEN: Variable set with surrounding whitespace
    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::set_var(TOKEN_VAR, "  secret-token  ") };
    let (configured, generated) = auth_token_from_env(TOKEN_VAR);

    // THEN: Trimmed and not generated
    assert!(!generated);
    assert_eq!(configured.expose(), "secret-token");

    // GIVEN/WHEN: Variable blank, then removed
    unsafe { std::env::set_var(TOKEN_VAR, "   ") };
    let (blank, blank_generated) = auth_token_from_env(TOKEN_VAR);
    unsafe { std::env::remove_var(TOKEN_VAR) };
    let (fresh, fresh_generated) = auth_token_from_env(TOKEN_VAR);

    // THEN: Both generated, non-empty and distinct
    assert!(blank_generated && fresh_generated);
    assert_eq!(fresh.expose().len(), 32);
    assert_ne!(blank.expose(), fresh.expose());
}
