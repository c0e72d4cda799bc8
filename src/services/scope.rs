//! Scope vocabulary and the authority rule
//!
//! Scopes are plain strings. Any scope under the `mcp:` namespace satisfies
//! the generic `mcp` gate, while a granular requirement such as
//! `mcp:execute` is only met by that exact scope (or by `admin`/`mcp`).

/// Every scope a key may carry
pub const SCOPE_VOCABULARY: &[&str] = &[
    "read",
    "execute",
    "write",
    "admin",
    "mcp",
    "mcp:read",
    "mcp:write",
    "mcp:execute",
];

/// Scope checked when the caller does not name one
pub const DEFAULT_REQUIRED_SCOPE: &str = "mcp";

const ADMIN_SCOPE: &str = "admin";
const MCP_SCOPE: &str = "mcp";
const MCP_NAMESPACE: &str = "mcp:";

pub fn is_known_scope(scope: &str) -> bool {
    SCOPE_VOCABULARY.contains(&scope)
}

/// Scopes outside the vocabulary, in input order without duplicates
pub fn invalid_scopes(scopes: &[String]) -> Vec<String> {
    let mut invalid: Vec<String> = Vec::new();
    for scope in scopes {
        if !is_known_scope(scope) && !invalid.contains(scope) {
            invalid.push(scope.clone());
        }
    }
    invalid
}

/// Whether `scopes` authorize an operation requiring `required`
pub fn scope_grants<S: AsRef<str>>(scopes: &[S], required: &str) -> bool {
    if scopes.iter().any(|s| s.as_ref() == ADMIN_SCOPE) {
        return true;
    }
    if scopes.iter().any(|s| s.as_ref() == MCP_SCOPE) {
        return true;
    }

    scopes
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| s.starts_with(MCP_NAMESPACE))
        .any(|s| required == MCP_SCOPE || s == required)
}
