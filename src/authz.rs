//! API server authorization-mode resolution.

/// Default authorization mode set, in fixed order.
pub const DEFAULT_AUTHZ_MODES: &[&str] = &["Node", "RBAC"];

const ALL_AUTHZ_MODES: &[&str] = &[
    "Node",
    "RBAC",
    "Webhook",
    "ABAC",
    "AlwaysAllow",
    "AlwaysDeny",
];

/// Resolves the API server authorization-mode list.
///
/// `Node,RBAC` is the default when nothing is requested. Requested modes
/// override the default; invalid tokens are dropped with a warning, and if
/// no valid token survives the default set is used. Never fails.
pub fn resolve_authz_modes(requested: &str) -> String {
    let default = DEFAULT_AUTHZ_MODES.join(",");

    if requested.is_empty() {
        return default;
    }

    let mut modes = Vec::new();
    for token in requested.split(',') {
        if is_valid_authz_mode(token) {
            modes.push(token);
        } else {
            tracing::warn!(mode = token, "ignoring unknown kube-apiserver authorization-mode");
        }
    }

    // Only honor the request if at least one mode was valid.
    if modes.is_empty() {
        return default;
    }

    let resolved = modes.join(",");
    if resolved != default {
        tracing::warn!(
            default = %default,
            using = %resolved,
            "overriding default kube-apiserver authorization-mode"
        );
    }
    resolved
}

fn is_valid_authz_mode(mode: &str) -> bool {
    ALL_AUTHZ_MODES.contains(&mode)
}
