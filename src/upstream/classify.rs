use serde_json::Value;

/// Vendor prefix Mercado Livre stamps on "policy agent" rejections, the
/// automated blocks applied to requests suspected of abuse/automation
/// (e.g. `PA_UNAUTHORIZED_RESULT_FROM_POLICIES`).
const POLICY_AGENT_PREFIX: &str = "PA_";

/// Outcome of classifying a non-success upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// 403 with a recognized policy-agent code: recoverable via the local
    /// catalog, never surfaced to the client as an error.
    PolicyBlocked,
    /// Anything else: passed through with the original status.
    Other,
}

/// Classify an upstream error response.
///
/// Fail-open: if the body cannot be parsed or carries no recognizable code,
/// the error is `Other` and the original response passes through unchanged.
pub fn classify_upstream_error(status: u16, body: &str) -> UpstreamErrorKind {
    if status != 403 {
        return UpstreamErrorKind::Other;
    }

    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return UpstreamErrorKind::Other;
    };

    let code = parsed["code"]
        .as_str()
        .or_else(|| parsed["error"].as_str())
        .unwrap_or_default();

    if code.starts_with(POLICY_AGENT_PREFIX) {
        UpstreamErrorKind::PolicyBlocked
    } else {
        UpstreamErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_agent_code_is_recognized() {
        let body = r#"{"code":"PA_UNAUTHORIZED_RESULT_FROM_POLICIES","message":"blocked"}"#;
        assert_eq!(
            classify_upstream_error(403, body),
            UpstreamErrorKind::PolicyBlocked
        );
    }

    #[test]
    fn policy_code_in_error_field_is_recognized() {
        assert_eq!(
            classify_upstream_error(403, r#"{"error":"PA_BLOCKED"}"#),
            UpstreamErrorKind::PolicyBlocked
        );
    }

    #[test]
    fn policy_code_on_non_403_status_is_not_a_block() {
        assert_eq!(
            classify_upstream_error(500, r#"{"code":"PA_BLOCKED"}"#),
            UpstreamErrorKind::Other
        );
    }

    #[test]
    fn unparseable_body_fails_open() {
        assert_eq!(
            classify_upstream_error(403, "<html>forbidden</html>"),
            UpstreamErrorKind::Other
        );
    }

    #[test]
    fn ordinary_403_is_not_a_block() {
        assert_eq!(
            classify_upstream_error(403, r#"{"code":"forbidden"}"#),
            UpstreamErrorKind::Other
        );
    }
}
