use serde::Deserialize;

use agentgate_core_types::AccessLevel;
use delegation_store::ResourceGrant;

use crate::ScopeError;

#[derive(Debug, Deserialize)]
struct ScopePayload {
    #[serde(default)]
    resources: Vec<ScopeEntry>,
}

#[derive(Debug, Deserialize)]
struct ScopeEntry {
    id: String,
    #[serde(default = "default_access")]
    access: String,
}

fn default_access() -> String {
    "reader".to_string()
}

/// Extracts the first JSON object from free-form model output and parses it
/// into resource grants. Models wrap payloads in prose more often than not,
/// so everything outside the outermost braces is ignored.
pub fn parse_scope_payload(raw: &str) -> Result<Vec<ResourceGrant>, ScopeError> {
    let start = raw
        .find('{')
        .ok_or_else(|| ScopeError::Malformed("no JSON object in response".to_string()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| ScopeError::Malformed("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(ScopeError::Malformed(
            "unterminated JSON object".to_string(),
        ));
    }

    let payload: ScopePayload = serde_json::from_str(&raw[start..=end])
        .map_err(|err| ScopeError::Malformed(err.to_string()))?;

    let mut grants = Vec::with_capacity(payload.resources.len());
    for entry in payload.resources {
        if entry.id.is_empty() {
            return Err(ScopeError::Malformed("resource id is empty".to_string()));
        }
        let access: AccessLevel = entry
            .access
            .parse()
            .map_err(|err| ScopeError::Malformed(format!("{err}")))?;
        grants.push(ResourceGrant::new(entry.id, access));
    }
    Ok(grants)
}

/// Drops inferred grants whose resource is not covered by the caller's
/// available set. Available ids may carry a single `*` wildcard.
pub fn filter_available(requested: Vec<ResourceGrant>, available: &[String]) -> Vec<ResourceGrant> {
    requested
        .into_iter()
        .filter(|grant| {
            available
                .iter()
                .any(|pattern| id_matches(pattern, &grant.resource.0))
        })
        .collect()
}

fn id_matches(pattern: &str, id: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            let prefix = parts[0];
            let suffix = parts[1];
            return id.starts_with(prefix) && id.ends_with(suffix);
        }
    }
    id == pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_payload_wrapped_in_prose() {
        let raw = r#"Here is the minimal scope you need:
{"resources": [{"id": "doc-1", "access": "read"}, {"id": "cal-2", "access": "writer"}]}
Let me know if anything is missing."#;

        let grants = parse_scope_payload(raw).unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].resource.0, "doc-1");
        assert_eq!(grants[0].access, AccessLevel::Reader);
        assert_eq!(grants[1].access, AccessLevel::Writer);
    }

    #[test]
    fn missing_access_defaults_to_reader() {
        let grants = parse_scope_payload(r#"{"resources": [{"id": "doc-1"}]}"#).unwrap();
        assert_eq!(grants[0].access, AccessLevel::Reader);
    }

    #[test]
    fn response_without_json_is_malformed() {
        assert!(matches!(
            parse_scope_payload("I could not determine any resources."),
            Err(ScopeError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_access_level_is_malformed() {
        let raw = r#"{"resources": [{"id": "doc-1", "access": "owner"}]}"#;
        assert!(matches!(
            parse_scope_payload(raw),
            Err(ScopeError::Malformed(_))
        ));
    }

    #[test]
    fn availability_filter_honors_wildcards() {
        let requested = vec![
            ResourceGrant::new("doc-1", AccessLevel::Reader),
            ResourceGrant::new("mail-7", AccessLevel::Reader),
            ResourceGrant::new("cal-2", AccessLevel::Writer),
        ];
        let available = vec!["doc-*".to_string(), "cal-2".to_string()];

        let kept = filter_available(requested, &available);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].resource.0, "doc-1");
        assert_eq!(kept[1].resource.0, "cal-2");
    }
}
