// Frame parsing - extracts domain lists from certstream text frames
//
// Two server variants are accepted:
//   {"data": ["host1", "host2", ...]}
//   {"data": {"leaf_cert": {"all_domains": ["host1", ...]}}}
// Anything else is a parse error the caller logs and skips.

use crate::error::PipelineError;
use crate::Result;
use serde_json::Value;

/// Extract the domain list from one certstream frame
pub fn parse_domains(text: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(text)?;

    let data = value.get("data").ok_or_else(|| PipelineError::ParseError {
        message: "frame has no 'data' key".to_string(),
    })?;

    // Domains-only variant
    if let Some(list) = data.as_array() {
        return Ok(collect_strings(list));
    }

    // Full variant
    if let Some(list) = data
        .pointer("/leaf_cert/all_domains")
        .and_then(Value::as_array)
    {
        return Ok(collect_strings(list));
    }

    Err(PipelineError::ParseError {
        message: "frame 'data' has an unknown shape".to_string(),
    })
}

fn collect_strings(list: &[Value]) -> Vec<String> {
    list.iter()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains_only_variant() {
        let frame = r#"{"data": ["a.example.com", "b.example.com"]}"#;
        let domains = parse_domains(frame).unwrap();
        assert_eq!(domains, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_full_variant() {
        let frame = r#"{
            "message_type": "certificate_update",
            "data": {
                "leaf_cert": {
                    "all_domains": ["*.example.com", "example.com"]
                },
                "seen": 1700000000.0
            }
        }"#;

        let domains = parse_domains(frame).unwrap();
        assert_eq!(domains, vec!["*.example.com", "example.com"]);
    }

    #[test]
    fn test_non_string_entries_skipped() {
        let frame = r#"{"data": ["a.example.com", 42, null]}"#;
        let domains = parse_domains(frame).unwrap();
        assert_eq!(domains, vec!["a.example.com"]);
    }

    #[test]
    fn test_empty_list() {
        let frame = r#"{"data": []}"#;
        assert!(parse_domains(frame).unwrap().is_empty());
    }

    #[test]
    fn test_missing_data_is_error() {
        assert!(parse_domains(r#"{"message_type": "heartbeat"}"#).is_err());
    }

    #[test]
    fn test_unknown_shape_is_error() {
        assert!(parse_domains(r#"{"data": {"leaf_cert": {}}}"#).is_err());
        assert!(parse_domains(r#"{"data": 42}"#).is_err());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(parse_domains("not json").is_err());
    }
}
