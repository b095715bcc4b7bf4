// Wildcard extraction - walks arbitrary source JSON for "*.suffix" values

use serde_json::Value;

/// A wildcard value pulled out of a source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedWildcard {
    /// Suffix with the `*.` prefix stripped, lowercased
    pub suffix: String,
    /// Program label from the nearest enclosing object, when present
    pub program: Option<String>,
}

/// Collect every string value of the form `*.suffix` from a JSON document
///
/// The walk is shape-agnostic: sources disagree wildly on their envelope,
/// so any string anywhere in the tree counts. Values are folded to
/// lowercase and returned with the `*.` prefix stripped; anything not
/// starting with `*.` is ignored. When an enclosing object carries a
/// string field named `program` or `name`, it becomes the program label
/// for everything beneath it.
pub fn extract_wildcards(document: &Value) -> Vec<ExtractedWildcard> {
    let mut out = Vec::new();
    walk(document, None, &mut out);
    out
}

fn walk(value: &Value, program: Option<&str>, out: &mut Vec<ExtractedWildcard>) {
    match value {
        Value::String(s) => {
            if let Some(suffix) = s.strip_prefix("*.") {
                let suffix = suffix.trim().trim_end_matches('.').to_lowercase();
                if !suffix.is_empty() {
                    out.push(ExtractedWildcard {
                        suffix,
                        program: program.map(String::from),
                    });
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, program, out);
            }
        }
        Value::Object(map) => {
            let label = map
                .get("program")
                .or_else(|| map.get("name"))
                .and_then(Value::as_str)
                .or(program);

            for item in map.values() {
                walk(item, label, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn suffixes(doc: &Value) -> Vec<String> {
        extract_wildcards(doc).into_iter().map(|w| w.suffix).collect()
    }

    #[test]
    fn test_flat_array() {
        let doc = json!(["*.example.com", "*.example.org", "plain.example.net"]);
        assert_eq!(suffixes(&doc), vec!["example.com", "example.org"]);
    }

    #[test]
    fn test_nested_object_with_program_labels() {
        let doc = json!({
            "programs": [
                { "name": "acme", "scopes": ["*.acme.io", "api.acme.io"] },
                { "program": "globex", "scopes": { "web": "*.globex.com" } }
            ]
        });

        let wildcards = extract_wildcards(&doc);
        assert_eq!(wildcards.len(), 2);
        assert_eq!(wildcards[0].suffix, "acme.io");
        assert_eq!(wildcards[0].program.as_deref(), Some("acme"));
        assert_eq!(wildcards[1].suffix, "globex.com");
        assert_eq!(wildcards[1].program.as_deref(), Some("globex"));
    }

    #[test]
    fn test_case_folding_and_trailing_dot() {
        let doc = json!(["*.EXAMPLE.Com", "*.example.net."]);
        assert_eq!(suffixes(&doc), vec!["example.com", "example.net"]);
    }

    #[test]
    fn test_non_wildcards_ignored() {
        let doc = json!({
            "values": ["example.com", "www.example.com", 42, true, null, "*."]
        });

        assert!(extract_wildcards(&doc).is_empty());
    }

    #[test]
    fn test_program_missing_is_none() {
        let doc = json!({ "scopes": ["*.example.com"] });
        let wildcards = extract_wildcards(&doc);
        assert_eq!(wildcards[0].program, None);
    }
}
