// Pipeline Job - per-name state carried through the validation stages

use crate::wildcards::WildcardPattern;
use std::net::IpAddr;

/// Stage a job has reached, for logging and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Received,
    Matched,
    Admitted,
    Resolved,
    Probed,
    Done,
}

/// State for one certificate name moving through the pipeline
#[derive(Debug, Clone)]
pub struct PipelineJob {
    /// Name exactly as it arrived on the stream
    pub raw_name: String,
    /// Normalized form: lowercase, no trailing dot, no leading `*.`
    pub cleaned_name: String,
    pub matched: Option<WildcardPattern>,
    pub ips: Vec<IpAddr>,
    pub probe_urls: Vec<String>,
    pub stage: JobStage,
}

impl PipelineJob {
    pub fn new(raw_name: impl Into<String>) -> Self {
        let raw_name = raw_name.into();
        let cleaned_name = normalize_name(&raw_name);

        Self {
            raw_name,
            cleaned_name,
            matched: None,
            ips: Vec::new(),
            probe_urls: Vec::new(),
            stage: JobStage::Received,
        }
    }

    /// Whether the name arrived as a wildcard (`*.foo`)
    pub fn was_wildcard(&self) -> bool {
        self.raw_name.starts_with("*.")
    }

    /// Program label of the matched pattern, when there is one
    pub fn program(&self) -> Option<&str> {
        self.matched.as_ref().map(|m| m.program.as_str())
    }
}

/// Canonicalize a certificate name
///
/// Lowercases, strips one trailing dot and one leading `*.`. Idempotent.
pub fn normalize_name(raw: &str) -> String {
    let name = raw.trim().to_lowercase();
    let name = name.strip_suffix('.').unwrap_or(&name);
    let name = name.strip_prefix("*.").unwrap_or(name);
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize_name("API.Example.COM"), "api.example.com");
    }

    #[test]
    fn test_normalize_strips_trailing_dot() {
        assert_eq!(normalize_name("api.example.com."), "api.example.com");
    }

    #[test]
    fn test_normalize_strips_wildcard_prefix() {
        assert_eq!(normalize_name("*.example.com"), "example.com");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = ["*.Example.COM.", "api.example.com", "  x.y.  "];
        for input in inputs {
            let once = normalize_name(input);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn test_job_tracks_wildcard_origin() {
        assert!(PipelineJob::new("*.example.com").was_wildcard());
        assert!(!PipelineJob::new("api.example.com").was_wildcard());
    }

    #[test]
    fn test_job_initial_state() {
        let job = PipelineJob::new("*.Example.com");
        assert_eq!(job.cleaned_name, "example.com");
        assert_eq!(job.stage, JobStage::Received);
        assert!(job.matched.is_none());
        assert!(job.ips.is_empty());
    }
}
