// Wildcard Index - reverse-label suffix trie with atomic snapshot swap
//
// Patterns are stored with the leading "*." stripped; labels are keyed in
// reverse order (TLD at the root). A terminal node matches any host that
// descends to it with at least one label to spare, so the apex itself is
// never a match.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// A wildcard pattern in canonical form (suffix without the leading `*.`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    pub suffix: String,
    /// Identifier of the source API the pattern came from
    pub source: String,
    /// Free-form program label supplied by the source
    pub program: String,
}

impl WildcardPattern {
    pub fn new(suffix: impl Into<String>, source: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            source: source.into(),
            program: program.into(),
        }
    }

    /// Display form with the wildcard prefix restored
    pub fn display(&self) -> String {
        format!("*.{}", self.suffix)
    }
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    terminal: Option<usize>,
}

/// Immutable suffix trie over a pattern set
///
/// Built once per refresh and published wholesale; readers never observe a
/// partially built tree.
#[derive(Debug, Default)]
pub struct WildcardTrie {
    root: TrieNode,
    patterns: Vec<WildcardPattern>,
}

impl WildcardTrie {
    /// Build a trie from a pattern set, deduplicating on suffix
    pub fn build(patterns: Vec<WildcardPattern>) -> Self {
        let mut trie = WildcardTrie::default();

        for pattern in patterns {
            if pattern.suffix.is_empty() {
                continue;
            }

            let mut node = &mut trie.root;
            for label in pattern.suffix.rsplit('.') {
                node = node.children.entry(label.to_string()).or_default();
            }

            // First source wins on duplicate suffixes
            if node.terminal.is_none() {
                node.terminal = Some(trie.patterns.len());
                trie.patterns.push(pattern);
            }
        }

        trie
    }

    /// Longest-suffix match over the reverse-label walk
    ///
    /// `host` must be lowercase, without trailing dot and without a leading
    /// `*.`. Returns the most specific terminal pattern provided the input
    /// has at least one label beyond it; exact equality with a suffix is
    /// not a match.
    pub fn match_host(&self, host: &str) -> Option<&WildcardPattern> {
        if host.is_empty() {
            return None;
        }

        let mut node = &self.root;
        let mut best: Option<usize> = None;
        let mut labels_consumed = 0usize;
        let total_labels = host.split('.').count();

        for label in host.rsplit('.') {
            match node.children.get(label) {
                Some(child) => {
                    labels_consumed += 1;
                    node = child;
                    if let Some(id) = node.terminal {
                        // Terminal only counts when the input extends past it
                        if total_labels > labels_consumed {
                            best = Some(id);
                        }
                    }
                }
                None => break,
            }
        }

        best.map(|id| &self.patterns[id])
    }

    /// Number of distinct patterns in the trie
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// All patterns, in insertion order
    pub fn patterns(&self) -> &[WildcardPattern] {
        &self.patterns
    }
}

/// Shared handle over the current trie
///
/// The refresher is the single writer; readers grab a snapshot and keep
/// using it even across a concurrent swap.
pub struct WildcardIndex {
    current: ArcSwap<WildcardTrie>,
}

impl WildcardIndex {
    /// Create an index with an empty trie
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(WildcardTrie::default()),
        }
    }

    /// Atomically replace the trie
    pub fn swap(&self, trie: WildcardTrie) {
        self.current.store(Arc::new(trie));
    }

    /// Snapshot of the current trie
    pub fn snapshot(&self) -> Arc<WildcardTrie> {
        self.current.load_full()
    }

    /// Match against the current trie, cloning the hit out of the snapshot
    pub fn match_host(&self, host: &str) -> Option<WildcardPattern> {
        self.current.load().match_host(host).cloned()
    }

    /// Number of patterns currently indexed
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

impl Default for WildcardIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(suffix: &str) -> WildcardPattern {
        WildcardPattern::new(suffix, "test", "test-program")
    }

    fn build(suffixes: &[&str]) -> WildcardTrie {
        WildcardTrie::build(suffixes.iter().map(|s| pattern(s)).collect())
    }

    #[test]
    fn test_subdomain_matches() {
        let trie = build(&["example.com"]);

        let hit = trie.match_host("api.example.com").unwrap();
        assert_eq!(hit.suffix, "example.com");

        let deep = trie.match_host("a.b.c.example.com").unwrap();
        assert_eq!(deep.suffix, "example.com");
    }

    #[test]
    fn test_apex_is_not_a_match() {
        let trie = build(&["example.com"]);
        assert!(trie.match_host("example.com").is_none());
    }

    #[test]
    fn test_miss() {
        let trie = build(&["example.com"]);
        assert!(trie.match_host("api.example.org").is_none());
        assert!(trie.match_host("notexample.com").is_none());
        assert!(trie.match_host("com").is_none());
    }

    #[test]
    fn test_empty_input() {
        let trie = build(&["example.com"]);
        assert!(trie.match_host("").is_none());
    }

    #[test]
    fn test_most_specific_wins() {
        let trie = build(&["example.com", "dev.example.com"]);

        let hit = trie.match_host("x.dev.example.com").unwrap();
        assert_eq!(hit.suffix, "dev.example.com");

        // dev.example.com itself is the apex of the longer pattern but a
        // strict sub-domain of the shorter one
        let hit = trie.match_host("dev.example.com").unwrap();
        assert_eq!(hit.suffix, "example.com");
    }

    #[test]
    fn test_duplicate_suffix_first_wins() {
        let trie = WildcardTrie::build(vec![
            WildcardPattern::new("example.com", "alpha", "first"),
            WildcardPattern::new("example.com", "beta", "second"),
        ]);

        assert_eq!(trie.len(), 1);
        let hit = trie.match_host("api.example.com").unwrap();
        assert_eq!(hit.program, "first");
    }

    #[test]
    fn test_empty_suffix_skipped() {
        let trie = WildcardTrie::build(vec![pattern("")]);
        assert!(trie.is_empty());
    }

    #[test]
    fn test_index_swap_replaces_matches() {
        let index = WildcardIndex::new();
        assert!(index.match_host("api.example.com").is_none());

        index.swap(build(&["example.com"]));
        assert!(index.match_host("api.example.com").is_some());
        assert_eq!(index.len(), 1);

        index.swap(build(&["example.org"]));
        assert!(index.match_host("api.example.com").is_none());
        assert!(index.match_host("api.example.org").is_some());
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let index = WildcardIndex::new();
        index.swap(build(&["example.com"]));

        let snapshot = index.snapshot();
        index.swap(build(&["example.org"]));

        // The old snapshot still answers with the old pattern set
        assert!(snapshot.match_host("api.example.com").is_some());
        assert!(index.match_host("api.example.com").is_none());
    }

    #[test]
    fn test_pattern_display() {
        assert_eq!(pattern("example.com").display(), "*.example.com");
    }
}
