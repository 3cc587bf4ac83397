use std::time::{Duration, Instant};

use tracing::debug;

/// A tool invocation seen on the side channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub args: serde_json::Value,
    /// Filled in when the matching `tool_result` arrives.
    pub result: Option<serde_json::Value>,
}

/// One output text shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionEntry {
    pub text: String,
    pub conversation_id: Option<String>,
    pub title: Option<String>,
    pub links: Vec<String>,
    pub at: Instant,
}

impl CompletionEntry {
    pub fn new(text: impl Into<String>, at: Instant) -> Self {
        Self {
            text: text.into(),
            conversation_id: None,
            title: None,
            links: Vec::new(),
            at,
        }
    }
}

/// Everything streamed alongside the state transitions of one execution.
#[derive(Debug, Clone)]
pub struct Transcript {
    text: String,
    thinking: String,
    tool_calls: Vec<ToolCallRecord>,
    completions: Vec<CompletionEntry>,
    dedupe_window: Duration,
}

impl Transcript {
    pub fn new(dedupe_window: Duration) -> Self {
        Self {
            text: String::new(),
            thinking: String::new(),
            tool_calls: Vec::new(),
            completions: Vec::new(),
            dedupe_window,
        }
    }

    pub fn push_token(&mut self, content: &str) {
        self.text.push_str(content);
    }

    pub fn push_thinking(&mut self, content: &str) {
        self.thinking.push_str(content);
    }

    pub fn record_tool_call(&mut self, name: impl Into<String>, args: serde_json::Value) {
        self.tool_calls.push(ToolCallRecord {
            name: name.into(),
            args,
            result: None,
        });
    }

    /// Attach `result` to the latest unresolved call named `name`.
    ///
    /// A result with no pending call is kept as its own record.
    pub fn record_tool_result(&mut self, name: &str, result: serde_json::Value) {
        let pending = self
            .tool_calls
            .iter_mut()
            .rev()
            .find(|call| call.name == name && call.result.is_none());
        match pending {
            Some(call) => call.result = Some(result),
            None => self.tool_calls.push(ToolCallRecord {
                name: name.to_string(),
                args: serde_json::Value::Null,
                result: Some(result),
            }),
        }
    }

    /// Record an output text. Returns `false` when it repeats the previous
    /// completion within the dedupe window and was collapsed into it.
    pub fn record_completion(&mut self, entry: CompletionEntry) -> bool {
        if let Some(last) = self.completions.last_mut() {
            let within = entry
                .at
                .checked_duration_since(last.at)
                .map_or(true, |gap| gap <= self.dedupe_window);
            if last.text == entry.text && within {
                debug!(chars = entry.text.len(), "Collapsing duplicate completion");
                // Keep metadata that only the later copy carries.
                if last.conversation_id.is_none() {
                    last.conversation_id = entry.conversation_id;
                }
                if last.title.is_none() {
                    last.title = entry.title;
                }
                if last.links.is_empty() {
                    last.links = entry.links;
                }
                return false;
            }
        }
        self.completions.push(entry);
        true
    }

    /// Accumulated `token` text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    pub fn completions(&self) -> &[CompletionEntry] {
        &self.completions
    }

    /// Object-shaped tool results, e.g. related-entity details.
    pub fn structured_results(&self) -> Vec<&serde_json::Map<String, serde_json::Value>> {
        self.tool_calls
            .iter()
            .filter_map(|call| call.result.as_ref()?.as_object())
            .collect()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokens_and_thinking_are_separate() {
        let mut t = Transcript::default();
        t.push_token("Hel");
        t.push_thinking("considering the brief");
        t.push_token("lo");
        assert_eq!(t.text(), "Hello");
        assert_eq!(t.thinking(), "considering the brief");
    }

    #[test]
    fn test_tool_result_attaches_to_latest_pending_call() {
        let mut t = Transcript::default();
        t.record_tool_call("lookup", json!({ "q": "first" }));
        t.record_tool_call("lookup", json!({ "q": "second" }));
        t.record_tool_result("lookup", json!({ "company": "Acme" }));

        assert!(t.tool_calls()[0].result.is_none());
        assert_eq!(t.tool_calls()[1].result, Some(json!({ "company": "Acme" })));

        t.record_tool_result("lookup", json!("plain"));
        assert_eq!(t.tool_calls()[0].result, Some(json!("plain")));

        t.record_tool_result("search", json!([]));
        assert_eq!(t.tool_calls().len(), 3);
        assert!(t.tool_calls()[2].args.is_null());
    }

    #[test]
    fn test_structured_results_only_objects() {
        let mut t = Transcript::default();
        t.record_tool_call("lookup", json!({}));
        t.record_tool_result("lookup", json!({ "id": 7 }));
        t.record_tool_call("count", json!({}));
        t.record_tool_result("count", json!(3));
        t.push_token("text");

        let results = t.structured_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["id"], json!(7));
        assert_eq!(t.text(), "text");
    }

    #[test]
    fn test_duplicate_within_window_collapses() {
        let mut t = Transcript::new(Duration::from_millis(500));
        let start = Instant::now();
        assert!(t.record_completion(CompletionEntry::new("# Report", start)));

        let mut again = CompletionEntry::new("# Report", start + Duration::from_millis(200));
        again.title = Some("Quarterly".into());
        assert!(!t.record_completion(again));

        assert_eq!(t.completions().len(), 1);
        assert_eq!(t.completions()[0].title.as_deref(), Some("Quarterly"));
    }

    #[test]
    fn test_duplicate_outside_window_is_kept() {
        let mut t = Transcript::new(Duration::from_millis(500));
        let start = Instant::now();
        t.record_completion(CompletionEntry::new("# Report", start));
        assert!(t.record_completion(CompletionEntry::new("# Report", start + Duration::from_secs(2))));
        assert_eq!(t.completions().len(), 2);
    }

    #[test]
    fn test_different_text_is_kept() {
        let mut t = Transcript::default();
        let now = Instant::now();
        t.record_completion(CompletionEntry::new("one", now));
        assert!(t.record_completion(CompletionEntry::new("two", now)));
        assert_eq!(t.completions().len(), 2);
    }
}
