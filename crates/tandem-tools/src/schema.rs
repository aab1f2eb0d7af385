//! Flat function-calling schema over the per-server tool registry
//!
//! Model-serving protocols expose a single flat tool namespace, so every tool
//! is addressed by a composite `server_tool` name. Decoding splits on the
//! FIRST separator only: the server name must not contain the separator, but
//! tool names may, and still round-trip.

use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use tandem_core::{Error, Result, ToolDefinition};

/// Separator joining server and tool name in the composite identifier
pub const TOOL_NAME_SEPARATOR: char = '_';

/// Build the composite identifier for a tool
pub fn encode_tool_name(server: &str, tool: &str) -> String {
    format!("{server}{TOOL_NAME_SEPARATOR}{tool}")
}

/// Split a composite identifier back into `(server, tool)`.
///
/// Splits on the first separator only, so `decode(encode(s, t)) == (s, t)`
/// for any `t`, including tool names containing the separator.
pub fn decode_tool_name(composite: &str) -> Result<(&str, &str)> {
    composite
        .split_once(TOOL_NAME_SEPARATOR)
        .ok_or_else(|| Error::MalformedToolName(composite.to_string()))
}

/// One entry of the flat model-facing tool schema
#[derive(Debug, Clone, Serialize)]
pub struct FlatTool {
    /// Composite `server_tool` name
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FlatTool {
    /// Render as a function-calling schema entry
    pub fn to_function_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Flatten the per-server registry into the single flat namespace.
///
/// Every tool from every server appears exactly once under its composite
/// name. With `selected`, only tools present in both the subset and the live
/// registry are kept; stale entries are silently dropped. The result is
/// sorted by composite name so the schema sent to the runtime is stable.
pub fn flatten_tools(
    by_server: &HashMap<String, Vec<ToolDefinition>>,
    selected: Option<&[String]>,
) -> Vec<FlatTool> {
    let wanted: Option<HashSet<&str>> =
        selected.map(|names| names.iter().map(String::as_str).collect());

    let mut flat = Vec::new();
    for (server, tools) in by_server {
        for definition in tools {
            let name = encode_tool_name(server, &definition.name);
            if let Some(wanted) = &wanted {
                if !wanted.contains(name.as_str()) {
                    continue;
                }
            }
            flat.push(FlatTool {
                name,
                description: definition.description.clone(),
                parameters: definition.input_schema.clone(),
            });
        }
    }
    flat.sort_by(|a, b| a.name.cmp(&b.name));
    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(server: &str, name: &str) -> ToolDefinition {
        ToolDefinition {
            server: server.to_string(),
            name: name.to_string(),
            description: format!("{name} tool"),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn test_round_trip() {
        assert_eq!(encode_tool_name("jira", "search_issues"), "jira_search_issues");
        assert_eq!(
            decode_tool_name("jira_search_issues").unwrap(),
            ("jira", "search_issues")
        );
    }

    #[test]
    fn test_round_trip_preserves_separator_in_tool_name() {
        let composite = encode_tool_name("fs", "read_file_lines");
        assert_eq!(decode_tool_name(&composite).unwrap(), ("fs", "read_file_lines"));
    }

    #[test]
    fn test_decode_without_separator_fails() {
        let err = decode_tool_name("standalone").unwrap_err();
        assert!(matches!(err, Error::MalformedToolName(_)));
    }

    #[test]
    fn test_flatten_keeps_every_tool_once() {
        let mut by_server = HashMap::new();
        by_server.insert("jira".to_string(), vec![definition("jira", "search")]);
        by_server.insert(
            "github".to_string(),
            vec![definition("github", "search"), definition("github", "open_pr")],
        );

        let flat = flatten_tools(&by_server, None);
        let names: Vec<&str> = flat.iter().map(|t| t.name.as_str()).collect();
        // identically named tools on different servers stay distinct
        assert_eq!(names, vec!["github_open_pr", "github_search", "jira_search"]);
    }

    #[test]
    fn test_flatten_filters_to_selection() {
        let mut by_server = HashMap::new();
        by_server.insert(
            "jira".to_string(),
            vec![definition("jira", "search"), definition("jira", "create")],
        );

        let selected = vec![
            "jira_search".to_string(),
            // stale entry, no longer in the registry
            "slack_post".to_string(),
        ];
        let flat = flatten_tools(&by_server, Some(&selected));
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].name, "jira_search");
    }

    #[test]
    fn test_function_schema_shape() {
        let tool = FlatTool {
            name: "jira_search".to_string(),
            description: "Search issues".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let schema = tool.to_function_schema();
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["function"]["name"], "jira_search");
    }
}
