use crate::tools::ToolSpec;
use serde::Serialize;
use serde_json::Value;

/// One catalogue entry, as listed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub channel: &'static str,
    pub tool: &'static str,
    pub description: &'static str,
    /// JSON Schema of the tool's arguments.
    pub parameters: Value,
}

/// Build definitions for every registered tool.
pub fn build_tools(tools: &[ToolSpec]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|tool| ToolDefinition {
            name: tool.qualified_name(),
            channel: tool.channel,
            tool: tool.name,
            description: tool.description,
            parameters: (tool.schema)().to_value(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    #[test]
    fn test_every_tool_has_an_object_schema() {
        let registry = ToolRegistry::new();
        let definitions = build_tools(registry.tools());
        assert_eq!(definitions.len(), registry.tools().len());
        for definition in definitions {
            assert_eq!(
                definition.parameters.get("type").and_then(Value::as_str),
                Some("object"),
                "{}",
                definition.name
            );
            assert!(!definition.description.is_empty());
        }
    }
}
