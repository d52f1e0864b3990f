use crate::tools::{validate_args, ToolContext, ToolDefinition, ToolError};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition for the model API
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool with already-validated arguments
    async fn execute(&self, args: Value, context: &ToolContext) -> Result<Value, ToolError>;

    /// Returns the tool's name
    fn name(&self) -> String {
        self.definition().name
    }
}

/// Registry that holds all available tools.
/// Uses interior mutability (RwLock) so tools can be registered at runtime
/// without requiring &mut self.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool (thread-safe, takes &self via interior mutability)
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.write().insert(name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Get definitions for every registered tool
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .read()
            .values()
            .map(|tool| tool.definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Get definitions for an explicit subset of tool names (an agent's
    /// bound set). Names not present in the registry are skipped here; the
    /// binding is checked separately at startup.
    pub fn definitions_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.get(name).map(|tool| tool.definition()))
            .collect()
    }

    /// Execute a tool by name, validating the arguments against the tool's
    /// input schema first. Validation and execution failures both surface as
    /// `ToolError`, which the orchestration loop reports back to the agent
    /// as a tool-result error.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        context: &ToolContext,
    ) -> Result<Value, ToolError> {
        let tool = match self.get(name) {
            Some(t) => t,
            None => return Err(ToolError::execution(format!("Tool '{}' not found", name))),
        };

        validate_args(&tool.definition().input_schema, &args)?;

        tool.execute(args, context).await
    }

    /// Get count of registered tools
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
