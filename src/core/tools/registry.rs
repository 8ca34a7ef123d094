//! Tool Registry
//!
//! Maps tool names to handlers. A registry is assembled once with
//! [`ToolRegistryBuilder`] and is read-only afterwards, so sessions share it
//! through an `Arc` without locking.

use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{FunctionDeclaration, ToolHandler};
use super::{ToolError, ToolResult};

/// Immutable name -> handler table.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    /// Registration order, used for declarations
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Look up a handler. Names are matched exactly, as the model sends them.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| handler.declaration())
            .collect()
    }

    /// Tool groups for the live setup message:
    /// `[{"function_declarations": [...]}]`, or nothing when empty.
    pub fn setup_tools(&self) -> Vec<Value> {
        if self.is_empty() {
            return Vec::new();
        }
        vec![json!({ "function_declarations": self.declarations() })]
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

/// Collects handlers before freezing them into a [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    /// Add a handler. Fails if the name is already taken.
    pub fn register(mut self, handler: Arc<dyn ToolHandler>) -> ToolResult<Self> {
        let name = handler.name().to_string();
        if name.is_empty() {
            return Err(ToolError::Registration("Tool name cannot be empty".to_string()));
        }
        if self.registry.handlers.contains_key(&name) {
            return Err(ToolError::Registration(format!(
                "Tool '{name}' is already registered"
            )));
        }

        tracing::debug!(tool = %name, "Registered tool");
        self.registry.order.push(name.clone());
        self.registry.handlers.insert(name, handler);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}
