//! Immutable tool registry, constructed once at process start and passed by
//! reference into the executor. There is no runtime registration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

use super::amass::AmassPlugin;
use super::hibp::HibpPlugin;
use super::spiderfoot::SpiderfootPlugin;
use super::subfinder::SubfinderPlugin;
use super::theharvester::TheHarvesterPlugin;
use super::{ToolDescriptor, ToolPlugin};

/// Credentials and endpoints consumed by the built-in remote plugins.
#[derive(Debug, Clone, Default)]
pub struct ToolSettings {
    pub hibp_api_key: Option<String>,
    pub spiderfoot_url: Option<String>,
}

/// Process-wide mapping from tool identifier to plugin instance.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolPlugin>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &ids).finish()
    }
}

impl ToolRegistry {
    /// Registry with every built-in tool.
    pub fn builtin(settings: &ToolSettings) -> Result<Self> {
        Ok(Self::from_plugins([
            Arc::new(SubfinderPlugin::new()) as Arc<dyn ToolPlugin>,
            Arc::new(AmassPlugin::new()),
            Arc::new(TheHarvesterPlugin::new()),
            Arc::new(HibpPlugin::new(settings.hibp_api_key.clone())?),
            Arc::new(SpiderfootPlugin::new(settings.spiderfoot_url.clone())?),
        ]))
    }

    pub fn from_plugins(
        plugins: impl IntoIterator<Item = Arc<dyn ToolPlugin>>,
    ) -> Self {
        let tools = plugins
            .into_iter()
            .map(|plugin| (plugin.descriptor().id.to_string(), plugin))
            .collect();
        Self { tools }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ToolPlugin>> {
        self.tools.get(id).cloned()
    }

    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        let mut descriptors: Vec<&ToolDescriptor> = self
            .tools
            .values()
            .map(|plugin| plugin.descriptor())
            .collect();
        descriptors.sort_by_key(|descriptor| descriptor.id);
        descriptors
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_exposes_all_tools() {
        let registry = ToolRegistry::builtin(&ToolSettings::default()).unwrap();
        for id in ["subfinder", "amass", "theharvester", "hibp", "spiderfoot"] {
            assert!(registry.get(id).is_some(), "missing builtin tool: {id}");
        }
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn unknown_identifiers_resolve_to_none() {
        let registry = ToolRegistry::builtin(&ToolSettings::default()).unwrap();
        assert!(registry.get("nmap").is_none());
    }
}
