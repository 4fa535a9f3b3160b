//! Component class registry.
//!
//! Maps `(plugin, class)` name pairs to [`ComponentClass`] values so graphs
//! can be assembled from textual descriptions such as `utils.muxer`. Classes
//! are registered in code; nothing is discovered or loaded at runtime.

use crate::pipeline::component::{ComponentClass, ComponentKind};
use crate::pipeline::nodes::{counter_sink, muxer};
use indexmap::IndexMap;

/// Plugin name of the built-in classes.
pub const BUILTIN_PLUGIN: &str = "utils";

/// Registered component classes, in registration order.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    classes: IndexMap<(String, String), ComponentClass>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `utils.muxer` and `utils.counter`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(BUILTIN_PLUGIN, muxer::class());
        registry.register(BUILTIN_PLUGIN, counter_sink::class());
        registry
    }

    /// Register `class` under `plugin`, returning the class it replaces.
    pub fn register(
        &mut self,
        plugin: impl Into<String>,
        class: ComponentClass,
    ) -> Option<ComponentClass> {
        let plugin = plugin.into();
        tracing::debug!(
            "Registered {} component class {}.{}",
            class.kind(),
            plugin,
            class.name()
        );
        self.classes
            .insert((plugin, class.name().to_string()), class)
    }

    pub fn get(&self, plugin: &str, class: &str) -> Option<&ComponentClass> {
        self.classes.get(&(plugin.to_string(), class.to_string()))
    }

    /// Look up a `plugin.class` specification.
    pub fn find(&self, spec: &str) -> Option<&ComponentClass> {
        let (plugin, class) = spec.split_once('.')?;
        self.get(plugin, class)
    }

    pub fn contains(&self, plugin: &str, class: &str) -> bool {
        self.get(plugin, class).is_some()
    }

    /// `(plugin, class)` pairs with their classes, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &ComponentClass)> {
        self.classes
            .iter()
            .map(|((plugin, name), class)| (plugin.as_str(), name.as_str(), class))
    }

    /// Classes of one kind.
    pub fn of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &ComponentClass> {
        self.classes.values().filter(move |c| c.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
