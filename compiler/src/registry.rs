use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{error::BreezeError, traits::Plugin, utils::quote};

/// Selects every registered plugin in [`Registry::select`].
pub const ALL: &str = "all";

/// Plugins keyed by their lower-cased name.
///
/// A registry is an ordinary value owned by a [`Generator`](crate::generator::Generator),
/// so every run sees exactly the plugins registered on it.
pub struct Registry<T: ?Sized + Plugin> {
    kind:    &'static str,
    plugins: BTreeMap<String, Arc<T>>,
}

impl<T: ?Sized + Plugin> Registry<T> {
    /// `kind` names the plugin family in error messages, e.g. `"parser"`.
    pub fn new(kind: &'static str) -> Self {
        Registry { kind, plugins: BTreeMap::new() }
    }

    /// Adds `plugin`, replacing any plugin registered under the same name.
    pub fn register(&mut self, plugin: Arc<T>) -> Option<Arc<T>> {
        let key = normalize(plugin.name());
        self.plugins.insert(key, plugin)
    }

    pub fn get(&self, name: &str) -> Result<Arc<T>, BreezeError> {
        self.plugins
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| BreezeError::Resolution(format!("can not find {}: {}", self.kind, quote(name))))
    }

    /// Resolves a comma-separated list of names, or [`ALL`]. Order follows
    /// the list; `all` yields every plugin sorted by name.
    pub fn select(&self, names: &str) -> Result<Vec<Arc<T>>, BreezeError> {
        if normalize(names) == ALL {
            return Ok(self.plugins.values().cloned().collect());
        }
        let mut selected: Vec<Arc<T>> = Vec::new();
        for name in names.split(',').filter(|n| !n.trim().is_empty()) {
            let plugin = self.get(name)?;
            if !selected.iter().any(|p| Arc::ptr_eq(p, &plugin)) {
                selected.push(plugin);
            }
        }
        if selected.is_empty() {
            return Err(BreezeError::Resolution(format!("no {} selected", self.kind)));
        }
        Ok(selected)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn registry() -> Registry<dyn Plugin> {
        let mut registry: Registry<dyn Plugin> = Registry::new("template");
        registry.register(Arc::new(Named("go")));
        registry.register(Arc::new(Named("java")));
        registry.register(Arc::new(Named("Php")));
        registry
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.get(" PHP ").unwrap().name(), "Php");
        let err = registry.get("cpp").err().unwrap();
        assert!(matches!(err, BreezeError::Resolution(_)), "got {:?}", err);
    }

    #[test]
    fn test_select() {
        let registry = registry();
        let all: Vec<String> = registry.select("all").unwrap().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(all, vec!["go", "java", "Php"]);

        let some: Vec<String> = registry.select("java, go,java").unwrap().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(some, vec!["java", "go"]);

        assert!(registry.select("java,cpp").is_err());
        assert!(registry.select(" , ").is_err());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = registry();
        assert!(registry.register(Arc::new(Named("GO"))).is_some());
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("go").unwrap().name(), "GO");
    }
}
