use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Factory<C> = Box<dyn Fn() -> Arc<C> + Send + Sync>;

/// Maps command names to factories and keeps every command object it instantiated,
/// so a name is only ever built once per registry.
pub struct CommandRegistry<C: ?Sized> {
    factories: HashMap<String, Factory<C>>,
    loaded: HashMap<String, Arc<C>>,
}

impl<C: ?Sized> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
            loaded: HashMap::new(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for CommandRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<_> = self.factories.keys().collect();
        registered.sort();
        let mut loaded: Vec<_> = self.loaded.keys().collect();
        loaded.sort();
        f.debug_struct("CommandRegistry")
            .field("registered", &registered)
            .field("loaded", &loaded)
            .finish()
    }
}

impl<C: ?Sized> CommandRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a name again replaces its factory and drops the cached instance, if any
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<C> + Send + Sync + 'static,
    {
        let name = name.into();
        self.loaded.remove(&name);
        self.factories.insert(name, Box::new(factory));
    }

    /// Returns the command for that name, instantiating it on first use.
    /// None if nothing is registered under that name.
    pub fn resolve(&mut self, name: &str) -> Option<Arc<C>> {
        if let Some(command) = self.loaded.get(name) {
            return Some(Arc::clone(command));
        }

        let factory = self.factories.get(name)?;
        log::debug!("Loading command `{name}`");
        let command = factory();
        self.loaded.insert(name.to_string(), Arc::clone(&command));
        Some(command)
    }

    /// Whether that command was already loaded. This doesn't look at what's registered.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hello;

    impl Greeter for Hello {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn instantiates_once_and_caches() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut registry: CommandRegistry<dyn Greeter> = CommandRegistry::new();
        registry.register("hello", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Hello) as Arc<dyn Greeter>
        });

        assert!(!registry.is_loaded("hello"));
        let first = registry.resolve("hello").unwrap();
        let second = registry.resolve("hello").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(registry.is_loaded("hello"));
        assert_eq!(first.greet(), "hello");
    }

    #[test]
    fn unknown_names_resolve_to_nothing() {
        let mut registry: CommandRegistry<dyn Greeter> = CommandRegistry::new();
        assert!(registry.resolve("nope").is_none());
        assert!(!registry.is_loaded("nope"));
    }

    #[test]
    fn registering_again_drops_the_cached_instance() {
        let mut registry: CommandRegistry<dyn Greeter> = CommandRegistry::new();
        registry.register("hello", || Arc::new(Hello) as Arc<dyn Greeter>);
        let first = registry.resolve("hello").unwrap();
        registry.register("hello", || Arc::new(Hello) as Arc<dyn Greeter>);
        assert!(!registry.is_loaded("hello"));
        assert!(registry.is_registered("hello"));
        let second = registry.resolve("hello").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
