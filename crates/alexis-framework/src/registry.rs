//! Handler registry.
//!
//! Holds every loaded handler and indexes it by trigger class. Loading
//! happens once, before the gateway connects; afterwards the registry is
//! wrapped in an `Arc` and only read.
//!
//! Names live in one namespace: a handler's name, and for commands its
//! aliases, may not collide with any name or alias already registered,
//! whatever the trigger class of either handler.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::handler::BoxedHandler;

/// Registered handlers indexed by trigger class.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    /// All handlers, in registration order.
    handlers: Vec<BoxedHandler>,
    /// Command name or alias → handler index.
    commands: HashMap<String, usize>,
    /// Every taken name (handler names and aliases) → owning handler index.
    names: HashMap<String, usize>,
    /// Event name → handler indices, in registration order.
    subscribers: HashMap<String, Vec<usize>>,
    prefix: Vec<usize>,
    mention: Vec<usize>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    ///
    /// Fails without modifying the registry when the handler's name or one
    /// of its aliases is already taken.
    pub fn register(&mut self, handler: BoxedHandler) -> RegistryResult<()> {
        let spec = handler.spec();
        let name = spec.name();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if spec.prefixes().iter().any(String::is_empty) {
            return Err(RegistryError::EmptyPrefix(name.to_string()));
        }

        let mut claimed: Vec<&str> = vec![name];
        claimed.extend(spec.command_names().skip(1));
        for (i, candidate) in claimed.iter().enumerate() {
            let taken_here = claimed[..i].contains(candidate);
            if taken_here {
                return Err(RegistryError::DuplicateName {
                    name: candidate.to_string(),
                    handler: name.to_string(),
                    existing: name.to_string(),
                });
            }
            if let Some(&existing) = self.names.get(*candidate) {
                return Err(RegistryError::DuplicateName {
                    name: candidate.to_string(),
                    handler: name.to_string(),
                    existing: self.handlers[existing].spec().name().to_string(),
                });
            }
        }

        let index = self.handlers.len();
        for candidate in &claimed {
            self.names.insert(candidate.to_string(), index);
        }
        for command in spec.command_names() {
            self.commands.insert(command.to_string(), index);
        }
        for event in spec.events() {
            self.subscribers.entry(event.clone()).or_default().push(index);
        }
        if !spec.prefixes().is_empty() || spec.uses_command_prefix() {
            self.prefix.push(index);
        }
        if spec.is_mention_handler() {
            self.mention.push(index);
        }

        debug!(
            handler = name,
            command = spec.is_command(),
            aliases = spec.aliases().len(),
            prefixes = spec.prefixes().len(),
            events = spec.events().len(),
            mention = spec.is_mention_handler(),
            "Registered handler"
        );

        self.handlers.push(handler);
        Ok(())
    }

    /// Registers a handler (builder pattern).
    pub fn with(mut self, handler: BoxedHandler) -> RegistryResult<Self> {
        self.register(handler)?;
        Ok(self)
    }

    /// Looks up an ordinary command by exact (case-sensitive) name or alias.
    pub fn lookup(&self, name: &str) -> Option<&BoxedHandler> {
        self.commands.get(name).map(|&index| &self.handlers[index])
    }

    /// Handlers subscribed to `event_name`, in registration order.
    pub fn subscribers(&self, event_name: &str) -> Vec<&BoxedHandler> {
        self.subscribers
            .get(event_name)
            .map(|indices| indices.iter().map(|&i| &self.handlers[i]).collect())
            .unwrap_or_default()
    }

    /// Handlers triggered by a raw text prefix, in registration order.
    pub fn prefix_handlers(&self) -> Vec<&BoxedHandler> {
        self.prefix.iter().map(|&i| &self.handlers[i]).collect()
    }

    /// Handlers triggered by a leading mention of the bot, in registration order.
    pub fn mention_handlers(&self) -> Vec<&BoxedHandler> {
        self.mention.iter().map(|&i| &self.handlers[i]).collect()
    }

    /// All handlers, in registration order.
    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.handlers.len())
            .field("command_count", &self.commands.len())
            .field("prefix_count", &self.prefix.len())
            .field("mention_count", &self.mention.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerSpec, handler_fn};
    use std::sync::Arc;

    fn noop(spec: HandlerSpec) -> BoxedHandler {
        Arc::new(handler_fn(spec, |_ctx| async { Ok(()) }))
    }

    fn names(handlers: Vec<&BoxedHandler>) -> Vec<String> {
        handlers
            .into_iter()
            .map(|h| h.spec().name().to_string())
            .collect()
    }

    #[test]
    fn test_lookup_by_name_and_alias() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(noop(HandlerSpec::command("isetcolour").alias("isetcolor")))
            .unwrap();

        assert!(registry.lookup("isetcolour").is_some());
        assert!(registry.lookup("isetcolor").is_some());
        assert!(registry.lookup("ISETCOLOUR").is_none());
        assert!(registry.lookup("iset").is_none());
    }

    #[test]
    fn test_duplicate_command_name_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop(HandlerSpec::command("set"))).unwrap();

        let err = registry
            .register(noop(HandlerSpec::command("other").alias("set")))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateName {
                name: "set".into(),
                handler: "other".into(),
                existing: "set".into(),
            }
        );
        // Failed registration leaves no trace.
        assert!(registry.lookup("other").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_cross_class_collision_rejected() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(noop(HandlerSpec::new("greeter").on_event("member_join")))
            .unwrap();

        assert!(matches!(
            registry.register(noop(HandlerSpec::command("greeter"))),
            Err(RegistryError::DuplicateName { .. })
        ));
        assert!(matches!(
            registry.register(noop(HandlerSpec::command("hello").alias("greeter"))),
            Err(RegistryError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_alias_repeating_own_name_rejected() {
        let mut registry = HandlerRegistry::new();
        assert!(
            registry
                .register(noop(HandlerSpec::command("list").alias("list")))
                .is_err()
        );
    }

    #[test]
    fn test_empty_name_and_prefix_rejected() {
        let mut registry = HandlerRegistry::new();
        assert_eq!(
            registry.register(noop(HandlerSpec::command(""))),
            Err(RegistryError::EmptyName)
        );
        assert_eq!(
            registry.register(noop(HandlerSpec::new("p").prefix(""))),
            Err(RegistryError::EmptyPrefix("p".into()))
        );
    }

    #[test]
    fn test_class_indexes_keep_registration_order() {
        let registry = HandlerRegistry::new()
            .with(noop(HandlerSpec::new("b").prefix("!").on_event("member_join")))
            .unwrap()
            .with(noop(HandlerSpec::new("a").prefix("¡").on_mention()))
            .unwrap()
            .with(noop(HandlerSpec::new("c").on_event("member_join").on_mention()))
            .unwrap();

        assert_eq!(names(registry.prefix_handlers()), vec!["b", "a"]);
        assert_eq!(names(registry.subscribers("member_join")), vec!["b", "c"]);
        assert_eq!(names(registry.mention_handlers()), vec!["a", "c"]);
        assert!(registry.subscribers("typing").is_empty());
        assert!(registry.lookup("b").is_none());
    }
}
