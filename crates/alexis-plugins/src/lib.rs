//! # Alexis Plugins
//!
//! Handlers shipped with the Alexis bot. They only use the public handler
//! contract of `alexis-framework`, the same as third-party handlers.
//!
//! | Handler | Triggers | Module |
//! |---------|----------|--------|
//! | [`StatusRotation`] | `setstatus`, scheduled tick | [`status`] |
//! | [`macros::MacroSet`], [`macros::MacroUnset`] | `set`, `unset` | [`macros`] |
//! | [`macros::MacroList`] | `list` | [`macros`] |
//! | [`macros::EmbedMacroSet`], [`macros::EmbedMacroUnset`], [`macros::EmbedMacroSetColour`] | `iset`, `iunset`, `isetcolour` | [`macros`] |
//! | [`macros::MacroUse`] | `!name`, `! name`, `¡name` | [`macros`] |
//!
//! ```rust,ignore
//! let mut registry = HandlerRegistry::new();
//! alexis_plugins::register_builtins(&mut registry, "!", Duration::from_secs(30))?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use alexis_framework::{HandlerRegistry, RegistryResult};

pub mod macros;
pub mod status;

pub use macros::{EmbedMacro, TextMacro, parse_colour};
pub use status::{StatusEntry, StatusRotation};

/// Registers every built-in handler.
///
/// `prefix` is the default command prefix shown in the status rotation;
/// `status_interval` the period of the rotation.
pub fn register_builtins(
    registry: &mut HandlerRegistry,
    prefix: &str,
    status_interval: Duration,
) -> RegistryResult<()> {
    registry.register(Arc::new(StatusRotation::new(prefix, status_interval)))?;
    for handler in macros::handlers() {
        registry.register(handler)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_register_without_collisions() {
        let mut registry = HandlerRegistry::new();
        register_builtins(&mut registry, "!", Duration::from_secs(30)).unwrap();

        assert_eq!(registry.len(), 8);
        assert!(registry.lookup("isetcolor").is_some());
        assert!(registry.lookup("setstatus").is_some());
        assert_eq!(registry.prefix_handlers().len(), 1);
    }
}
