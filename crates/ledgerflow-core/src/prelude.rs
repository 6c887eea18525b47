/*!
 * Prelude module for LedgerFlow Core.
 *
 * This module re-exports commonly used types and functions from the
 * LedgerFlow Core crate to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export core types
pub use crate::types::{entity, Entity, Id, SharedEntity, Value};

// Re-export event types
pub use crate::event::{listener, AutomationEvent, EventBus, EventPayload, Listener, Subscription};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, SharedConfig};

// Re-export utility functions
pub use crate::utils::{spawn_and_log, with_retry, with_timeout};

// Re-export logging macros
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::init;
