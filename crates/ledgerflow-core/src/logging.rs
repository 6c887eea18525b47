/*!
 * Logging functionality for LedgerFlow.
 *
 * This module provides tracing setup and utilities for consistent logging
 * across the LedgerFlow crates.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "ledgerflow=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Create a new span for a workspace-scoped operation
///
/// # Arguments
///
/// * `name` - The name of the operation
/// * `workspace_id` - The workspace the operation runs in
pub fn workspace_span(name: &str, workspace_id: &str) -> tracing::Span {
    tracing::info_span!("workspace_op", name = %name, workspace_id = %workspace_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        // Repeated init attempts in one process are tolerated
        let _ = init();
        let _ = init();
    }

    #[test]
    fn test_workspace_span() {
        let span = workspace_span("trigger", "ws-1");
        let _guard = span.enter();
    }
}
