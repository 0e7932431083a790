//! Schema validation for project configuration.
//!
//! Duplicate variant names are warned about but not rejected: the build
//! orchestrator's result mapping is last-write-wins, and callers validating
//! uniqueness do so here, upstream of any build.

use std::collections::HashSet;

use tracing::warn;

use crate::error::{ConfigError, Result};
use crate::project::ProjectConfig;

/// Validate a project configuration before building.
pub fn validate(config: &ProjectConfig) -> Result<()> {
    if config.builds.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "builds".to_string(),
            hint: "at least one build variant is required".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for variant in &config.builds {
        if variant.name.contains('/') || variant.name.contains('\\') {
            return Err(ConfigError::InvalidVariant {
                name: variant.name.clone(),
                reason: "variant names must not contain path separators".to_string(),
            });
        }
        if !seen.insert(variant.display_name().to_string()) {
            warn!(
                variant = variant.display_name(),
                "duplicate build variant name; the last definition wins"
            );
        }
    }

    Ok(())
}
