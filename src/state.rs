//! Application state: the shared, read-only grader.
//!
//! Rule tables come from the TOML file named by GRADER_RULES_PATH when it is
//! set and valid, otherwise from the built-in seeds. Nothing here mutates
//! after startup, so handlers share the state without locks.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{load_rules_from_env, ConfigError, Rules};
use crate::engine::Grader;

#[derive(Clone, Debug)]
pub struct AppState {
    pub grader: Arc<Grader>,
}

impl AppState {
    /// Build state from env: load rule tables (or defaults) and validate them.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, ConfigError> {
        let (rules, source) = match load_rules_from_env() {
            Some(rules) => (rules, "file"),
            None => (Rules::default(), "built_in"),
        };
        info!(target: "devforge_backend", %source, "Grader rules selected");
        Self::with_rules(rules)
    }

    pub fn with_rules(rules: Rules) -> Result<Self, ConfigError> {
        let grader = Grader::new(rules)?;

        // Inventory summary of the active rule tables.
        let r = grader.rules();
        info!(
            target: "devforge_backend",
            deny_rules = r.security.deny.len(),
            library_entries = r.library.entries.len(),
            bonus_rules = r.bonus.rules.len(),
            badges = r.badges.rules.len(),
            levels = r.levels.bands.len(),
            next_links = r.next_challenges.links.len(),
            "Startup rule inventory"
        );

        Ok(Self { grader: Arc::new(grader) })
    }
}
