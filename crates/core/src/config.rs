use crate::filter::NameFilter;
use crate::offset::DateOffset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    #[default]
    DryRun,
    Apply,
}

/// Everything a walk needs, fixed before traversal starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub root: PathBuf,
    pub run_mode: RunMode,
    pub filter: NameFilter,
    pub offset: DateOffset,
    /// Interpret `offset` as a literal date instead of a relative offset.
    pub absolute: bool,
}

impl RunConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            run_mode: RunMode::default(),
            filter: NameFilter::default(),
            offset: DateOffset::default(),
            absolute: false,
        }
    }

    pub fn is_apply(&self) -> bool {
        self.run_mode == RunMode::Apply
    }

    /// The date-taken tag is only rewritten in offset mode.
    pub fn updates_date_taken(&self) -> bool {
        !self.absolute
    }
}

#[cfg(test)]
mod tests {
    use super::{RunConfig, RunMode};
    use crate::filter::FilterMode;

    #[test]
    fn new_config_is_a_dry_run_over_everything() {
        let config = RunConfig::new("/photos");
        assert_eq!(config.run_mode, RunMode::DryRun);
        assert!(!config.is_apply());
        assert_eq!(config.filter.mode, FilterMode::All);
        assert!(config.offset.is_zero());
        assert!(config.updates_date_taken());
    }

    #[test]
    fn absolute_mode_leaves_date_taken_alone() {
        let mut config = RunConfig::new("/photos");
        config.absolute = true;
        config.run_mode = RunMode::Apply;
        assert!(config.is_apply());
        assert!(!config.updates_date_taken());
    }
}
