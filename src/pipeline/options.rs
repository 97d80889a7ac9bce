//! Caller-supplied options for a pipeline run.

use serde::Serialize;

use crate::stages::StageKind;

/// What to do when a requested stage has no (complete) configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MissingConfigPolicy {
    /// Log a warning and continue with the next stage.
    #[default]
    Skip,
    /// Stop the whole run.
    Abort,
}

/// Which stages to run and how to treat unconfigured ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Stages requested; defaults to every stage.
    pub steps: Vec<StageKind>,
    /// Stages removed from `steps`.
    pub skip: Vec<StageKind>,
    pub on_missing_config: MissingConfigPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            steps: StageKind::ALL.to_vec(),
            skip: Vec::new(),
            on_missing_config: MissingConfigPolicy::default(),
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the requested stages.
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = StageKind>) -> Self {
        self.steps = steps.into_iter().collect();
        self
    }

    /// Builder method to set the skipped stages.
    pub fn with_skip(mut self, skip: impl IntoIterator<Item = StageKind>) -> Self {
        self.skip = skip.into_iter().collect();
        self
    }

    /// Builder method to set the missing-configuration policy.
    pub fn with_missing_config_policy(mut self, policy: MissingConfigPolicy) -> Self {
        self.on_missing_config = policy;
        self
    }

    /// `steps` minus `skip`, in canonical pipeline order, without duplicates.
    pub fn effective_stages(&self) -> Vec<StageKind> {
        StageKind::ALL
            .into_iter()
            .filter(|kind| self.steps.contains(kind) && !self.skip.contains(kind))
            .collect()
    }
}
