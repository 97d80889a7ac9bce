//! Split the output files into named partitions with an external splitter.

use async_trait::async_trait;
use tracing::{error, info};

use super::{log_stderr, Stage, StageError, StageKind};
use crate::config::{SplitConfig, SplitPlan};
use crate::runner::{CommandRunner, CommandSpec, Redirect};

pub struct Split {
    config: SplitConfig,
}

impl Split {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    /// `<split> -data <f>... -set <name>,<lines>... -remain <name> -v -seed <seed>`
    pub fn split_command(&self, plan: &SplitPlan) -> CommandSpec {
        let dir = &self.config.output_data_dir;
        let mut spec = CommandSpec::from_command_line(&self.config.split);
        for file in &plan.files {
            spec = spec.arg("-data").arg(dir.join(file).display().to_string());
        }
        for part in &plan.parts {
            spec = spec.arg("-set").arg(format!("{},{}", part.name, part.lines));
        }
        spec.arg("-remain")
            .arg(plan.remain.as_str())
            .arg("-v")
            .arg("-seed")
            .arg(plan.seed.to_string())
            .with_stderr(Redirect::Capture)
    }
}

#[async_trait]
impl Stage for Split {
    fn kind(&self) -> StageKind {
        StageKind::Split
    }

    async fn run(&self, runner: &dyn CommandRunner) -> Result<(), StageError> {
        let Some(plan) = &self.config.plan else {
            info!("No splitting configured, nothing to do");
            return Ok(());
        };

        info!("Splitting following files: {}", plan.files.join(" "));
        let parts: Vec<String> = plan
            .parts
            .iter()
            .map(|p| format!("{} ({} lines)", p.name, p.lines))
            .collect();
        info!("Parts: {}", parts.join(", "));
        info!("Remaining: {}", plan.remain);
        info!("Seed: {}", plan.seed);

        runner.run(&self.split_command(plan)).await.map_err(|err| {
            error!("Error during data splitting");
            log_stderr(&err);
            StageError::from(err)
        })?;
        Ok(())
    }
}
