//! Tokenize: learn a BPE subword model over the final files, then tokenize
//! each of them into a parallel `.tok` file.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::{log_stderr, Stage, StageError, StageKind};
use crate::config::TokenizeConfig;
use crate::runner::{CommandRunner, CommandSpec, Redirect};

/// Tokenizer mode passed to both the learner and the tokenizer.
pub const TOKENIZER_MODE: &str = "conservative";
/// Number of BPE merge symbols to learn.
pub const BPE_SYMBOLS: u32 = 32_000;
/// File name of the learned model inside the output data directory.
pub const BPE_MODEL_FILE: &str = "bpe.32k";

pub struct Tokenize {
    config: TokenizeConfig,
}

impl Tokenize {
    pub fn new(config: TokenizeConfig) -> Self {
        Self { config }
    }

    fn model_path(&self) -> PathBuf {
        self.config.output_data_dir.join(BPE_MODEL_FILE)
    }

    /// `subword_learn --mode conservative -i <f>... -o <model> -- bpe --symbols 32000`
    pub fn learn_command(&self) -> CommandSpec {
        let mut spec = CommandSpec::from_command_line(&self.config.subword_learn)
            .with_args(["--mode", TOKENIZER_MODE]);
        for file in &self.config.final_files {
            spec = spec
                .arg("-i")
                .arg(self.config.output_data_dir.join(file).display().to_string());
        }
        spec.arg("-o")
            .arg(self.model_path().display().to_string())
            .with_args(["--", "bpe", "--symbols"])
            .arg(BPE_SYMBOLS.to_string())
    }

    /// `tokenize --mode conservative --joiner_annotate --bpe_model <model>`
    /// reading `<file>` on stdin and writing `<file>.tok`.
    pub fn tokenize_command(&self, file: &str) -> CommandSpec {
        let input = self.config.output_data_dir.join(file);
        let output = self.config.output_data_dir.join(format!("{}.tok", file));
        CommandSpec::from_command_line(&self.config.tokenize)
            .with_args(["--mode", TOKENIZER_MODE, "--joiner_annotate", "--bpe_model"])
            .arg(self.model_path().display().to_string())
            .with_stdin(Redirect::ReadFrom(input))
            .with_stdout(Redirect::WriteTo(output))
            .with_stderr(Redirect::Capture)
    }
}

#[async_trait]
impl Stage for Tokenize {
    fn kind(&self) -> StageKind {
        StageKind::Tokenize
    }

    async fn run(&self, runner: &dyn CommandRunner) -> Result<(), StageError> {
        info!("Tokenizing generated data");

        info!("Training tokenizer");
        runner.run(&self.learn_command()).await?;

        info!("Tokenizing");
        for file in &self.config.final_files {
            info!("{}", file);
            runner
                .run(&self.tokenize_command(file))
                .await
                .map_err(|err| {
                    log_stderr(&err);
                    err
                })?;
        }
        Ok(())
    }
}
