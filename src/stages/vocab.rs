//! Build vocabularies from tokenized files.

use async_trait::async_trait;
use tracing::info;

use super::{Stage, StageError, StageKind};
use crate::config::{BuildVocabConfig, VocabSpec};
use crate::runner::{CommandRunner, CommandSpec};

/// Target vocabulary size.
pub const VOCAB_SIZE: u32 = 32_000;

pub struct BuildVocab {
    config: BuildVocabConfig,
}

impl BuildVocab {
    pub fn new(config: BuildVocabConfig) -> Self {
        Self { config }
    }

    /// `onmt-build-vocab --size 32000 --save_vocab <out>/<save_to> <out>/<file>...`
    /// with stdout and stderr going to `<out>/<save_to>.log`.
    pub fn vocab_command(&self, vocab: &VocabSpec) -> CommandSpec {
        let dir = &self.config.output_data_dir;
        CommandSpec::from_command_line(&self.config.build_vocab)
            .arg("--size")
            .arg(VOCAB_SIZE.to_string())
            .arg("--save_vocab")
            .arg(dir.join(&vocab.save_to).display().to_string())
            .with_args(vocab.files.iter().map(|f| dir.join(f).display().to_string()))
            .with_combined_output(dir.join(format!("{}.log", vocab.save_to)))
    }
}

#[async_trait]
impl Stage for BuildVocab {
    fn kind(&self) -> StageKind {
        StageKind::BuildVocab
    }

    async fn run(&self, runner: &dyn CommandRunner) -> Result<(), StageError> {
        let names: Vec<&str> = self.config.vocabs.iter().map(|v| v.name.as_str()).collect();
        info!("Building following vocabularies: {}", names.join(" "));
        for (i, vocab) in self.config.vocabs.iter().enumerate() {
            info!("{}) {}", i + 1, vocab.name);
            runner.run(&self.vocab_command(vocab)).await?;
        }
        Ok(())
    }
}
