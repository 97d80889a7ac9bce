//! Load & preprocess: gather raw bilingual files for every language pair and
//! corpus, cap them, push them through the configured preprocessing scripts
//! and concatenate the results into the final output files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{error, info, warn};

use super::{log_stderr, Stage, StageError, StageKind};
use crate::config::{CorpusInfo, LanguagePair, LoadConfig};
use crate::runner::{CommandRunner, CommandSpec};

/// Copy the first `max_lines` lines of `input` into `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Raw files found for one corpus and language pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusInputs {
    pub src: PathBuf,
    pub tgt: PathBuf,
    /// True when the files were found under the reversed pair name.
    pub reversed: bool,
}

/// The load stage.
pub struct LoadAndPreprocess {
    config: LoadConfig,
}

impl LoadAndPreprocess {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Recreates the scratch directory and makes sure the output data
    /// directory exists.
    async fn prepare_directories(&self) -> Result<(), StageError> {
        let output = &self.config.dirs.output_data_dir;
        if path_exists(output).await {
            warn!("Output data directory {} already exists", output.display());
        } else {
            fs::create_dir_all(output)
                .await
                .map_err(StageError::io(output))?;
            info!("Created output data directory {}", output.display());
        }

        let scratch = &self.config.dirs.scratch_dir;
        if path_exists(scratch).await {
            fs::remove_dir_all(scratch)
                .await
                .map_err(StageError::io(scratch))?;
        }
        fs::create_dir_all(scratch)
            .await
            .map_err(StageError::io(scratch))?;
        Ok(())
    }

    /// Finds the raw files of `corpus` for `pair`, applying the missing-data
    /// policy. `Ok(None)` means the corpus is skipped for this pair.
    pub async fn locate_inputs(
        &self,
        corpus: &CorpusInfo,
        pair: &LanguagePair,
    ) -> Result<Option<CorpusInputs>, StageError> {
        let policy = self.config.on_missing_data;
        let direct = candidate_inputs(corpus, pair, pair, false);
        if direct.present().await {
            return Ok(Some(direct));
        }

        let mut tried = vec![corpus.filename_prefix_for_pair(pair)];
        if policy.try_reversed_pairs {
            info!(
                "'{}' data not found, trying with reversed language pair",
                corpus.filename_prefix_for_pair(pair)
            );
            let reversed = candidate_inputs(corpus, pair, &pair.reversed(), true);
            if reversed.present().await {
                return Ok(Some(reversed));
            }
            tried.push(corpus.filename_prefix_for_pair(&pair.reversed()));
        }

        let described = tried
            .iter()
            .map(|name| format!("'{}'", name))
            .collect::<Vec<_>>()
            .join(" nor ");
        if policy.exit_on_error {
            error!("No {} data found, aborting", described);
            return Err(StageError::MissingData {
                corpus: corpus.name.clone(),
                pair: pair.to_string(),
                tried,
            });
        }
        warn!(
            "No {} data found, skipping corpus for this language pair",
            described
        );
        Ok(None)
    }

    /// Truncation jobs for one corpus: one per language, each reading its own
    /// input and writing a scratch copy named after the direct pair.
    pub fn truncation_jobs(
        &self,
        corpus: &CorpusInfo,
        pair: &LanguagePair,
        inputs: &CorpusInputs,
    ) -> [TruncationJob; 2] {
        let [src_name, tgt_name] = scratch_names(corpus, pair);
        [
            TruncationJob {
                input: inputs.src.clone(),
                output: self.config.dirs.scratch_file(&src_name),
            },
            TruncationJob {
                input: inputs.tgt.clone(),
                output: self.config.dirs.scratch_file(&tgt_name),
            },
        ]
    }

    /// Loads, truncates and preprocesses one corpus for one pair. Returns the
    /// final scratch file names, or `None` when the corpus was skipped.
    async fn generate_corpus_for_pair(
        &self,
        corpus: &CorpusInfo,
        pair: &LanguagePair,
        runner: &dyn CommandRunner,
    ) -> Result<Option<Vec<String>>, StageError> {
        info!("{} ({})", corpus.name, corpus.complete_path);

        let Some(inputs) = self.locate_inputs(corpus, pair).await? else {
            return Ok(None);
        };

        info!("Loading raw data");
        for job in self.truncation_jobs(corpus, pair, &inputs) {
            truncate_lines(&job, self.config.max_entries_per_corpus).await?;
        }
        let mut files: Vec<String> = scratch_names(corpus, pair).into();

        let steps: Vec<_> = self.config.steps_for(&corpus.name).collect();
        if steps.is_empty() {
            info!("Preprocessing steps for this corpus: None");
        } else {
            let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
            info!("Preprocessing steps for this corpus: {}", names.join(", "));
        }

        for (i, step) in steps.into_iter().enumerate() {
            info!("{}) {}", i + 1, step.name);
            let spec = CommandSpec::new(self.config.script_path(step).display().to_string())
                .arg(self.config.dirs.scratch_dir.display().to_string())
                .with_args(files.iter().cloned())
                .captured();
            let output = runner.run(&spec).await.map_err(|source| {
                error!(
                    "Error during '{}' preprocessing step for '{}' corpus",
                    step.name, corpus.name
                );
                log_stderr(&source);
                StageError::Preprocessing {
                    step: step.name.clone(),
                    corpus: corpus.name.clone(),
                    source,
                }
            })?;
            files = output.stdout_lines();
        }

        Ok(Some(files))
    }

    /// Checks that every contributing corpus produced one file per final
    /// output file and concatenates them position by position.
    async fn concatenate_generated(&self, corpora_files: &[Vec<String>]) -> Result<(), StageError> {
        let final_files = &self.config.final_files;
        if corpora_files.is_empty() {
            return Err(StageError::Consistency(
                "no corpus produced any data to concatenate".to_string(),
            ));
        }
        if corpora_files.iter().any(|files| files.len() != final_files.len()) {
            let msg = format!(
                "At the end of the preprocessing, every corpus should have as many output files \
                 as there are in '{} > preprocessing > final_files' ({}) in order to concatenate \
                 them into those final files",
                self.config.config_source,
                final_files.len()
            );
            error!("{}", msg);
            return Err(StageError::Consistency(msg));
        }

        info!("Concatenating all generated data");
        for (position, output_name) in final_files.iter().enumerate() {
            info!("{}", output_name);
            let inputs: Vec<PathBuf> = corpora_files
                .iter()
                .map(|files| self.config.dirs.scratch_file(&files[position]))
                .collect();
            concatenate_files(&inputs, &self.config.dirs.scratch_file(output_name)).await?;
        }
        Ok(())
    }

    async fn move_final_files(&self) -> Result<(), StageError> {
        for name in &self.config.final_files {
            move_file(
                &self.config.dirs.scratch_file(name),
                &self.config.dirs.output_file(name),
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for LoadAndPreprocess {
    fn kind(&self) -> StageKind {
        StageKind::Load
    }

    async fn run(&self, runner: &dyn CommandRunner) -> Result<(), StageError> {
        self.prepare_directories().await?;

        let mut corpora_files = Vec::new();
        for pair in self.config.language_pairs() {
            info!("Generating '{}' data", pair);
            for corpus in &self.config.corpora {
                if let Some(files) = self.generate_corpus_for_pair(corpus, &pair, runner).await? {
                    corpora_files.push(files);
                }
            }
        }

        self.concatenate_generated(&corpora_files).await?;
        self.move_final_files().await?;

        if !self.config.keep_scratch {
            let scratch = &self.config.dirs.scratch_dir;
            fs::remove_dir_all(scratch)
                .await
                .map_err(StageError::io(scratch))?;
        }
        Ok(())
    }
}

/// Input paths `<complete_path_for_pair(lookup)>.<src>` / `.<tgt>`; the
/// language suffixes always follow the requested pair.
fn candidate_inputs(
    corpus: &CorpusInfo,
    pair: &LanguagePair,
    lookup: &LanguagePair,
    reversed: bool,
) -> CorpusInputs {
    let base = corpus.complete_path_for_pair(lookup);
    CorpusInputs {
        src: PathBuf::from(format!("{}.{}", base, pair.src)),
        tgt: PathBuf::from(format!("{}.{}", base, pair.tgt)),
        reversed,
    }
}

impl CorpusInputs {
    async fn present(&self) -> bool {
        path_exists(&self.src).await && path_exists(&self.tgt).await
    }
}

/// Scratch file names `<prefix>.<src>` / `<prefix>.<tgt>` for the direct pair.
fn scratch_names(corpus: &CorpusInfo, pair: &LanguagePair) -> [String; 2] {
    let prefix = corpus.filename_prefix_for_pair(pair);
    [
        format!("{}.{}", prefix, pair.src),
        format!("{}.{}", prefix, pair.tgt),
    ]
}

async fn path_exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

/// Writes at most `max_lines` lines of the job's input to its output,
/// byte for byte. Returns the number of lines written.
pub async fn truncate_lines(job: &TruncationJob, max_lines: u64) -> Result<u64, StageError> {
    let input = fs::File::open(&job.input)
        .await
        .map_err(StageError::io(&job.input))?;
    let output = fs::File::create(&job.output)
        .await
        .map_err(StageError::io(&job.output))?;
    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(output);

    let mut line = Vec::new();
    let mut written = 0;
    while written < max_lines {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(StageError::io(&job.input))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&line)
            .await
            .map_err(StageError::io(&job.output))?;
        written += 1;
    }
    writer.flush().await.map_err(StageError::io(&job.output))?;
    Ok(written)
}

/// Byte-level concatenation of `inputs`, in order, into `output`.
pub async fn concatenate_files(inputs: &[PathBuf], output: &Path) -> Result<(), StageError> {
    let mut out = fs::File::create(output)
        .await
        .map_err(StageError::io(output))?;
    for input in inputs {
        let mut file = fs::File::open(input).await.map_err(StageError::io(input))?;
        tokio::io::copy(&mut file, &mut out)
            .await
            .map_err(StageError::io(input))?;
    }
    out.flush().await.map_err(StageError::io(output))?;
    Ok(())
}

/// Moves `from` to `to`, replacing `to`. Falls back to copy and delete when
/// the two paths are on different filesystems.
pub async fn move_file(from: &Path, to: &Path) -> Result<(), StageError> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs::copy(from, to).await.map_err(StageError::io(from))?;
    fs::remove_file(from).await.map_err(StageError::io(from))?;
    Ok(())
}
