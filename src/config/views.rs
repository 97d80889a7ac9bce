//! Typed per-stage projections of the raw configuration.
//!
//! Each view is built eagerly from a [`RawConfig`]: all required keys are
//! looked up at construction, so a view that exists is complete. Views
//! re-derive the experiment directories from `name` on their own and never
//! write back into the raw document.

use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use super::raw::{scalar_to_string, value_to_u64, Lookup, RawConfig};
use super::types::{
    experiment_dir, CorpusInfo, ExperimentDirs, LanguagePair, MissingDataPolicy,
    DEFAULT_SCRATCH_ROOT,
};
use super::ConfigError;

pub const DEFAULT_SUBWORD_LEARN: &[&str] = &["subword_learn"];
pub const DEFAULT_TOKENIZE: &[&str] = &["tokenize"];
pub const DEFAULT_BUILD_VOCAB: &[&str] = &["onmt-build-vocab"];
pub const DEFAULT_SPLIT: &[&str] = &["python3", "corpus-split-sets.py"];

/// One preprocessing script and the corpora it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreprocessingStep {
    pub name: String,
    pub corpora: Vec<String>,
    pub script: String,
}

impl PreprocessingStep {
    pub fn applies_to(&self, corpus: &str) -> bool {
        self.corpora.iter().any(|c| c == corpus)
    }
}

/// Configuration for the load & preprocess stage.
#[derive(Debug, Clone, Serialize)]
pub struct LoadConfig {
    pub experiment: String,
    pub dirs: ExperimentDirs,
    pub data_dir: String,
    pub src_lgs: Vec<String>,
    pub tgt_lgs: Vec<String>,
    pub corpora: Vec<CorpusInfo>,
    pub on_missing_data: MissingDataPolicy,
    pub max_entries_per_corpus: u64,
    pub scripts_dir: String,
    pub preprocessing_steps: Vec<PreprocessingStep>,
    pub final_files: Vec<String>,
    pub keep_scratch: bool,
    /// Where the configuration came from, quoted in consistency errors.
    pub config_source: String,
}

impl LoadConfig {
    pub const STAGE: &'static str = "load";

    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        let l = raw.lookup(Self::STAGE);
        let experiment = l.string(&["name"])?;
        let output_dir = l.string(&["data", "output_dir"])?;
        let scratch_root = l.string_or(&["data", "scratch_dir"], DEFAULT_SCRATCH_ROOT)?;
        let src_lgs = l.string_list(&["data", "src_lgs"])?;
        let tgt_lgs = l.string_list(&["data", "tgt_lgs"])?;
        let data_dir = l
            .string_or(&["data", "dir"], ".")?
            .trim_end_matches('/')
            .to_string();

        let corpora = l
            .entries(&["data", "corpora"])?
            .into_iter()
            .map(|(name, path)| {
                let path = scalar_to_string(path).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        key: format!("data.corpora.{}", name),
                        message: "expected a path".to_string(),
                    }
                })?;
                Ok(CorpusInfo::new(name, &data_dir, path))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let flags = l.string_list_or_empty(&["data", "on_missing_data"])?;
        let (on_missing_data, unknown) =
            MissingDataPolicy::from_flags(flags.iter().map(String::as_str));
        for flag in unknown {
            warn!(flag = %flag, "Ignoring unknown data.on_missing_data flag");
        }

        let max_entries_per_corpus = l.integer(&["data", "max_entries_per_corpus"])?;

        let step_names = l.string_list(&["preprocessing", "steps"])?;
        let preprocessing_steps = step_names
            .into_iter()
            .map(|name| {
                let section = format!("preprocessing_{}", name);
                Ok(PreprocessingStep {
                    corpora: l.string_list(&[section.as_str(), "corpora"])?,
                    script: l.string(&[section.as_str(), "script"])?,
                    name,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let scripts_dir = l
            .string_or(&["preprocessing", "scripts_dir"], ".")?
            .trim_end_matches('/')
            .to_string();
        let final_files = l.string_list(&["preprocessing", "final_files"])?;
        let keep_scratch = l.bool_or(&["preprocessing", "keep_scratch"], false)?;

        let dirs = ExperimentDirs::new(&experiment, &output_dir, &scratch_root);
        // The scratch directory is wiped before and after the stage.
        if dirs.output_data_dir.starts_with(&dirs.scratch_dir) {
            return Err(ConfigError::InvalidValue {
                key: "data.scratch_dir".to_string(),
                message: format!(
                    "scratch directory {} would contain the output data directory {}",
                    dirs.scratch_dir.display(),
                    dirs.output_data_dir.display()
                ),
            });
        }

        Ok(Self {
            dirs,
            experiment,
            data_dir,
            src_lgs,
            tgt_lgs,
            corpora,
            on_missing_data,
            max_entries_per_corpus,
            scripts_dir,
            preprocessing_steps,
            final_files,
            keep_scratch,
            config_source: raw.source_name(),
        })
    }

    /// Every `src` x `tgt` combination, sources outermost.
    pub fn language_pairs(&self) -> Vec<LanguagePair> {
        self.src_lgs
            .iter()
            .flat_map(|src| {
                self.tgt_lgs
                    .iter()
                    .map(move |tgt| LanguagePair::new(src.clone(), tgt.clone()))
            })
            .collect()
    }

    /// Preprocessing steps that apply to `corpus`, in declared order.
    pub fn steps_for<'a>(&'a self, corpus: &'a str) -> impl Iterator<Item = &'a PreprocessingStep> {
        self.preprocessing_steps
            .iter()
            .filter(move |step| step.applies_to(corpus))
    }

    pub fn script_path(&self, step: &PreprocessingStep) -> PathBuf {
        PathBuf::from(format!("{}/{}", self.scripts_dir, step.script))
    }
}

/// Configuration for the tokenize stage.
#[derive(Debug, Clone, Serialize)]
pub struct TokenizeConfig {
    pub experiment: String,
    pub output_data_dir: PathBuf,
    pub final_files: Vec<String>,
    pub subword_learn: Vec<String>,
    pub tokenize: Vec<String>,
}

impl TokenizeConfig {
    pub const STAGE: &'static str = "tokenize";

    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        let l = raw.lookup(Self::STAGE);
        let final_files = l.string_list(&["preprocessing", "final_files"])?;
        let (experiment, output_data_dir) = output_data_dir(&l)?;
        Ok(Self {
            experiment,
            output_data_dir,
            final_files,
            subword_learn: l.command_or(&["tools", "subword_learn"], DEFAULT_SUBWORD_LEARN)?,
            tokenize: l.command_or(&["tools", "tokenize"], DEFAULT_TOKENIZE)?,
        })
    }
}

/// One vocabulary to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VocabSpec {
    pub name: String,
    pub save_to: String,
    pub files: Vec<String>,
}

/// Configuration for the vocabulary stage.
#[derive(Debug, Clone, Serialize)]
pub struct BuildVocabConfig {
    pub experiment: String,
    pub output_data_dir: PathBuf,
    pub vocabs: Vec<VocabSpec>,
    pub build_vocab: Vec<String>,
}

impl BuildVocabConfig {
    pub const STAGE: &'static str = "build_vocab";

    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        let l = raw.lookup(Self::STAGE);
        let (experiment, output_data_dir) = output_data_dir(&l)?;
        let vocabs = l
            .entries(&["vocab"])?
            .into_iter()
            .map(|(name, _)| {
                Ok(VocabSpec {
                    save_to: l.string(&["vocab", name.as_str(), "save_to"])?,
                    files: l.string_list(&["vocab", name.as_str(), "files"])?,
                    name,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            experiment,
            output_data_dir,
            vocabs,
            build_vocab: l.command_or(&["tools", "build_vocab"], DEFAULT_BUILD_VOCAB)?,
        })
    }
}

/// A named output partition and its size in lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPart {
    pub name: String,
    pub lines: u64,
}

/// What to split and how, from the `splitting` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPlan {
    pub files: Vec<String>,
    pub parts: Vec<SplitPart>,
    pub remain: String,
    pub seed: u64,
}

/// Configuration for the split stage. `plan` is `None` when the document has
/// no `splitting` section, which makes the stage a no-op.
#[derive(Debug, Clone, Serialize)]
pub struct SplitConfig {
    pub experiment: String,
    pub output_data_dir: PathBuf,
    pub plan: Option<SplitPlan>,
    pub split: Vec<String>,
}

impl SplitConfig {
    pub const STAGE: &'static str = "split";

    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        let l = raw.lookup(Self::STAGE);
        let plan = match l.get(&["splitting"]) {
            None => None,
            Some(_) => {
                let files = l.string_list(&["splitting", "files"])?;
                let parts = l
                    .entries(&["splitting", "parts"])?
                    .into_iter()
                    .map(|(name, lines)| {
                        let lines = value_to_u64(lines).ok_or_else(|| ConfigError::InvalidValue {
                            key: format!("splitting.parts.{}", name),
                            message: "expected a line count".to_string(),
                        })?;
                        Ok(SplitPart { name, lines })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Some(SplitPlan {
                    files,
                    parts,
                    remain: l.string(&["splitting", "remain"])?,
                    seed: l.integer(&["splitting", "seed"])?,
                })
            }
        };
        let (experiment, output_data_dir) = output_data_dir(&l)?;
        Ok(Self {
            experiment,
            output_data_dir,
            plan,
            split: l.command_or(&["tools", "split"], DEFAULT_SPLIT)?,
        })
    }
}

/// Which model the training stage would use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    /// A user-provided model definition file.
    Custom { file: String },
    /// A model type from the toolkit catalog.
    Catalog { model_type: String },
}

/// Configuration for training. Resolved by the factory only; no stage in this
/// crate consumes it.
#[derive(Debug, Clone, Serialize)]
pub struct TrainConfig {
    pub experiment: String,
    pub output_dir: PathBuf,
    pub model: ModelSource,
    pub model_config_file: String,
    pub options: serde_yaml::Value,
}

impl TrainConfig {
    pub const STAGE: &'static str = "train";

    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        let l = raw.lookup(Self::STAGE);
        let experiment = l.string(&["name"])?;
        let output_dir = experiment_dir(&l.string(&["train", "output_dir"])?, &experiment);
        let model = match l.get(&["model", "file"]) {
            Some(_) => ModelSource::Custom {
                file: l.string(&["model", "file"])?,
            },
            None => ModelSource::Catalog {
                model_type: l.string(&["model", "type"])?,
            },
        };
        Ok(Self {
            experiment,
            output_dir,
            model,
            model_config_file: l.string(&["model", "config"])?,
            options: l.require(&["train", "options"])?.clone(),
        })
    }

    pub fn is_custom_model(&self) -> bool {
        matches!(self.model, ModelSource::Custom { .. })
    }
}

fn output_data_dir(l: &Lookup<'_>) -> Result<(String, PathBuf), ConfigError> {
    let experiment = l.string(&["name"])?;
    let dir = experiment_dir(&l.string(&["data", "output_dir"])?, &experiment);
    Ok((experiment, dir))
}
