//! Naming primitives shared by every stage: language pairs, corpus paths and
//! the per-experiment directory layout.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Default parent of the per-experiment scratch directory.
pub const DEFAULT_SCRATCH_ROOT: &str = "/tmp";

/// An ordered (source, target) language pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LanguagePair {
    pub src: String,
    pub tgt: String,
}

impl LanguagePair {
    pub fn new(src: impl Into<String>, tgt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            tgt: tgt.into(),
        }
    }

    /// Returns the pair with source and target swapped.
    pub fn reversed(&self) -> Self {
        Self::new(self.tgt.clone(), self.src.clone())
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.src, self.tgt)
    }
}

/// A named bilingual data source.
///
/// Relative corpus paths are resolved against the configured data directory,
/// absolute paths are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusInfo {
    pub name: String,
    pub path: String,
    pub complete_path: String,
}

impl CorpusInfo {
    pub fn new(name: impl Into<String>, data_dir: &str, path: impl Into<String>) -> Self {
        let path = path.into();
        let complete_path = if !path.is_empty() && !path.starts_with('/') {
            format!("{}/{}", data_dir, path)
        } else {
            path.clone()
        };
        Self {
            name: name.into(),
            path,
            complete_path,
        }
    }

    /// `<complete_path>.<src>-<tgt>`
    pub fn complete_path_for_pair(&self, pair: &LanguagePair) -> String {
        format!("{}.{}", self.complete_path, pair)
    }

    /// Last path segment of [`Self::complete_path_for_pair`], used to name the
    /// truncated copies in the scratch directory.
    pub fn filename_prefix_for_pair(&self, pair: &LanguagePair) -> String {
        let full = self.complete_path_for_pair(pair);
        match full.rsplit_once('/') {
            Some((_, last)) => last.to_string(),
            None => full,
        }
    }
}

/// Directories derived from the experiment name.
///
/// Recomputed by every typed stage view; nothing here is cached across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentDirs {
    /// `<data.output_dir>/<name>`
    pub output_data_dir: PathBuf,
    /// `<scratch_root>/<name>`
    pub scratch_dir: PathBuf,
}

impl ExperimentDirs {
    pub fn new(experiment: &str, output_dir: &str, scratch_root: &str) -> Self {
        Self {
            output_data_dir: experiment_dir(output_dir, experiment),
            scratch_dir: experiment_dir(scratch_root, experiment),
        }
    }

    pub fn output_file(&self, filename: &str) -> PathBuf {
        self.output_data_dir.join(filename)
    }

    pub fn scratch_file(&self, filename: &str) -> PathBuf {
        self.scratch_dir.join(filename)
    }
}

/// Joins `name` under `dir`, ignoring trailing slashes on `dir`.
pub fn experiment_dir(dir: &str, name: &str) -> PathBuf {
    PathBuf::from(format!("{}/{}", dir.trim_end_matches('/'), name))
}

/// What the load stage does when a corpus has no files for a language pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MissingDataPolicy {
    /// Look for `<path>.<tgt>-<src>` files before giving up.
    pub try_reversed_pairs: bool,
    /// Abort the run instead of skipping the corpus.
    pub exit_on_error: bool,
}

impl MissingDataPolicy {
    pub const TRY_REVERSED: &'static str = "try_reversed_lg_pairs";
    pub const EXIT_ERROR: &'static str = "exit_error";

    /// Builds the policy from the `data.on_missing_data` flag list.
    ///
    /// Unknown flags are reported back so the caller can log them.
    pub fn from_flags<'a, I>(flags: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut policy = Self::default();
        let mut unknown = Vec::new();
        for flag in flags {
            match flag {
                Self::TRY_REVERSED => policy.try_reversed_pairs = true,
                Self::EXIT_ERROR => policy.exit_on_error = true,
                other => unknown.push(other.to_string()),
            }
        }
        (policy, unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_pair_display_and_reverse() {
        let pair = LanguagePair::new("en", "fr");
        assert_eq!(pair.to_string(), "en-fr");

        let reversed = pair.reversed();
        assert_eq!(reversed, LanguagePair::new("fr", "en"));
        assert_eq!(reversed.to_string(), "fr-en");
        assert_eq!(reversed.reversed(), pair);
    }

    #[test]
    fn test_corpus_relative_path_joined_under_data_dir() {
        let corpus = CorpusInfo::new("europarl", "/data/raw", "europarl/ep");
        assert_eq!(corpus.complete_path, "/data/raw/europarl/ep");

        let pair = LanguagePair::new("en", "de");
        assert_eq!(
            corpus.complete_path_for_pair(&pair),
            "/data/raw/europarl/ep.en-de"
        );
        assert_eq!(corpus.filename_prefix_for_pair(&pair), "ep.en-de");
    }

    #[test]
    fn test_corpus_absolute_path_kept() {
        let corpus = CorpusInfo::new("news", "/data/raw", "/mnt/news/nc");
        assert_eq!(corpus.complete_path, "/mnt/news/nc");
        let pair = LanguagePair::new("fr", "en");
        assert_eq!(corpus.filename_prefix_for_pair(&pair), "nc.fr-en");
    }

    #[test]
    fn test_filename_prefix_without_directory() {
        let corpus = CorpusInfo::new("local", ".", "");
        assert_eq!(corpus.complete_path, "");
        let pair = LanguagePair::new("en", "fr");
        assert_eq!(corpus.filename_prefix_for_pair(&pair), ".en-fr");
    }

    #[test]
    fn test_experiment_dirs_strip_trailing_slash() {
        let dirs = ExperimentDirs::new("exp1", "/data/out///", "/tmp");
        assert_eq!(dirs.output_data_dir, PathBuf::from("/data/out/exp1"));
        assert_eq!(dirs.scratch_dir, PathBuf::from("/tmp/exp1"));
        assert_eq!(
            dirs.output_file("train.en"),
            PathBuf::from("/data/out/exp1/train.en")
        );
    }

    #[test]
    fn test_experiment_dir_root() {
        assert_eq!(experiment_dir("/", "exp"), PathBuf::from("/exp"));
    }

    #[test]
    fn test_missing_data_policy_flags() {
        let (policy, unknown) =
            MissingDataPolicy::from_flags(["try_reversed_lg_pairs", "bogus", "exit_error"]);
        assert!(policy.try_reversed_pairs);
        assert!(policy.exit_on_error);
        assert_eq!(unknown, vec!["bogus".to_string()]);

        let (policy, unknown) = MissingDataPolicy::from_flags(std::iter::empty());
        assert_eq!(policy, MissingDataPolicy::default());
        assert!(unknown.is_empty());
    }
}
