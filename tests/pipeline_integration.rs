//! Integration tests for a full pipeline run.
//!
//! External tools are replaced by small `/bin/sh` scripts written into a
//! temporary directory, so these tests only need a POSIX shell.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use autonmt::config::{ConfigError, RawConfig};
use autonmt::pipeline::{MissingConfigPolicy, Pipeline, PipelineOptions};
use autonmt::stages::{StageError, StageKind};
use autonmt::PipelineError;
use tempfile::TempDir;

const LOWERCASE_SCRIPT: &str = r#"#!/bin/sh
dir=$1
shift
for f in "$@"; do
  tr 'A-Z' 'a-z' < "$dir/$f" > "$dir/$f.lc"
  echo "$f.lc"
done
"#;

const FAILING_SCRIPT: &str = r#"#!/bin/sh
echo "cannot clean $2" >&2
exit 3
"#;

/// Appends its first argument to `calls.log` next to itself. Acting as the
/// tokenizer, it also copies stdin to stdout; as the vocabulary builder it
/// writes one line to each output stream.
const RECORD_TOOL: &str = r#"#!/bin/sh
name=$1
shift
echo "$name" >> "$(dirname "$0")/calls.log"
if [ "$name" = tokenize ]; then cat; fi
if [ "$name" = build_vocab ]; then
  echo "vocab built"
  echo "vocab warning" >&2
fi
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().unwrap(),
        };
        ws.write("raw/europarl.en-fr.en", "Hello\nGood Morning\nBye\n");
        ws.write("raw/europarl.en-fr.fr", "Bonjour\nBon Matin\nSalut\n");
        ws.write("raw/news.fr-en.en", "World News\n");
        ws.write("raw/news.fr-en.fr", "Nouvelles\n");
        ws.script("scripts/lowercase.sh", LOWERCASE_SCRIPT);
        ws.script("scripts/fail.sh", FAILING_SCRIPT);
        ws.script("tools/record.sh", RECORD_TOOL);
        ws
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn script(&self, rel: &str, content: &str) {
        self.write(rel, content);
        let path = self.path(rel);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.path("tools/calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn tool(&self, name: &str) -> String {
        format!("[/bin/sh, {}, {}]", self.path("tools/record.sh").display(), name)
    }

    /// A complete experiment document. `on_missing_data` and the
    /// preprocessing script are the knobs tests turn.
    fn config(&self, on_missing_data: &str, script: &str) -> String {
        let root = self.dir.path().display();
        format!(
            r#"
name: enfr
data:
  dir: {root}/raw
  output_dir: {root}/out
  scratch_dir: {root}/scratch
  src_lgs: [en]
  tgt_lgs: [fr]
  max_entries_per_corpus: 2
  on_missing_data: [{on_missing_data}]
  corpora:
    europarl: europarl
    news: news
preprocessing:
  scripts_dir: {root}/scripts
  steps: [clean]
  final_files: [train.en, train.fr]
preprocessing_clean:
  corpora: [europarl, news]
  script: {script}
vocab:
  src:
    save_to: vocab.en
    files: [train.en.tok]
splitting:
  files: [train.en.tok, train.fr.tok]
  parts:
    test: 1
  remain: train
  seed: 7
tools:
  subword_learn: {learn}
  tokenize: {tokenize}
  build_vocab: {vocab}
  split: {split}
"#,
            learn = self.tool("learn"),
            tokenize = self.tool("tokenize"),
            vocab = self.tool("build_vocab"),
            split = self.tool("split"),
        )
    }

    fn pipeline(&self, doc: &str, options: PipelineOptions) -> Pipeline {
        Pipeline::new(RawConfig::from_yaml_str(doc).unwrap(), options)
    }
}

fn exists(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

#[tokio::test]
async fn test_full_run_with_reversed_pair() {
    let ws = Workspace::new();
    let doc = ws.config("try_reversed_lg_pairs", "lowercase.sh");

    let report = ws
        .pipeline(&doc, PipelineOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.executed, StageKind::ALL.to_vec());
    assert!(report.skipped.is_empty());

    // Europarl capped to two lines, news found under the reversed pair and
    // appended after it, everything lowercased by the preprocessing script.
    assert_eq!(ws.read("out/enfr/train.en"), "hello\ngood morning\nworld news\n");
    assert_eq!(ws.read("out/enfr/train.fr"), "bonjour\nbon matin\nnouvelles\n");
    assert_eq!(ws.read("out/enfr/train.en.tok"), ws.read("out/enfr/train.en"));
    assert_eq!(ws.read("out/enfr/train.fr.tok"), ws.read("out/enfr/train.fr"));
    assert_eq!(ws.read("out/enfr/vocab.en.log"), "vocab built\nvocab warning\n");

    assert_eq!(
        ws.calls(),
        vec!["learn", "tokenize", "tokenize", "build_vocab", "split"]
    );
    assert!(!exists(&ws.path("scratch/enfr")));
}

#[tokio::test]
async fn test_scratch_dir_shared_with_output_is_rejected() {
    let ws = Workspace::new();
    let root = ws.dir.path().display().to_string();
    let doc = ws
        .config("try_reversed_lg_pairs", "lowercase.sh")
        .replace(&format!("{}/scratch", root), &format!("{}/out", root));
    ws.write("out/enfr/keep.txt", "previous run\n");
    let options = PipelineOptions::new().with_steps([StageKind::Load]);

    let err = ws.pipeline(&doc, options).run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Config(ConfigError::InvalidValue { ref key, .. }) if key == "data.scratch_dir"
    ));
    assert_eq!(ws.read("out/enfr/keep.txt"), "previous run\n");
}

#[tokio::test]
async fn test_missing_corpus_skipped_without_exit_error() {
    let ws = Workspace::new();
    let doc = ws.config("", "lowercase.sh");
    let options = PipelineOptions::new().with_steps([StageKind::Load]);

    let report = ws.pipeline(&doc, options).run().await.unwrap();

    assert_eq!(report.executed, vec![StageKind::Load]);
    assert_eq!(ws.read("out/enfr/train.en"), "hello\ngood morning\n");
    assert_eq!(ws.read("out/enfr/train.fr"), "bonjour\nbon matin\n");
}

#[tokio::test]
async fn test_missing_corpus_with_exit_error_aborts() {
    let ws = Workspace::new();
    let doc = ws.config("exit_error", "lowercase.sh");

    let err = ws
        .pipeline(&doc, PipelineOptions::default())
        .run()
        .await
        .unwrap_err();

    match err {
        PipelineError::Stage {
            stage: StageKind::Load,
            source: StageError::MissingData { corpus, pair, .. },
        } => {
            assert_eq!(corpus, "news");
            assert_eq!(pair, "en-fr");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!exists(&ws.path("out/enfr/train.en")));
    assert!(ws.calls().is_empty());
}

#[tokio::test]
async fn test_failing_preprocessing_script_stops_pipeline() {
    let ws = Workspace::new();
    let doc = ws.config("try_reversed_lg_pairs", "fail.sh");

    let err = ws
        .pipeline(&doc, PipelineOptions::default())
        .run()
        .await
        .unwrap_err();

    match err {
        PipelineError::Stage {
            source: StageError::Preprocessing { step, corpus, source },
            ..
        } => {
            assert_eq!(step, "clean");
            assert_eq!(corpus, "europarl");
            assert!(source.stderr().unwrap().contains("cannot clean"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(ws.calls().is_empty());
}

#[tokio::test]
async fn test_skip_tokenize_keeps_order_of_remaining_stages() {
    let ws = Workspace::new();
    let doc = ws.config("try_reversed_lg_pairs", "lowercase.sh");
    let options = PipelineOptions::new().with_skip([StageKind::Tokenize]);

    let report = ws.pipeline(&doc, options).run().await.unwrap();

    assert_eq!(
        report.executed,
        vec![StageKind::Load, StageKind::BuildVocab, StageKind::Split]
    );
    assert_eq!(ws.calls(), vec!["build_vocab", "split"]);
}

#[tokio::test]
async fn test_unconfigured_stage_policy() {
    let ws = Workspace::new();
    let full = ws.config("try_reversed_lg_pairs", "lowercase.sh");
    let doc = full.replace("vocab:\n  src:\n    save_to: vocab.en\n    files: [train.en.tok]\n", "");
    let options = PipelineOptions::new().with_steps([StageKind::BuildVocab, StageKind::Split]);

    let report = ws.pipeline(&doc, options.clone()).run().await.unwrap();
    assert_eq!(report.skipped, vec![StageKind::BuildVocab]);
    assert_eq!(report.executed, vec![StageKind::Split]);
    assert_eq!(ws.calls(), vec!["split"]);

    let err = ws
        .pipeline(
            &doc,
            options.with_missing_config_policy(MissingConfigPolicy::Abort),
        )
        .run()
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(StageKind::BuildVocab));
    assert!(err.to_string().contains("vocab"));
    assert_eq!(ws.calls(), vec!["split"]);
}

#[tokio::test]
async fn test_dry_run_plan_has_no_side_effects() {
    let ws = Workspace::new();
    let doc = ws.config("try_reversed_lg_pairs", "lowercase.sh");

    let plan = ws
        .pipeline(&doc, PipelineOptions::default())
        .plan()
        .unwrap();

    assert_eq!(plan.len(), 4);
    assert!(plan.iter().all(|stage| stage.config.is_some()));
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json[0]["stage"], "load");
    assert_eq!(json[3]["config"]["plan"]["seed"], 7);
    assert!(!exists(&ws.path("out")));
    assert!(!exists(&ws.path("scratch")));
}
