use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use pretraining_data::{
    collate, split_corpus_for_shards, CorpusFormat, FileDataset, HfTokenizer,
    LanguageModelDataset, LmDatasetConfig, PipelineConfig, ShardedFileCorpus, TextTokenizer,
    WorkerTopology,
};
use serde_json::json;
use tempfile::tempdir;

const DOCS: usize = 40;

/// Word-level tokenizer where `d{n}` maps to id `n + 2`.
fn write_tokenizer(dir: &Path) -> PathBuf {
    let mut vocab = serde_json::Map::new();
    vocab.insert("<pad>".into(), json!(0));
    vocab.insert("<unk>".into(), json!(1));
    for n in 0..DOCS {
        vocab.insert(format!("d{n}"), json!(n + 2));
    }

    let tokenizer = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "<unk>" }
    });

    let path = dir.join("tokenizer.json");
    fs::write(&path, serde_json::to_string_pretty(&tokenizer).unwrap()).unwrap();
    path
}

/// Doc `n` repeats its word `n % 7 + 1` times.
fn doc_text(n: usize) -> String {
    vec![format!("d{n}"); n % 7 + 1].join(" ")
}

fn write_jsonl_corpus(dir: &Path, files: usize) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for f in 0..files {
        let path = dir.join(format!("part-{f:02}.jsonl"));
        let body: Vec<String> = (0..DOCS)
            .filter(|n| n % files == f)
            .map(|n| json!({ "text": doc_text(n), "id": n }).to_string())
            .collect();
        fs::write(&path, body.join("\n")).unwrap();
        paths.push(path);
    }
    paths
}

fn write_pipeline(dir: &Path, files: &[PathBuf], dataset: &str) -> PathBuf {
    let names: Vec<String> = files
        .iter()
        .map(|p| format!("\"{}\"", p.file_name().unwrap().to_string_lossy()))
        .collect();
    let path = dir.join("pipeline.toml");
    fs::write(
        &path,
        format!(
            "[dataset]\n{dataset}\n\n[tokenizer]\ntokenizer_json = \"tokenizer.json\"\n\n[data]\nfiles = [{}]\nformat = \"jsonl\"\n",
            names.join(", ")
        ),
    )
    .unwrap();
    path
}

#[test]
fn grid_of_workers_covers_corpus_exactly_once() {
    let tmp = tempdir().unwrap();
    write_tokenizer(tmp.path());
    let files = write_jsonl_corpus(tmp.path(), 8);
    let pipeline = write_pipeline(
        tmp.path(),
        &files,
        "sequence_length = 4\nshuffle_data = true\nrandom_seed = 3",
    );
    let config = PipelineConfig::from_path(&pipeline).unwrap();

    let mut seen = BTreeSet::new();
    for process_rank in 0..2 {
        for worker_id in 0..2 {
            let mut dataset = FileDataset::from_pipeline(&config).unwrap();
            let topology = WorkerTopology::new(process_rank, 2, worker_id, 2);
            for sample in dataset.iter_with(&topology).unwrap() {
                let sample = sample.unwrap();
                assert_eq!(sample.samples.len(), 4);
                assert_eq!(sample.targets.len(), 4);
                let doc = sample.samples[0] as usize - 2;
                assert!(seen.insert(doc), "doc {doc} produced twice");
            }
        }
    }

    assert_eq!(seen, (0..DOCS).collect());
}

#[test]
fn filters_and_framing_apply_end_to_end() {
    let tmp = tempdir().unwrap();
    write_tokenizer(tmp.path());
    let files = write_jsonl_corpus(tmp.path(), 2);
    let pipeline = write_pipeline(
        tmp.path(),
        &files,
        "sequence_length = 5\nmin_tokens_per_text = 3",
    );
    let config = PipelineConfig::from_path(&pipeline).unwrap();
    let mut dataset = FileDataset::from_pipeline(&config).unwrap();
    assert_eq!(dataset.pad_token_id(), 0);
    assert_eq!(dataset.vocab_size(), DOCS + 2);

    let samples = dataset
        .iter_with(&WorkerTopology::single())
        .unwrap()
        .collect::<pretraining_data::Result<Vec<_>>>()
        .unwrap();

    let expected = (0..DOCS).filter(|n| n % 7 + 1 >= 3).count();
    assert_eq!(samples.len(), expected);

    for sample in &samples {
        let id = sample.samples[0];
        let n_tokens = (id as usize - 2) % 7 + 1;
        let buffer = sample.content_buffer();
        assert_eq!(buffer.len(), 6);
        for (pos, &token) in buffer.iter().enumerate() {
            if pos < n_tokens {
                assert_eq!(token, id);
            } else {
                assert_eq!(token, 0);
            }
        }
    }

    let batch = collate(&samples[..2], &candle_core::Device::Cpu).unwrap();
    assert_eq!(batch.samples.dims(), &[2, 5]);
}

#[test]
fn split_corpus_feeds_every_worker() {
    let tmp = tempdir().unwrap();
    let tokenizer = HfTokenizer::from_file(write_tokenizer(tmp.path())).unwrap();

    let source = tmp.path().join("corpus.txt");
    let lines: Vec<String> = (0..DOCS).map(doc_text).collect();
    fs::write(&source, lines.join("\n")).unwrap();
    let shards =
        split_corpus_for_shards(&source, &tmp.path().join("shards"), "train", 3, 2).unwrap();
    assert_eq!(shards.len(), 6);

    let corpus = ShardedFileCorpus::new(shards, CorpusFormat::Text, "text").unwrap();
    let config = LmDatasetConfig {
        sequence_length: 2,
        ..LmDatasetConfig::default()
    };
    let mut dataset = LanguageModelDataset::new(config, corpus, &tokenizer).unwrap();

    let mut total = 0;
    for worker_id in 0..3 {
        let topology = WorkerTopology::new(0, 1, worker_id, 3);
        let produced = dataset.iter_with(&topology).unwrap().count();
        assert!(produced > 0, "worker {worker_id} got no samples");
        total += produced;
    }
    assert_eq!(total, DOCS);
    assert_eq!(tokenizer.encode("d5 d6").unwrap(), vec![7, 8]);
}
