use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, seq::SliceRandom};

use crate::config::{CorpusFormat, DataConfig};
use crate::errors::{Error, Result};
use crate::sharding::ShardCoordinate;

/// Corpus-specific producer of raw text units.
///
/// Implementations must hand out disjoint slices of the corpus for distinct
/// shard coordinates; nothing downstream detects overlap, so a violation
/// silently duplicates training data. Calling `stream` again for the same
/// coordinate must yield the same partition again, possibly reordered when
/// `shuffle` is set.
pub trait TextSource {
    type Stream: Iterator<Item = Result<String>>;

    fn stream(
        &self,
        shard: ShardCoordinate,
        shuffle: bool,
        rng: &mut StdRng,
    ) -> Result<Self::Stream>;
}

/// Placeholder for a dataset whose corpus was never wired in.
///
/// Streaming from it is a programming error and panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedSource;

impl TextSource for UnimplementedSource {
    type Stream = std::iter::Empty<Result<String>>;

    fn stream(&self, _: ShardCoordinate, _: bool, _: &mut StdRng) -> Result<Self::Stream> {
        unimplemented!("text source must implement `TextSource::stream`")
    }
}

/// Texts held in memory, dealt round-robin over shards by record index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    texts: Vec<String>,
}

impl InMemoryCorpus {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

impl TextSource for InMemoryCorpus {
    type Stream = std::vec::IntoIter<Result<String>>;

    fn stream(
        &self,
        shard: ShardCoordinate,
        shuffle: bool,
        rng: &mut StdRng,
    ) -> Result<Self::Stream> {
        let mut owned: Vec<String> = shard.partition(self.texts.iter().cloned()).collect();
        if shuffle {
            owned.shuffle(rng);
        }
        Ok(owned.into_iter().map(Ok).collect::<Vec<_>>().into_iter())
    }
}

/// Text or JSONL files dealt round-robin over shards by file index.
///
/// Workers never share a file, so a corpus needs at least as many files as
/// there are shards for every worker to get data.
#[derive(Clone, Debug)]
pub struct ShardedFileCorpus {
    files: Vec<PathBuf>,
    format: CorpusFormat,
    text_field: String,
}

impl ShardedFileCorpus {
    pub fn new(
        files: Vec<PathBuf>,
        format: CorpusFormat,
        text_field: impl Into<String>,
    ) -> Result<Self> {
        if files.is_empty() {
            return Err(Error::invalid_config("expected at least one file for corpus"));
        }

        log::info!(
            "ShardedFileCorpus::new with {} file(s), format={:?}",
            files.len(),
            format
        );

        Ok(Self {
            files,
            format,
            text_field: text_field.into(),
        })
    }

    pub fn from_config(config: &DataConfig) -> Result<Self> {
        Self::new(config.files.clone(), config.format, config.text_field.clone())
    }

    pub fn file_paths(&self) -> &[PathBuf] {
        &self.files
    }

    /// Files owned by `shard`, in corpus order.
    pub fn files_for(&self, shard: ShardCoordinate) -> Vec<PathBuf> {
        self.files
            .iter()
            .enumerate()
            .filter(|(index, _)| shard.owns(*index))
            .map(|(_, path)| path.clone())
            .collect()
    }
}

impl TextSource for ShardedFileCorpus {
    type Stream = FileShardStream;

    fn stream(
        &self,
        shard: ShardCoordinate,
        shuffle: bool,
        rng: &mut StdRng,
    ) -> Result<Self::Stream> {
        let mut files = self.files_for(shard);
        if files.is_empty() {
            log::warn!(
                "shard {} owns none of the {} corpus file(s)",
                shard,
                self.files.len()
            );
        }
        if shuffle {
            files.shuffle(rng);
        }

        Ok(FileShardStream {
            files,
            next_file: 0,
            current: None,
            format: self.format,
            text_field: self.text_field.clone(),
        })
    }
}

struct OpenFile {
    path: PathBuf,
    lines: io::Lines<BufReader<File>>,
    line_number: usize,
}

/// Lazily reads the files of one shard, one at a time.
pub struct FileShardStream {
    files: Vec<PathBuf>,
    next_file: usize,
    current: Option<OpenFile>,
    format: CorpusFormat,
    text_field: String,
}

impl FileShardStream {
    fn open_next(&mut self) -> Option<Result<()>> {
        let path = self.files.get(self.next_file)?.clone();
        self.next_file += 1;
        log::debug!(
            "streaming file {} of {} -> {}",
            self.next_file,
            self.files.len(),
            path.display()
        );

        Some(File::open(&path).map_err(Error::from).map(|file| {
            self.current = Some(OpenFile {
                path,
                lines: BufReader::new(file).lines(),
                line_number: 0,
            });
        }))
    }

    fn extract(&self, path: &Path, line_number: usize, line: String) -> Result<String> {
        match self.format {
            CorpusFormat::Text => Ok(line),
            CorpusFormat::Jsonl => {
                let record: serde_json::Value = serde_json::from_str(&line)
                    .map_err(|err| Error::record(path, line_number, err.to_string()))?;
                record
                    .get(&self.text_field)
                    .and_then(|value| value.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::record(
                            path,
                            line_number,
                            format!("missing string field '{}'", self.text_field),
                        )
                    })
            }
        }
    }
}

impl Iterator for FileShardStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(open) = self.current.as_mut() {
                match open.lines.next() {
                    Some(Ok(line)) => {
                        open.line_number += 1;
                        if line.trim().is_empty() {
                            continue;
                        }
                        let (path, line_number) = (open.path.clone(), open.line_number);
                        return Some(self.extract(&path, line_number, line));
                    }
                    Some(Err(err)) => return Some(Err(err.into())),
                    None => {
                        self.current = None;
                        continue;
                    }
                }
            }

            match self.open_next()? {
                Ok(()) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
