use std::env;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

/// Position of one data-loading worker in the global process × worker grid.
///
/// Read once per iterator creation: forked worker processes only learn their
/// `worker_id` at iteration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTopology {
    pub process_rank: usize,
    pub num_processes: usize,
    pub worker_id: usize,
    pub workers_per_process: usize,
}

impl WorkerTopology {
    pub fn new(
        process_rank: usize,
        num_processes: usize,
        worker_id: usize,
        workers_per_process: usize,
    ) -> Self {
        Self {
            process_rank,
            num_processes,
            worker_id,
            workers_per_process,
        }
    }

    /// One process with one in-process worker.
    pub fn single() -> Self {
        Self::new(0, 1, 0, 1)
    }

    /// Reads `RANK`, `WORLD_SIZE`, `WORKER_ID` and `NUM_WORKERS`, falling back
    /// to a single-process, single-worker layout for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var_os(name).map(|value| value.to_string_lossy().into_owned()))
    }

    /// Same as [`from_env`](Self::from_env) with variables resolved by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            process_rank: env_usize_from(&lookup, "RANK", 0)?,
            num_processes: env_usize_from(&lookup, "WORLD_SIZE", 1)?,
            worker_id: env_usize_from(&lookup, "WORKER_ID", 0)?,
            workers_per_process: env_usize_from(&lookup, "NUM_WORKERS", 1)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.num_processes == 0 {
            errors.push("num_processes must be greater than 0".to_string());
        } else if self.process_rank >= self.num_processes {
            errors.push(format!(
                "process_rank {} is out of range for {} process(es)",
                self.process_rank, self.num_processes
            ));
        }
        if self.workers_per_process == 0 {
            errors.push("workers_per_process must be greater than 0".to_string());
        } else if self.worker_id >= self.workers_per_process {
            errors.push(format!(
                "worker_id {} is out of range for {} worker(s) per process",
                self.worker_id, self.workers_per_process
            ));
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }
        Ok(())
    }

    /// Scales rank and world size so every worker of every process gets its
    /// own partition of the corpus.
    pub fn shard_coordinate(&self) -> ShardCoordinate {
        ShardCoordinate {
            scaled_rank: self.process_rank * self.workers_per_process + self.worker_id,
            scaled_world_size: self.num_processes * self.workers_per_process,
        }
    }
}

impl Default for WorkerTopology {
    fn default() -> Self {
        Self::single()
    }
}

fn env_usize_from(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
) -> Result<usize> {
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            Error::invalid_config(format!("{name} must be a non-negative integer, got '{raw}'"))
        }),
        None => Ok(default),
    }
}

/// The `(scaled_rank, scaled_world_size)` pair text sources use to pick a
/// disjoint slice of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardCoordinate {
    pub scaled_rank: usize,
    pub scaled_world_size: usize,
}

impl ShardCoordinate {
    /// Round-robin ownership of item `index`.
    pub fn owns(&self, index: usize) -> bool {
        self.scaled_world_size > 0 && index % self.scaled_world_size == self.scaled_rank
    }

    /// Keeps only the items of `iter` owned by this shard.
    pub fn partition<I>(&self, iter: I) -> impl Iterator<Item = I::Item>
    where
        I: IntoIterator,
    {
        iter.into_iter()
            .skip(self.scaled_rank)
            .step_by(self.scaled_world_size.max(1))
    }
}

impl fmt::Display for ShardCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scaled_rank, self.scaled_world_size)
    }
}

/// Deals the non-blank lines of `source` round-robin into
/// `scaled_world_size * files_per_shard` files under `destination`.
///
/// File `i` is owned by shard `i % scaled_world_size`, so every shard
/// coordinate of that world size gets `files_per_shard` files and line counts
/// differ by at most one between files. Returns the file paths in corpus order.
pub fn split_corpus_for_shards(
    source: &Path,
    destination: &Path,
    prefix: &str,
    scaled_world_size: usize,
    files_per_shard: usize,
) -> Result<Vec<PathBuf>> {
    if scaled_world_size == 0 || files_per_shard == 0 {
        return Err(Error::invalid_config(
            "scaled_world_size and files_per_shard must be greater than zero",
        ));
    }

    fs::create_dir_all(destination)?;
    let num_files = scaled_world_size * files_per_shard;
    let paths: Vec<PathBuf> = (0..num_files)
        .map(|index| destination.join(format!("{prefix}-{index:05}-of-{num_files:05}.txt")))
        .collect();
    let mut writers = paths
        .iter()
        .map(|path| File::create(path).map(BufWriter::new))
        .collect::<std::io::Result<Vec<_>>>()?;

    let mut dealt = 0usize;
    for line in BufReader::new(File::open(source)?).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(writers[dealt % num_files], "{}", line)?;
        dealt += 1;
    }
    for writer in &mut writers {
        writer.flush()?;
    }

    log::info!(
        "dealt {} line(s) of {} into {} file(s) for {} shard(s)",
        dealt,
        source.display(),
        num_files,
        scaled_world_size
    );
    Ok(paths)
}
