//! Round-robin sharding of the master compound index.

use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Shard count must be at least 1")]
    InvalidShardCount,
    #[error("Shard {index} does not exist (partition has {count} shards)")]
    UnknownShard { index: usize, count: usize },
}

/// The compound index split into `N` buckets; line `i` lands in bucket `i mod N`.
///
/// Lines are kept as raw bytes including their terminator, so a bucket is
/// written back exactly as it appeared in the index. Computed once per build
/// and shared read-only by every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPartition {
    buckets: Vec<Vec<Vec<u8>>>,
}

impl ShardPartition {
    /// Partitions identifier lines given without terminators; each is written
    /// back followed by `\n`.
    pub fn new<I, S>(lines: I, shard_count: usize) -> Result<Self, ShardError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_raw_lines(
            lines.into_iter().map(|line| {
                let mut raw = line.into().into_bytes();
                raw.push(b'\n');
                raw
            }),
            shard_count,
        )
    }

    /// Partitions the lines of `reader` byte for byte, keeping `\r\n`
    /// terminators and a missing final newline as they are.
    pub fn from_reader(mut reader: impl BufRead, shard_count: usize) -> Result<Self, ShardError> {
        let mut lines = Vec::new();
        loop {
            let mut raw = Vec::new();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            lines.push(raw);
        }
        Self::from_raw_lines(lines, shard_count)
    }

    fn from_raw_lines(
        lines: impl IntoIterator<Item = Vec<u8>>,
        shard_count: usize,
    ) -> Result<Self, ShardError> {
        if shard_count == 0 {
            return Err(ShardError::InvalidShardCount);
        }
        let mut buckets: Vec<Vec<Vec<u8>>> = vec![Vec::new(); shard_count];
        for (idx, line) in lines.into_iter().enumerate() {
            buckets[idx % shard_count].push(line);
        }
        Ok(Self { buckets })
    }

    pub fn shard_count(&self) -> usize {
        self.buckets.len()
    }

    /// The raw lines of one bucket, terminators included.
    pub fn bucket(&self, index: usize) -> Option<&[Vec<u8>]> {
        self.buckets.get(index).map(Vec::as_slice)
    }

    pub fn bucket_sizes(&self) -> Vec<usize> {
        self.buckets.iter().map(Vec::len).collect()
    }

    /// Writes one bucket exactly as its lines were read.
    pub fn write_bucket_to(&self, index: usize, writer: &mut impl Write) -> Result<(), ShardError> {
        let bucket = self.bucket(index).ok_or(ShardError::UnknownShard {
            index,
            count: self.shard_count(),
        })?;
        for line in bucket {
            writer.write_all(line)?;
        }
        Ok(())
    }

    pub fn bucket_bytes(&self, index: usize) -> Result<Vec<u8>, ShardError> {
        let mut buffer = Vec::new();
        self.write_bucket_to(index, &mut buffer)?;
        Ok(buffer)
    }
}
