use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use log::debug;

use crate::context::RunContext;
use crate::error::Error;
use crate::stats;
use crate::utils::FileRecord;

const BUFFER_SIZE: usize = 64 * 1024;

/// Per-worker hashing state.
///
/// Both hashers and the read buffer are reused from file to file, so a
/// worker allocates them once for its whole lifetime.
pub struct Checksums {
    fast: crc32fast::Hasher,
    strong: blake3::Hasher,
    buffer: Vec<u8>,
}

impl Checksums {
    pub fn new() -> Self {
        Self {
            fast: crc32fast::Hasher::new(),
            strong: blake3::Hasher::new(),
            buffer: vec![0; BUFFER_SIZE],
        }
    }

    /// CRC32 of the whole file, streamed.
    pub fn fast(&mut self, path: &Path) -> io::Result<u32> {
        self.fast.reset();
        let fast = &mut self.fast;
        stream_file(path, &mut self.buffer, |chunk| fast.update(chunk))?;
        Ok(self.fast.clone().finalize())
    }

    /// BLAKE3 of the whole file, streamed.
    pub fn strong(&mut self, path: &Path) -> io::Result<blake3::Hash> {
        self.strong.reset();
        let strong = &mut self.strong;
        stream_file(path, &mut self.buffer, |chunk| {
            strong.update(chunk);
        })?;
        Ok(self.strong.finalize())
    }
}

impl Default for Checksums {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_file(path: &Path, buffer: &mut [u8], mut update: impl FnMut(&[u8])) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut total = 0u64;
    loop {
        let bytes_read = match file.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }
    Ok(total)
}

/// Narrows one size bucket down to the groups that share both checksums.
///
/// Every file gets a fast checksum; only files whose fast checksum collides
/// with another get the strong one. A file that cannot be read is recorded
/// and dropped, the rest of the bucket carries on. Returned groups always
/// hold at least two files.
pub fn narrow_bucket(
    mut records: Vec<FileRecord>,
    checksums: &mut Checksums,
    ctx: &RunContext,
) -> Vec<Vec<FileRecord>> {
    if records.len() < 2 {
        return Vec::new();
    }

    for record in records.iter_mut() {
        match checksums.fast(&record.path) {
            Ok(hash) => {
                record.fast_hash = Some(hash);
                ctx.stats.add(stats::FAST_CHECKSUMS, 1);
            }
            Err(err) => ctx.record(Error::io(&record.path, err)),
        }
    }
    let by_fast = partition(records, |record| record.fast_hash);

    let mut groups = Vec::new();
    for mut candidates in by_fast.into_values() {
        if candidates.len() < 2 {
            continue;
        }
        for record in candidates.iter_mut() {
            match checksums.strong(&record.path) {
                Ok(hash) => {
                    record.strong_hash = Some(hash);
                    ctx.stats.add(stats::STRONG_CHECKSUMS, 1);
                }
                Err(err) => ctx.record(Error::io(&record.path, err)),
            }
        }
        let by_strong = partition(candidates, |record| record.strong_hash);
        groups.extend(by_strong.into_values().filter(|group| group.len() > 1));
    }

    if let Some(first) = groups.first().and_then(|group| group.first()) {
        debug!(
            "{} checksum collision groups for size {}",
            groups.len(),
            first.size
        );
    }
    groups
}

fn partition<K, F>(records: Vec<FileRecord>, key: F) -> HashMap<K, Vec<FileRecord>>
where
    K: std::hash::Hash + Eq,
    F: Fn(&FileRecord) -> Option<K>,
{
    let mut partitions: HashMap<K, Vec<FileRecord>> = HashMap::new();
    for record in records {
        if let Some(k) = key(&record) {
            partitions.entry(k).or_default().push(record);
        }
    }
    partitions
}
