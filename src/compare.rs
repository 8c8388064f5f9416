//! Byte-exact confirmation of checksum collisions.
//!
//! Two strategies produce the same grouping:
//!
//! - **Multi-way**: every file of the group is opened at once and read in
//!   lockstep, one chunk per file per round. A file whose chunk disagrees
//!   with the reference file leaves the round and is rewound; the files that
//!   left are compared again among themselves afterwards, so several
//!   unrelated clusters of identical files inside one group are all found.
//! - **Pairwise**: used when the group is larger than the file-descriptor
//!   budget. At most two files are open at any time.
//!
//! The budget is shared by every worker of a run through [`OpenFileBudget`],
//! so concurrent multi-way comparisons never hold more descriptors than it
//! allows in total.
//!
//! Hard links to the same inode are the same file, never duplicates of one
//! another, and are filtered in both strategies.

use std::collections::HashSet;
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};

use log::debug;

use crate::context::RunContext;
use crate::error::Error;
use crate::stats;
use crate::utils::DuplicateSet;

/// Bytes read from each file per comparison round.
pub const CHUNK_SIZE: usize = 4 * 1024;

/// Identity of the inode behind a path, where the platform exposes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    fn of(file: &File) -> Option<Self> {
        file.metadata().ok().as_ref().and_then(Self::from_metadata)
    }
}

/// Whether hard links can be told apart from copies on this platform.
pub const fn hardlink_detection_supported() -> bool {
    cfg!(unix)
}

/// Descriptors that multi-way comparisons may hold open at once, shared by
/// all workers of a run.
#[derive(Debug)]
pub struct OpenFileBudget {
    capacity: usize,
    available: Mutex<usize>,
    released: Condvar,
}

impl OpenFileBudget {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: Mutex::new(capacity),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserves `count` descriptors, waiting for other holders to release
    /// theirs. Returns `None` when `count` exceeds the whole budget.
    pub fn acquire(&self, count: usize) -> Option<OpenFilePermit<'_>> {
        if count > self.capacity {
            return None;
        }
        let guard = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        let mut available = self
            .released
            .wait_while(guard, |available| *available < count)
            .unwrap_or_else(PoisonError::into_inner);
        *available -= count;
        Some(OpenFilePermit { budget: self, count })
    }
}

/// Reservation returned to the budget on drop.
#[derive(Debug)]
pub struct OpenFilePermit<'a> {
    budget: &'a OpenFileBudget,
    count: usize,
}

impl Drop for OpenFilePermit<'_> {
    fn drop(&mut self) {
        let mut available = self
            .budget
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *available += self.count;
        self.budget.released.notify_all();
    }
}

/// Confirms which files of a checksum-collision group are byte-identical.
///
/// Picks the multi-way strategy when the group fits in the budget, holding
/// a reservation for the whole group while it runs, and the pairwise one
/// otherwise.
pub fn compare_group(paths: &[PathBuf], budget: &OpenFileBudget, ctx: &RunContext) -> Vec<DuplicateSet> {
    if paths.len() < 2 {
        return Vec::new();
    }
    match budget.acquire(paths.len()) {
        Some(_permit) => multiway(paths, ctx),
        None => {
            debug!(
                "Group of {} files exceeds the open file budget of {}, comparing pairwise",
                paths.len(),
                budget.capacity()
            );
            pairwise(paths, ctx)
        }
    }
}

/// A file held open for lockstep reading.
struct OpenFile {
    path: PathBuf,
    reader: BufReader<File>,
    chunk: Vec<u8>,
    filled: usize,
}

impl OpenFile {
    fn open(path: &Path) -> io::Result<(Self, Option<FileIdentity>)> {
        let file = File::open(path)?;
        let identity = FileIdentity::of(&file);
        let open = Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            chunk: vec![0; CHUNK_SIZE],
            filled: 0,
        };
        Ok((open, identity))
    }

    /// Reads the next chunk, returning how many bytes it holds. Zero means
    /// end of file.
    fn advance(&mut self) -> io::Result<usize> {
        self.filled = read_chunk(&mut self.reader, &mut self.chunk)?;
        Ok(self.filled)
    }

    fn bytes(&self) -> &[u8] {
        &self.chunk[..self.filled]
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.filled = 0;
        Ok(())
    }
}

/// Fills `buffer` as far as the reader allows; short only at end of file.
fn read_chunk(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Compares every file of the group simultaneously.
pub fn multiway(paths: &[PathBuf], ctx: &RunContext) -> Vec<DuplicateSet> {
    let mut seen = HashSet::new();
    let mut pending = Vec::with_capacity(paths.len());
    for path in paths {
        match OpenFile::open(path) {
            Ok((file, identity)) => {
                if identity.is_some_and(|id| !seen.insert(id)) {
                    debug!("Skipping hard link: '{}'", path.display());
                    continue;
                }
                pending.push(file);
            }
            Err(err) => ctx.record(Error::io(path, err)),
        }
    }

    let mut sets = Vec::new();
    while pending.len() > 1 {
        let (matched, diverged) = lockstep_round(pending, ctx);
        if matched.len() > 1 {
            sets.push(matched.into_iter().map(|file| file.path).collect());
        }
        pending = diverged;
    }
    sets
}

/// Runs one full pass over `files`, returning the files that matched the
/// first one to its end and the rewound files that diverged from it.
fn lockstep_round(mut files: Vec<OpenFile>, ctx: &RunContext) -> (Vec<OpenFile>, Vec<OpenFile>) {
    ctx.stats.add(stats::FILE_COMPARISONS, files.len() as u64 - 1);
    let mut diverged = Vec::new();

    loop {
        let reference_len = match files[0].advance() {
            Ok(n) => n,
            Err(err) => {
                let reference = files.remove(0);
                ctx.record(Error::io(reference.path, err));
                for mut file in files {
                    match file.rewind() {
                        Ok(()) => diverged.push(file),
                        Err(err) => ctx.record(Error::io(file.path, err)),
                    }
                }
                return (Vec::new(), diverged);
            }
        };

        let mut i = 1;
        while i < files.len() {
            match files[i].advance() {
                Ok(n) if n == reference_len && files[i].bytes() == files[0].bytes() => i += 1,
                Ok(_) => {
                    let mut file = files.remove(i);
                    match file.rewind() {
                        Ok(()) => diverged.push(file),
                        Err(err) => ctx.record(Error::io(file.path, err)),
                    }
                }
                Err(err) => {
                    let file = files.remove(i);
                    ctx.record(Error::io(file.path, err));
                }
            }
        }

        if reference_len == 0 || files.len() < 2 {
            return (files, diverged);
        }
    }
}

/// Compares the group two files at a time.
pub fn pairwise(paths: &[PathBuf], ctx: &RunContext) -> Vec<DuplicateSet> {
    let mut remaining = distinct_files(paths, ctx);
    let mut buffers = (vec![0u8; CHUNK_SIZE], vec![0u8; CHUNK_SIZE]);
    let mut sets = Vec::new();

    while !remaining.is_empty() {
        let first = remaining.remove(0);
        let mut set = vec![first.clone()];
        let mut i = 0;
        while i < remaining.len() {
            ctx.stats.add(stats::FILE_COMPARISONS, 1);
            match files_match(&first, &remaining[i], &mut buffers) {
                Ok(true) => set.push(remaining.remove(i)),
                Ok(false) => i += 1,
                Err(err) => {
                    let reference_failed = err.path() == Some(first.as_path());
                    ctx.record(err);
                    if reference_failed {
                        break;
                    }
                    remaining.remove(i);
                }
            }
        }
        if set.len() > 1 {
            sets.push(set);
        }
    }
    sets
}

/// Keeps the first path seen for each inode, reading metadata only. Paths
/// whose metadata cannot be read are recorded and left out.
fn distinct_files(paths: &[PathBuf], ctx: &RunContext) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut distinct = Vec::with_capacity(paths.len());
    for path in paths {
        match fs::metadata(path) {
            Ok(metadata) => {
                if FileIdentity::from_metadata(&metadata).is_some_and(|id| !seen.insert(id)) {
                    debug!("Skipping hard link: '{}'", path.display());
                    continue;
                }
                distinct.push(path.clone());
            }
            Err(err) => ctx.record(Error::io(path, err)),
        }
    }
    distinct
}

/// Buffered byte-by-byte comparison of two files. Hard links to the same
/// inode never match.
pub fn files_match(
    one: &Path,
    two: &Path,
    buffers: &mut (Vec<u8>, Vec<u8>),
) -> Result<bool, Error> {
    if one == two {
        return Ok(false);
    }
    let file_one = File::open(one).map_err(|err| Error::io(one, err))?;
    let file_two = File::open(two).map_err(|err| Error::io(two, err))?;

    if let (Some(a), Some(b)) = (FileIdentity::of(&file_one), FileIdentity::of(&file_two)) {
        if a == b {
            debug!("'{}' and '{}' are hard links", one.display(), two.display());
            return Ok(false);
        }
    }

    let mut reader_one = BufReader::new(file_one);
    let mut reader_two = BufReader::new(file_two);
    let (buffer_one, buffer_two) = buffers;
    loop {
        let read_one = read_chunk(&mut reader_one, buffer_one).map_err(|err| Error::io(one, err))?;
        let read_two = read_chunk(&mut reader_two, buffer_two).map_err(|err| Error::io(two, err))?;
        if read_one != read_two || buffer_one[..read_one] != buffer_two[..read_two] {
            return Ok(false);
        }
        if read_one == 0 {
            return Ok(true);
        }
    }
}
