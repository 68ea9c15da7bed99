// src/io/container.rs
/*!
A small **chunked, random-access container** for dense complex datasets.

# File layout

```text
magic (8 bytes) | header length (u64 LE) | JSON header | chunk slot 0 | chunk slot 1 | ...
```

The JSON header records a group name, an arbitrary user metadata record and
at most one dataset descriptor (name, element type, shape, chunk shape, filter).
Each chunk slot stores the full chunk payload (edge chunks are padded to the
full chunk shape) followed by its Fletcher-32 checksum when the filter is on.
Slots are laid out row-major over the chunk grid and preallocated when the
dataset is created, so an all-zero slot is a valid, unwritten chunk.

Element bytes are stored in native order; the header records the byte order and
files of the other order are rejected. A contiguous dataset is a single chunk
the size of the whole shape.

# Access

`write_hyperslab` and `read_hyperslab` select a rectangular `[offset, offset + count)`
region, visit every overlapping chunk and copy contiguous runs along the last
axis. Writes are read-modify-write on whole chunks and go straight to disk; an
LRU [`ChunkCache`] keeps chunks that were read for repeated access.

[`ChunkedFile::open_dataset`] opens read-only, so archived files on read-only
mounts stay loadable; [`ChunkedFile::open_dataset_mut`] is needed to write.
*/

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cache::ChunkCache;
use super::checksum::fletcher32;
use super::{Dtype, IoScalar};
use crate::error::{Error, Result};

const MAGIC: &[u8; 8] = b"A2ACHNK1";
const PREAMBLE: u64 = 16;

/// Descriptor of the dataset stored in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDesc {
    pub name: String,
    pub dtype: Dtype,
    pub shape: Vec<usize>,
    pub chunk: Vec<usize>,
    pub chunked: bool,
    pub fletcher32: bool,
    pub little_endian: bool,
}

impl DatasetDesc {
    #[inline]
    fn chunk_elems(&self) -> usize {
        self.chunk.iter().product()
    }

    #[inline]
    fn payload_bytes(&self) -> usize {
        self.chunk_elems() * self.dtype.size()
    }

    #[inline]
    fn slot_bytes(&self) -> usize {
        self.payload_bytes() + if self.fletcher32 { 4 } else { 0 }
    }

    /// Number of chunks along each axis.
    fn chunk_grid(&self) -> Vec<usize> {
        self.shape.iter().zip(&self.chunk).map(|(&n, &c)| n.div_ceil(c)).collect()
    }

    fn chunk_count(&self) -> usize {
        self.chunk_grid().iter().product()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    group: String,
    metadata: serde_json::Value,
    dataset: Option<DatasetDesc>,
}

fn write_header(path: &Path, file: &mut File, header: &Header) -> Result<u64> {
    let json = serde_json::to_vec(header)?;
    let io = |e| Error::io(path, e);
    file.seek(SeekFrom::Start(0)).map_err(io)?;
    file.write_all(MAGIC).map_err(io)?;
    file.write_all(&(json.len() as u64).to_le_bytes()).map_err(io)?;
    file.write_all(&json).map_err(io)?;
    Ok(PREAMBLE + json.len() as u64)
}

fn read_header(path: &Path, file: &mut File) -> Result<(Header, u64)> {
    let io = |e| Error::io(path, e);
    let mut pre = [0u8; PREAMBLE as usize];
    file.read_exact(&mut pre).map_err(io)?;
    if &pre[..8] != MAGIC {
        return Err(Error::storage(path, "not a chunked container (bad magic)"));
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&pre[8..]);
    let len = u64::from_le_bytes(len);
    let mut json = vec![0u8; len as usize];
    file.read_exact(&mut json).map_err(io)?;
    let header: Header = serde_json::from_slice(&json)?;
    Ok((header, PREAMBLE + len))
}

// ======================================================================================
// ------------------------------------- Container --------------------------------------
// ======================================================================================

/// A container file: one metadata group, at most one dataset.
#[derive(Debug)]
pub struct ChunkedFile {
    path: PathBuf,
    header: Header,
    data_offset: u64,
}

impl ChunkedFile {
    /// Create (or truncate) `path` with a group holding `metadata`.
    pub fn create(path: impl AsRef<Path>, group: &str, metadata: serde_json::Value) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let header = Header { group: group.to_owned(), metadata, dataset: None };
        let data_offset = write_header(&path, &mut file, &header)?;
        Ok(Self { path, header, data_offset })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let (header, data_offset) = read_header(&path, &mut file)?;
        Ok(Self { path, header, data_offset })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn group(&self) -> &str {
        &self.header.group
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.header.metadata
    }

    /// Create the dataset `name` inside the group and preallocate its chunk slots.
    ///
    /// `chunk == None` makes a contiguous dataset.
    pub fn create_dataset(
        &mut self,
        name: &str,
        dtype: Dtype,
        shape: &[usize],
        chunk: Option<&[usize]>,
        fletcher32: bool,
    ) -> Result<Dataset> {
        if self.header.dataset.is_some() {
            return Err(Error::storage(&self.path, format!("dataset already exists in group `{}`", self.header.group)));
        }
        let chunked = chunk.is_some();
        let chunk = chunk.unwrap_or(shape).to_vec();
        if shape.is_empty() || chunk.len() != shape.len() || chunk.iter().any(|&c| c == 0) {
            return Err(Error::storage(
                &self.path,
                format!("invalid chunk shape {chunk:?} for dataset shape {shape:?}"),
            ));
        }
        let desc = DatasetDesc {
            name: name.to_owned(),
            dtype,
            shape: shape.to_vec(),
            chunk,
            chunked,
            fletcher32,
            little_endian: cfg!(target_endian = "little"),
        };
        self.header.dataset = Some(desc.clone());

        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;
        self.data_offset = write_header(&self.path, &mut file, &self.header)?;
        let total = self.data_offset + (desc.chunk_count() * desc.slot_bytes()) as u64;
        file.set_len(total).map_err(|e| Error::io(&self.path, e))?;
        debug!(
            path = %self.path.display(),
            dataset = %name,
            shape = ?desc.shape,
            chunk = ?desc.chunk,
            chunks = desc.chunk_count(),
            "dataset created"
        );
        drop(file);

        Dataset::attach(&self.path, desc, self.data_offset, true)
    }

    /// Open the dataset at `group/name` for reading.
    pub fn open_dataset(&self, dataset_path: &str) -> Result<Dataset> {
        self.find_dataset(dataset_path, false)
    }

    /// Open the dataset at `group/name` for reading and writing.
    pub fn open_dataset_mut(&self, dataset_path: &str) -> Result<Dataset> {
        self.find_dataset(dataset_path, true)
    }

    fn find_dataset(&self, dataset_path: &str, writable: bool) -> Result<Dataset> {
        let missing = || Error::storage(&self.path, format!("no dataset `{dataset_path}`"));
        let desc = self.header.dataset.clone().ok_or_else(missing)?;
        if dataset_path != format!("{}/{}", self.header.group, desc.name) {
            return Err(missing());
        }
        if desc.little_endian != cfg!(target_endian = "little") {
            return Err(Error::storage(&self.path, "dataset byte order differs from this machine"));
        }
        Dataset::attach(&self.path, desc, self.data_offset, writable)
    }
}

// ======================================================================================
// -------------------------------------- Dataset ---------------------------------------
// ======================================================================================

/// An open dataset. Holds the file handle and the chunk cache until dropped.
#[derive(Debug)]
pub struct Dataset {
    path: PathBuf,
    file: File,
    desc: DatasetDesc,
    data_offset: u64,
    writable: bool,
    cache: ChunkCache,
}

/// Visit every index in `[lo, hi)` in row-major order.
fn odometer<F>(lo: &[usize], hi: &[usize], mut f: F) -> Result<()>
where
    F: FnMut(&[usize]) -> Result<()>,
{
    if lo.iter().zip(hi).any(|(l, h)| l >= h) {
        return Ok(());
    }
    let mut idx = lo.to_vec();
    loop {
        f(&idx)?;
        let mut d = idx.len();
        loop {
            if d == 0 {
                return Ok(());
            }
            d -= 1;
            idx[d] += 1;
            if idx[d] < hi[d] {
                break;
            }
            idx[d] = lo[d];
        }
    }
}

#[inline]
fn flat(idx: &[usize], base: &[usize], dims: &[usize]) -> usize {
    idx.iter().zip(base).zip(dims).fold(0, |acc, ((&i, &b), &n)| acc * n + (i - b))
}

/// Call `f(src, dst, run)` for every last-axis run of the intersection between
/// the selection `[offset, offset + count)` and the chunk at chunk coordinate `cc`.
/// `src` indexes the selection buffer, `dst` the chunk payload.
fn for_each_run<F>(offset: &[usize], count: &[usize], cc: &[usize], chunk: &[usize], mut f: F) -> Result<()>
where
    F: FnMut(usize, usize, usize),
{
    let r = offset.len();
    let base: Vec<usize> = cc.iter().zip(chunk).map(|(&c, &n)| c * n).collect();
    let lo: Vec<usize> = (0..r).map(|d| offset[d].max(base[d])).collect();
    let hi: Vec<usize> = (0..r).map(|d| (offset[d] + count[d]).min(base[d] + chunk[d])).collect();
    let run = hi[r - 1] - lo[r - 1];
    let mut outer = hi.clone();
    outer[r - 1] = lo[r - 1] + 1;
    odometer(&lo, &outer, |idx| {
        f(flat(idx, offset, count), flat(idx, &base, chunk), run);
        Ok(())
    })
}

impl Dataset {
    fn attach(path: &Path, desc: DatasetDesc, data_offset: u64, writable: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(Self { path: path.to_path_buf(), file, desc, data_offset, writable, cache: ChunkCache::default() })
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn desc(&self) -> &DatasetDesc {
        &self.desc
    }

    pub fn shape(&self) -> &[usize] {
        &self.desc.shape
    }

    pub fn dtype(&self) -> Dtype {
        self.desc.dtype
    }

    /// Chunk shape, or `None` for a contiguous dataset.
    pub fn chunk_dims(&self) -> Option<&[usize]> {
        self.desc.chunked.then_some(self.desc.chunk.as_slice())
    }

    /// Replace the chunk cache with one of `slots` entries and `bytes` payload bytes.
    pub fn set_chunk_cache(&mut self, slots: usize, bytes: usize) {
        self.cache = ChunkCache::new(slots, bytes);
    }

    /// Write `data` (row-major over `count`) into the region at `offset`.
    pub fn write_hyperslab<T: IoScalar>(&mut self, offset: &[usize], count: &[usize], data: &[T]) -> Result<()> {
        if !self.writable {
            return Err(Error::storage(&self.path, "dataset was opened read-only"));
        }
        let (lo, hi) = self.select::<T>(offset, count, data.len())?;
        let chunk = self.desc.chunk.clone();
        let grid = self.desc.chunk_grid();
        odometer(&lo, &hi, |cc| {
            let key = flat(cc, &vec![0; cc.len()], &grid);
            let mut words = self.load_chunk(key)?;
            {
                let elems: &mut [T] = bytemuck::cast_slice_mut(&mut words);
                for_each_run(offset, count, cc, &chunk, |src, dst, run| {
                    elems[dst..dst + run].copy_from_slice(&data[src..src + run]);
                })?;
            }
            self.store_chunk(key, &words)
        })
    }

    /// Read the region at `offset` into `out` (row-major over `count`).
    pub fn read_hyperslab<T: IoScalar>(&mut self, offset: &[usize], count: &[usize], out: &mut [T]) -> Result<()> {
        let (lo, hi) = self.select::<T>(offset, count, out.len())?;
        let chunk = self.desc.chunk.clone();
        let grid = self.desc.chunk_grid();
        odometer(&lo, &hi, |cc| {
            let key = flat(cc, &vec![0; cc.len()], &grid);
            self.with_chunk(key, |words| {
                let elems: &[T] = bytemuck::cast_slice(words);
                for_each_run(offset, count, cc, &chunk, |src, dst, run| {
                    out[src..src + run].copy_from_slice(&elems[dst..dst + run]);
                })
            })?
        })
    }

    /// Validate a selection and return the range of chunk coordinates it overlaps.
    fn select<T: IoScalar>(&self, offset: &[usize], count: &[usize], len: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        let shape = &self.desc.shape;
        if T::DTYPE != self.desc.dtype {
            return Err(Error::storage(
                &self.path,
                format!("element type {:?} does not match dataset type {:?}", T::DTYPE, self.desc.dtype),
            ));
        }
        if offset.len() != shape.len() || count.len() != shape.len() {
            return Err(Error::shape("hyperslab rank", &[shape.len()], &[offset.len(), count.len()]));
        }
        let end: Vec<usize> = offset.iter().zip(count).map(|(o, c)| o + c).collect();
        if end.iter().zip(shape).any(|(e, n)| e > n) {
            return Err(Error::shape("hyperslab bounds", shape, &end));
        }
        let elems = count.iter().product::<usize>();
        if len != elems {
            return Err(Error::shape("hyperslab buffer", &[elems], &[len]));
        }
        if elems == 0 {
            return Ok((vec![0; shape.len()], vec![0; shape.len()]));
        }
        let chunk = &self.desc.chunk;
        let lo = offset.iter().zip(chunk).map(|(o, c)| o / c).collect();
        let hi = end.iter().zip(chunk).map(|(e, c)| (e - 1) / c + 1).collect();
        Ok((lo, hi))
    }

    #[inline]
    fn slot_offset(&self, key: usize) -> u64 {
        self.data_offset + (key * self.desc.slot_bytes()) as u64
    }

    /// Run `f` on the payload of chunk `key`, from the cache or from disk.
    fn with_chunk<R>(&mut self, key: usize, f: impl FnOnce(&[u64]) -> R) -> Result<R> {
        if let Some(words) = self.cache.get(key) {
            return Ok(f(words));
        }
        let words = self.read_chunk(key)?;
        let r = f(&words);
        self.cache.insert(key, words);
        Ok(r)
    }

    fn load_chunk(&mut self, key: usize) -> Result<Vec<u64>> {
        if let Some(words) = self.cache.get(key) {
            return Ok(words.to_vec());
        }
        self.read_chunk(key)
    }

    fn read_chunk(&mut self, key: usize) -> Result<Vec<u64>> {
        let offset = self.slot_offset(key);
        let path = &self.path;
        let io = |e| Error::io(path, e);
        let mut words = vec![0u64; self.desc.payload_bytes() / 8];
        self.file.seek(SeekFrom::Start(offset)).map_err(io)?;
        self.file.read_exact(bytemuck::cast_slice_mut(&mut words)).map_err(io)?;
        if self.desc.fletcher32 {
            let mut stored = [0u8; 4];
            self.file.read_exact(&mut stored).map_err(io)?;
            let computed = fletcher32(bytemuck::cast_slice(&words));
            if u32::from_le_bytes(stored) != computed {
                return Err(Error::storage(path, format!("checksum mismatch in chunk {key}")));
            }
        }
        Ok(words)
    }

    fn store_chunk(&mut self, key: usize, words: &[u64]) -> Result<()> {
        let offset = self.slot_offset(key);
        let path = &self.path;
        let io = |e| Error::io(path, e);
        let bytes: &[u8] = bytemuck::cast_slice(words);
        self.file.seek(SeekFrom::Start(offset)).map_err(io)?;
        self.file.write_all(bytes).map_err(io)?;
        if self.desc.fletcher32 {
            self.file.write_all(&fletcher32(bytes).to_le_bytes()).map_err(io)?;
        }
        self.cache.invalidate(key);
        Ok(())
    }
}
