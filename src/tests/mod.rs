// src/tests/mod.rs

mod block_io;
mod checksum_cache;
mod tensors_dense;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use num_complex::Complex;

static SCRATCH_ID: AtomicUsize = AtomicUsize::new(0);

/// Fresh, empty directory under the system temp dir, unique per call.
pub(crate) fn scratch_dir(tag: &str) -> PathBuf {
    let id = SCRATCH_ID.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("nucleon-a2a-{}-{tag}-{id}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub(crate) fn approx_eq(a: Complex<f64>, b: Complex<f64>, eps: f64) -> bool {
    (a - b).norm() <= eps * (1.0 + a.norm().max(b.norm()))
}
