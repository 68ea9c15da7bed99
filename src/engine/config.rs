// src/engine/config.rs
//! Engine parameters, loadable from JSON.
//!
//! ```json
//! { "n_ext": 7, "n_str": 1, "block_size": 64, "cache_block_size": 8, "io_mode": "parallel" }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::NS;

/// How finished tiles are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// Each rank writes the external indices `e` with `e mod n_ranks == rank`.
    #[default]
    Parallel,
    /// Every rank writes every external index. For testing only.
    Serial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of external indices (one output file each).
    pub n_ext: usize,
    /// Extent of the structure axis, at most `N_S`.
    pub n_str: usize,
    /// Outer block size `B`.
    pub block_size: usize,
    /// Inner cache block size `b`.
    pub cache_block_size: usize,
    #[serde(default)]
    pub io_mode: IoMode,
}

impl EngineConfig {
    pub fn new(n_ext: usize, n_str: usize, block_size: usize, cache_block_size: usize) -> Self {
        Self { n_ext, n_str, block_size, cache_block_size, io_mode: IoMode::default() }
    }

    pub fn with_io_mode(mut self, io_mode: IoMode) -> Self {
        self.io_mode = io_mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_ext == 0 {
            return Err(Error::InvalidConfig("n_ext must be positive".into()));
        }
        if self.n_str == 0 || self.n_str > NS {
            return Err(Error::InvalidConfig(format!("n_str must be in 1..={NS}, got {}", self.n_str)));
        }
        if self.block_size == 0 || self.cache_block_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "block sizes must be positive, got block {} and cache block {}",
                self.block_size, self.cache_block_size
            )));
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text)
    }
}
