// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Memory-mapped register files (`/dev/gpiomem`, `/dev/mem`, or a plain file in tests)

use std::fs::OpenOptions;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, info};

use super::{RegisterSource, RegisterWords};
use crate::{NativeError, Result};

pub const DEFAULT_GPIO_DEVICE: &str = "/dev/gpiomem";
pub const DEFAULT_MAP_LENGTH: usize = 4096;

/// A mapped register window accessed with volatile 32-bit loads and stores
pub struct MmapRegisterFile {
    mmap: MmapMut,
    words: usize,
}

impl MmapRegisterFile {
    pub fn new(mmap: MmapMut) -> Self {
        let words = mmap.len() / 4;
        Self { mmap, words }
    }
}

impl RegisterWords for MmapRegisterFile {
    fn word_count(&self) -> usize {
        self.words
    }

    fn load(&self, index: usize) -> u32 {
        assert!(index < self.words, "register index {} outside window", index);
        // SAFETY: mapping is page aligned and index is within the window
        unsafe { std::ptr::read_volatile(self.mmap.as_ptr().cast::<u32>().add(index)) }
    }

    fn store(&mut self, index: usize, value: u32) {
        assert!(index < self.words, "register index {} outside window", index);
        // SAFETY: as above, and we hold the only mutable reference to the mapping
        unsafe { std::ptr::write_volatile(self.mmap.as_mut_ptr().cast::<u32>().add(index), value) }
    }
}

/// Register file backed by a device node
#[derive(Debug, Clone)]
pub struct DevMemSource {
    path: PathBuf,
    offset: u64,
    length: usize,
}

impl DevMemSource {
    pub fn new(path: impl Into<PathBuf>, offset: u64, length: usize) -> Self {
        Self {
            path: path.into(),
            offset,
            length,
        }
    }

    /// `/dev/gpiomem`, one page from offset 0
    pub fn gpiomem() -> Self {
        Self::new(DEFAULT_GPIO_DEVICE, 0, DEFAULT_MAP_LENGTH)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mapping_error(&self, source: std::io::Error) -> NativeError {
        NativeError::Mapping {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl RegisterSource for DevMemSource {
    type Words = MmapRegisterFile;

    fn map(&self) -> Result<MmapRegisterFile> {
        debug!(
            "[GPIO] Mapping {} bytes of {} at offset {:#x}",
            self.length,
            self.path.display(),
            self.offset
        );

        let mut options = OpenOptions::new();
        options.read(true).write(true);
        #[cfg(unix)]
        options.custom_flags(libc::O_SYNC);
        let file = options.open(&self.path).map_err(|e| self.mapping_error(e))?;

        // Mapping past the end of a regular file faults on first access
        let metadata = file.metadata().map_err(|e| self.mapping_error(e))?;
        if metadata.is_file() && metadata.len() < self.offset + self.length as u64 {
            return Err(self.mapping_error(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "file is {} bytes, window needs {}",
                    metadata.len(),
                    self.offset + self.length as u64
                ),
            )));
        }

        let mmap = unsafe {
            MmapOptions::new()
                .offset(self.offset)
                .len(self.length)
                .map_mut(&file)
        }
        .map_err(|e| self.mapping_error(e))?;

        info!("[GPIO] Mapped register file {}", self.path.display());
        Ok(MmapRegisterFile::new(mmap))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
