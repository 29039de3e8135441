//! Sampling heap profile backed by jemalloc.
//!
//! jemalloc samples roughly one allocation per 512 KiB allocated, so an active profile costs
//! next to nothing on the hot path. Sampling runs between [`HeapProfile::start`] and
//! [`HeapProfile::capture`]; the dump is jemalloc's `heap_v2` format, readable by `jeprof`.
use std::{
    ffi::CString,
    fs::{self, File},
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tikv_jemalloc_ctl::{epoch, profiling, raw, stats};
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("heap profiling is not enabled in the allocator")]
    Disabled,

    #[error("heap profile path {0} contains a NUL byte")]
    InvalidPath(PathBuf),

    #[error("allocator control {op} failed: {source}")]
    Ctl {
        op: &'static str,
        #[source]
        source: tikv_jemalloc_ctl::Error,
    },

    #[error("cannot create heap profile {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("heap profile {path} was not written: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("heap profile {0} is empty")]
    Empty(PathBuf),
}

pub type ProfileResult<T> = Result<T, ProfileError>;

fn ctl(op: &'static str) -> impl FnOnce(tikv_jemalloc_ctl::Error) -> ProfileError {
    move |source| ProfileError::Ctl { op, source }
}

/// Allocator counters at capture time.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapSummary {
    /// Bytes handed out to the application.
    pub allocated: usize,
    /// Bytes in active pages.
    pub active: usize,
    /// Bytes physically resident.
    pub resident: usize,
}

/// Active heap sampling bound to an output file.
#[derive(Debug)]
pub struct HeapProfile {
    path: PathBuf,
    c_path: CString,
}

impl HeapProfile {
    /// Turn sampling on. Fails if the allocator was started without `prof:true`.
    pub fn start(path: impl Into<PathBuf>) -> ProfileResult<Self> {
        let path = path.into();
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| ProfileError::InvalidPath(path.clone()))?;

        if !profiling::prof::read().map_err(ctl("opt.prof"))? {
            return Err(ProfileError::Disabled);
        }
        set_active(true)?;
        debug!(path = %path.display(), "heap profiling started");
        Ok(Self { path, c_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop sampling and dump the profile.
    ///
    /// The file is created up front so an unwritable path surfaces as an I/O error
    /// rather than a bare allocator status code.
    pub fn capture(self) -> ProfileResult<HeapSummary> {
        set_active(false)?;

        epoch::advance().map_err(ctl("epoch"))?;
        let summary = HeapSummary {
            allocated: stats::allocated::read().map_err(ctl("stats.allocated"))?,
            active: stats::active::read().map_err(ctl("stats.active"))?,
            resident: stats::resident::read().map_err(ctl("stats.resident"))?,
        };

        File::create(&self.path).map_err(|source| ProfileError::Create {
            path: self.path.clone(),
            source,
        })?;
        // SAFETY: `prof.dump` takes a `const char *`; `c_path` outlives the call.
        unsafe { raw::write(b"prof.dump\0", self.c_path.as_ptr()) }.map_err(ctl("prof.dump"))?;

        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() > 0 => Ok(summary),
            Ok(_) => Err(ProfileError::Empty(self.path)),
            Err(source) => Err(ProfileError::Write {
                path: self.path,
                source,
            }),
        }
    }
}

fn set_active(on: bool) -> ProfileResult<()> {
    // SAFETY: `prof.active` is a bool.
    unsafe { raw::write(b"prof.active\0", on) }.map_err(ctl("prof.active"))
}
