//! Named copies of decrypted artifacts.
//!
//! For every confirmed, non-missing name the decrypted `.out` file is copied
//! to `<artifact dir>/<name>`.  A target that already exists is left alone and
//! counted as such; it is never overwritten.  The existence check and the
//! creation of the target are a single `create_new` open, and targets are
//! processed one at a time, so two artifacts confirmed with the same name
//! produce exactly one copy.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::recovery::Artifact;
use crate::review::ConfirmedMapping;

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("'{0}' is not a usable file name")]
    InvalidName(String),
    #[error("Copy to {target} failed: {source}")]
    Io {
        target: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A copy that could not be made.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCopy {
    pub index:  usize,
    pub name:   String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializeSummary {
    /// Targets written by this run.
    pub created:  Vec<PathBuf>,
    /// Targets that already existed (or were claimed earlier in this run).
    pub existing: Vec<PathBuf>,
    pub failed:   Vec<FailedCopy>,
}

impl MaterializeSummary {
    /// Number of copies actually made.
    pub fn copied(&self) -> usize {
        self.created.len()
    }
}

/// Where the named copy of `artifact` goes.  Directory parts of `name` are
/// dropped so the copy always lands beside the decrypted output.
pub fn target_path(artifact: &Artifact, name: &str) -> Result<PathBuf, MaterializeError> {
    let unified = name.trim().replace('\\', "/");
    let base = unified.rsplit('/').next().unwrap_or("").trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(MaterializeError::InvalidName(name.to_string()));
    }
    Ok(artifact.dir().join(base))
}

/// Copy `src` to `dst` unless `dst` exists.  Returns whether a copy was made.
/// A partially written target is removed on failure.
pub fn copy_if_absent(src: &Path, dst: &Path) -> io::Result<bool> {
    let target = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };

    let result = (|| -> io::Result<()> {
        let mut reader = BufReader::new(File::open(src)?);
        let mut writer = BufWriter::new(target);
        io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        let perms = fs::metadata(src)?.permissions();
        fs::set_permissions(dst, perms)
    })();

    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            let _ = fs::remove_file(dst);
            Err(e)
        }
    }
}

/// Write the named copies for a confirmed mapping.
pub fn materialize(mapping: &ConfirmedMapping) -> MaterializeSummary {
    let mut summary = MaterializeSummary::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for (artifact, name) in mapping.named() {
        let outcome = target_path(artifact, name).and_then(|target| {
            if !claimed.insert(target.clone()) {
                return Ok((target, false));
            }
            copy_if_absent(&artifact.output, &target)
                .map(|made| (target.clone(), made))
                .map_err(|source| MaterializeError::Io { target, source })
        });

        match outcome {
            Ok((target, true)) => {
                debug!(index = artifact.index, target = %target.display(), "named copy created");
                summary.created.push(target);
            }
            Ok((target, false)) => {
                debug!(index = artifact.index, target = %target.display(), "target exists, left untouched");
                summary.existing.push(target);
            }
            Err(e) => {
                warn!(index = artifact.index, "{e}");
                summary.failed.push(FailedCopy {
                    index:  artifact.index,
                    name:   name.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        created = summary.created.len(),
        existing = summary.existing.len(),
        failed = summary.failed.len(),
        "materialization finished"
    );
    summary
}
