//! Container decryption into the output tree.
//!
//! Layout produced under the output root:
//!
//! ```text
//! <output_root>/<stem>/<container_name>.00000000_ESET.out
//! ```
//!
//! The directory `<output_root>/<stem>` is also where named copies are placed
//! once a name is confirmed.  When two containers share a stem (a recursive
//! scan can find `A.NQF` and `sub/A.NQF`), the later one in index order gets
//! `<stem>_<index>` so every artifact owns its directory.  Decrypted outputs
//! are always rewritten so they reflect the current container.

pub mod scanner;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::{decrypt_stream, CIPHER_TAG};
use crate::materialize::copy_if_absent;
pub use scanner::{discover, Container};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Quarantine root {path} cannot be read: {reason}")]
    QuarantineRoot { path: PathBuf, reason: String },
    #[error("Output root {path} cannot be created: {source}")]
    OutputRoot {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// One decrypted container.  Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Index of the container this came from (1-based, path order).
    pub index:  usize,
    /// The `.NQF` container.
    pub source: PathBuf,
    /// The decrypted `.out` file.
    pub output: PathBuf,
    /// Decrypted payload size in bytes.
    pub size:   u64,
    /// BLAKE3 of the decrypted payload, hex.
    pub digest: String,
}

impl Artifact {
    /// Directory holding the decrypted output and any named copies.
    pub fn dir(&self) -> &Path {
        self.output.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn output_name(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A container that could not be decrypted.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedContainer {
    pub index:  usize,
    pub source: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DecryptBatch {
    pub artifacts: Vec<Artifact>,
    pub skipped:   Vec<SkippedContainer>,
}

/// Options for [`decrypt_all`].
#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    /// Also copy the container into its artifact directory (never overwrites).
    pub copy_container: bool,
}

// ── Paths ─────────────────────────────────────────────────────────────────────

/// Output file name for a container name, e.g.
/// `ABCD.NQF` → `ABCD.NQF.00000000_ESET.out`.
pub fn output_file_name(container_name: &str) -> String {
    format!("{container_name}.00000000_{CIPHER_TAG}.out")
}

/// Output file for every container, in container order.  Artifact
/// directories are unique, compared case-insensitively.
pub fn plan_outputs(out_root: &Path, containers: &[Container]) -> Vec<PathBuf> {
    let mut taken: HashSet<String> = HashSet::new();
    containers
        .iter()
        .map(|c| {
            let stem = c.stem();
            let mut dir = stem.clone();
            let mut attempt = 0usize;
            while !taken.insert(dir.to_lowercase()) {
                attempt += 1;
                dir = match attempt {
                    1 => format!("{stem}_{}", c.index),
                    n => format!("{stem}_{}_{n}", c.index),
                };
            }
            out_root.join(dir).join(output_file_name(&c.file_name()))
        })
        .collect()
}

/// Create the output root.  Failure here is fatal and must happen before any
/// container is touched.
pub fn prepare_output_root(out_root: &Path) -> Result<(), ScanError> {
    fs::create_dir_all(out_root).map_err(|source| ScanError::OutputRoot {
        path: out_root.to_path_buf(),
        source,
    })?;
    // create_dir_all succeeds on an existing read-only directory; probe it.
    let probe = out_root.join(".unquarantine-write-probe");
    File::create(&probe)
        .and_then(|_| fs::remove_file(&probe))
        .map_err(|source| ScanError::OutputRoot { path: out_root.to_path_buf(), source })
}

// ── Decryption ────────────────────────────────────────────────────────────────

/// Writer adapter that hashes everything passing through it.
struct DigestWriter<W: Write> {
    inner:  W,
    hasher: blake3::Hasher,
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypt one container to `output`.  A partially written output is
/// removed on failure.
pub fn decrypt_container(
    container: &Container,
    output:    &Path,
    opts:      &DecryptOptions,
) -> io::Result<Artifact> {
    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let reader = BufReader::new(File::open(&container.path)?);
    let mut writer = DigestWriter {
        inner:  BufWriter::new(File::create(output)?),
        hasher: blake3::Hasher::new(),
    };
    let size = match decrypt_stream(reader, &mut writer) {
        Ok(n) => n,
        Err(e) => {
            drop(writer);
            let _ = fs::remove_file(output);
            return Err(e);
        }
    };
    let digest = writer.hasher.finalize().to_hex().to_string();

    if opts.copy_container {
        copy_if_absent(&container.path, &dir.join(container.file_name()))?;
    }

    debug!(index = container.index, output = %output.display(), size, "decrypted");
    Ok(Artifact {
        index: container.index,
        source: container.path.clone(),
        output: output.to_path_buf(),
        size,
        digest,
    })
}

/// Decrypt every container.  Containers that fail are reported in
/// [`DecryptBatch::skipped`]; the rest of the batch continues.  The output
/// root is prepared first and its failure aborts the whole batch.
pub fn decrypt_all(
    containers: &[Container],
    out_root:   &Path,
    opts:       &DecryptOptions,
) -> Result<DecryptBatch, ScanError> {
    prepare_output_root(out_root)?;
    let outputs = plan_outputs(out_root, containers);

    #[cfg(feature = "parallel")]
    let results: Vec<(&Container, io::Result<Artifact>)> = {
        use rayon::prelude::*;
        containers
            .par_iter()
            .zip(outputs.par_iter())
            .map(|(c, out)| (c, decrypt_container(c, out, opts)))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<(&Container, io::Result<Artifact>)> = containers
        .iter()
        .zip(&outputs)
        .map(|(c, out)| (c, decrypt_container(c, out, opts)))
        .collect();

    let mut batch = DecryptBatch::default();
    for (container, result) in results {
        match result {
            Ok(artifact) => batch.artifacts.push(artifact),
            Err(e) => {
                warn!(source = %container.path.display(), "cannot decrypt container: {e}");
                batch.skipped.push(SkippedContainer {
                    index:  container.index,
                    source: container.path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    info!(decrypted = batch.artifacts.len(), skipped = batch.skipped.len(), "decryption finished");
    Ok(batch)
}
