//! Evidence gathering: turn a directory of screenshots and text dumps into
//! [`Fragment`]s.
//!
//! Text recognition itself is an external collaborator behind the
//! [`TextRecognizer`] trait.  Plain `.txt` files in the evidence directory are
//! read directly (useful when recognition ran elsewhere); image files are
//! handed to the recognizer, if one is available.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use super::Fragment;

/// Something that can read the text out of an image file.
///
/// Implementations must preserve line order.
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, image: &Path) -> io::Result<String>;
}

// ── Tesseract ─────────────────────────────────────────────────────────────────

/// Runs the `tesseract` command-line tool and captures its stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: PathBuf,
    /// Page segmentation mode; 4 ("single column of variable sizes") suits
    /// file listings.
    psm:     u8,
}

impl TesseractCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), psm: 4 }
    }

    pub fn with_psm(mut self, psm: u8) -> Self {
        self.psm = psm;
        self
    }

    /// `Some` when `program --version` runs successfully.
    pub fn detect(program: impl Into<PathBuf>) -> Option<Self> {
        let tess = Self::new(program);
        let ok = Command::new(&tess.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if ok {
            info!(program = %tess.program.display(), "text recognizer available");
            Some(tess)
        } else {
            debug!(program = %tess.program.display(), "text recognizer not found");
            None
        }
    }
}

impl TextRecognizer for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &Path) -> io::Result<String> {
        let out = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .args(["--psm", &self.psm.to_string()])
            .args(["-c", "preserve_interword_spaces=1"])
            .stderr(Stdio::null())
            .output()?;
        if !out.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {}", self.program.display(), out.status),
            ));
        }
        String::from_utf8(out.stdout).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

// ── Gathering ─────────────────────────────────────────────────────────────────

fn has_extension(path: &Path, exts: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn read_text(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Collect one fragment per evidence file directly inside `dir`, in file name
/// order.  Individual read or recognition failures become failed fragments;
/// only failing to list `dir` itself is an error.
pub fn gather_fragments(
    dir:        &Path,
    image_exts: &[String],
    recognizer: Option<&dyn TextRecognizer>,
) -> io::Result<Vec<Fragment>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let text_ext = ["txt".to_string()];
    let mut fragments = Vec::new();
    for path in paths {
        if has_extension(&path, &text_ext) {
            let text = read_text(&path);
            fragments.push(Fragment { source: path, text });
        } else if has_extension(&path, image_exts) {
            let text = match recognizer {
                Some(r) => {
                    debug!(image = %path.display(), recognizer = r.name(), "recognizing");
                    r.recognize(&path)
                }
                None => Err(io::Error::new(io::ErrorKind::Unsupported, "no text recognizer available")),
            };
            fragments.push(Fragment { source: path, text });
        }
    }
    Ok(fragments)
}
