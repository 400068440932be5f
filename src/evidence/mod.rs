//! Candidate extraction: turn recognized screenshot text into
//! `(file name, approximate size)` pairs.
//!
//! Screenshots of download folders, archive listings and browser download
//! panels show a file name and, somewhere close by, a rounded size such as
//! `47.5 KB`.  The extractor scans each text fragment line by line:
//!
//! 1. every token of filename-safe characters ending in an allow-listed
//!    extension is a filename match;
//! 2. the size for a match is the first size token found on the same line,
//!    then the next line, then the previous line (widening up to
//!    [`ExtractConfig::size_window`] lines);
//! 3. matches without a size, or with a size of zero, are dropped.
//!
//! Results of all fragments are merged in order and deduplicated on
//! `(lower-cased name, size)`, keeping the first occurrence.

pub mod ocr;

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExtractConfig;
use crate::size::parse_size;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Extension allow-list is empty")]
    NoExtensions,
    #[error("Filename pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// A name seen in the evidence together with the size displayed next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Bare file name, path components stripped.
    pub name: String,
    /// Displayed size converted to bytes (binary units).
    pub size: u64,
}

impl Candidate {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), size }
    }
}

/// One unit of evidence text, e.g. the recognized text of one screenshot.
#[derive(Debug)]
pub struct Fragment {
    pub source: PathBuf,
    pub text:   io::Result<String>,
}

/// A fragment that could not be used.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFragment {
    pub source: PathBuf,
    pub reason: String,
}

/// Merged result over a batch of fragments.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub candidates:     Vec<Candidate>,
    pub fragments_used: usize,
    pub skipped:        Vec<SkippedFragment>,
}

// ── Extractor ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    filename_re: Regex,
    window:      usize,
}

impl CandidateExtractor {
    pub fn new(cfg: &ExtractConfig) -> Result<Self, ExtractError> {
        let exts: Vec<String> = cfg
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.'))
            .filter(|e| !e.is_empty())
            .map(regex::escape)
            .collect();
        if exts.is_empty() {
            return Err(ExtractError::NoExtensions);
        }
        let alt = exts.join("|");
        // Lazy name part so adjacent columns are not swallowed; chained
        // extensions (`.tar.gz`) are kept together.
        let pattern = format!(r"(?i)[A-Za-z0-9_\-()\[\].\s]+?\.(?:{alt})(?:\.(?:{alt}))*\b");
        Ok(Self {
            filename_re: Regex::new(&pattern)?,
            window:      cfg.size_window,
        })
    }

    /// Extract candidates from a single text blob, deduplicated.
    pub fn extract(&self, text: &str) -> Vec<Candidate> {
        dedup(self.scan(text))
    }

    /// Extract from many fragments.  Fragments that failed upstream are
    /// recorded in [`Extraction::skipped`] and do not stop the batch.
    pub fn extract_fragments<I>(&self, fragments: I) -> Extraction
    where
        I: IntoIterator<Item = Fragment>,
    {
        let fragments: Vec<Fragment> = fragments.into_iter().collect();

        #[cfg(feature = "parallel")]
        let per_fragment: Vec<Result<Vec<Candidate>, SkippedFragment>> = {
            use rayon::prelude::*;
            fragments.into_par_iter().map(|f| self.scan_fragment(f)).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let per_fragment: Vec<Result<Vec<Candidate>, SkippedFragment>> =
            fragments.into_iter().map(|f| self.scan_fragment(f)).collect();

        let mut merged = Vec::new();
        let mut out = Extraction::default();
        for result in per_fragment {
            match result {
                Ok(cands) => {
                    out.fragments_used += 1;
                    merged.extend(cands);
                }
                Err(skip) => {
                    warn!(source = %skip.source.display(), reason = %skip.reason, "skipping evidence fragment");
                    out.skipped.push(skip);
                }
            }
        }
        out.candidates = dedup(merged);
        debug!(candidates = out.candidates.len(), skipped = out.skipped.len(), "evidence extracted");
        out
    }

    fn scan_fragment(&self, fragment: Fragment) -> Result<Vec<Candidate>, SkippedFragment> {
        match fragment.text {
            Ok(text) => {
                let found = self.scan(&text);
                debug!(source = %fragment.source.display(), found = found.len(), "scanned fragment");
                Ok(found)
            }
            Err(e) => Err(SkippedFragment { source: fragment.source, reason: e.to_string() }),
        }
    }

    /// Raw, undeduplicated scan in line order.
    fn scan(&self, text: &str) -> Vec<Candidate> {
        let lines: Vec<&str> = text.lines().collect();
        let mut out = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let mut line_size = None;
            for m in self.filename_re.find_iter(line) {
                let Some(name) = normalize_name(m.as_str()) else { continue };
                match *line_size.get_or_insert_with(|| self.size_near(&lines, i)) {
                    Some(bytes) if bytes > 0 => out.push(Candidate { name, size: bytes }),
                    _ => debug!(%name, line = i + 1, "no size near filename"),
                }
            }
        }
        out
    }

    fn size_near(&self, lines: &[&str], i: usize) -> Option<u64> {
        if let Some(s) = parse_size(lines[i]) {
            return Some(s);
        }
        for d in 1..=self.window {
            if let Some(s) = lines.get(i + d).and_then(|l| parse_size(l)) {
                return Some(s);
            }
            if let Some(s) = i.checked_sub(d).and_then(|j| parse_size(lines[j])) {
                return Some(s);
            }
        }
        None
    }
}

/// Strip directories (either separator) and surrounding whitespace.
/// Returns `None` for names with nothing before the extension.
fn normalize_name(raw: &str) -> Option<String> {
    let unified = raw.replace('\\', "/");
    let base = unified.rsplit('/').next().unwrap_or("").trim();
    if base.is_empty() || base.starts_with('.') {
        return None;
    }
    Some(base.to_string())
}

/// Drop repeated `(lower-cased name, size)` pairs, keeping first occurrences.
pub fn dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert((c.name.to_lowercase(), c.size)))
        .collect()
}
