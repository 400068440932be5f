//! Size-driven name proposals.
//!
//! Each artifact is known only by its exact decrypted size `S`.  Every
//! candidate `T` within the tolerance band of `S` is a match:
//!
//! ```text
//! |S - T| / T  <=  tolerance(S)      (2 % at or above 1 MiB, 3 % below)
//! ```
//!
//! The distinct names among the matches decide the proposal: none gives
//! `missing`, one gives that name, several give the first one in candidate
//! order flagged `duplicate`.  This is a greedy, per-artifact choice: the same
//! candidate may be proposed for several artifacts.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::MatchConfig;
use crate::evidence::Candidate;
use crate::recovery::Artifact;

// ── Proposal ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalFlag {
    /// Exactly one name fits, or a human chose the name.
    #[serde(rename = "none")]
    Clear,
    /// Several names fit; the first was taken.
    Duplicate,
    /// No name.
    Missing,
}

/// Current name assignment for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proposal {
    /// `None` is the "missing" sentinel.
    pub name: Option<String>,
    pub flag: ProposalFlag,
}

impl Proposal {
    pub const MISSING_LABEL: &'static str = "(missing)";

    pub fn missing() -> Self {
        Self { name: None, flag: ProposalFlag::Missing }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), flag: ProposalFlag::Clear }
    }

    pub fn duplicate(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), flag: ProposalFlag::Duplicate }
    }

    pub fn is_missing(&self) -> bool {
        self.name.is_none()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(Self::MISSING_LABEL)
    }

    /// Annotation shown after the name in listings.
    pub fn label(&self) -> Option<&'static str> {
        match self.flag {
            ProposalFlag::Clear     => None,
            ProposalFlag::Duplicate => Some("(possible duplicate)"),
            ProposalFlag::Missing   => Some(Self::MISSING_LABEL),
        }
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.flag) {
            (None, _) => f.write_str(Self::MISSING_LABEL),
            (Some(n), ProposalFlag::Duplicate) => write!(f, "{n} (possible duplicate)"),
            (Some(n), _) => f.write_str(n),
        }
    }
}

/// Proposals keyed by artifact index, in index order.
pub type Proposals = BTreeMap<usize, Proposal>;

// ── Matcher ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    cfg: MatchConfig,
}

impl Matcher {
    pub fn new(cfg: MatchConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.cfg
    }

    /// `|size - target| / target`, or `None` for a zero target.
    pub fn relative_deviation(size: u64, target: u64) -> Option<f64> {
        if target == 0 {
            return None;
        }
        Some((size as f64 - target as f64).abs() / target as f64)
    }

    /// Whether an artifact of `size` bytes can be a file displayed as `target`.
    pub fn within_tolerance(&self, size: u64, target: u64) -> bool {
        Self::relative_deviation(size, target)
            .map(|dev| dev <= self.cfg.tolerance_for(size))
            .unwrap_or(false)
    }

    /// Indices into `candidates` of every candidate matching `size`, in
    /// candidate order.
    pub fn matches(&self, size: u64, candidates: &[Candidate]) -> Vec<usize> {
        if size < self.cfg.min_artifact_size {
            return Vec::new();
        }
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| self.within_tolerance(size, c.size))
            .map(|(i, _)| i)
            .collect()
    }

    /// Artifact index → matching candidate indices, computed once for all
    /// artifacts.
    pub fn match_table(&self, artifacts: &[Artifact], candidates: &[Candidate]) -> BTreeMap<usize, Vec<usize>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            artifacts
                .par_iter()
                .map(|a| (a.index, self.matches(a.size, candidates)))
                .collect::<Vec<_>>()
                .into_iter()
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            artifacts
                .iter()
                .map(|a| (a.index, self.matches(a.size, candidates)))
                .collect()
        }
    }

    /// One proposal per artifact.  Pure: no I/O, same output for same input.
    pub fn propose(&self, artifacts: &[Artifact], candidates: &[Candidate]) -> Proposals {
        self.match_table(artifacts, candidates)
            .into_iter()
            .map(|(index, hits)| {
                let proposal = decide(&hits, candidates);
                debug!(index, matches = hits.len(), proposal = %proposal, "proposed");
                (index, proposal)
            })
            .collect()
    }
}

/// Reduce candidate hits to distinct names and pick the proposal.
fn decide(hits: &[usize], candidates: &[Candidate]) -> Proposal {
    let mut names: Vec<&str> = Vec::new();
    for &i in hits {
        let name = candidates[i].name.as_str();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    match names.as_slice() {
        []        => Proposal::missing(),
        [only]    => Proposal::named(*only),
        [first, ..] => Proposal::duplicate(*first),
    }
}
