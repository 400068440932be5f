//! End-of-run report: what was decrypted, what was skipped, which names were
//! proposed and confirmed, and what was written.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::evidence::{Candidate, SkippedFragment};
use crate::materialize::MaterializeSummary;
use crate::matcher::{Proposal, ProposalFlag, Proposals};
use crate::recovery::{Artifact, SkippedContainer};
use crate::review::SessionState;
use crate::size::humanize;

/// Whether any name evidence was usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceStatus {
    /// No evidence directory was given.
    NotProvided,
    /// The evidence directory could not be read.
    Unavailable { reason: String },
    /// Evidence was read but yielded no candidates.
    NoCandidates,
    Found,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceReport {
    pub directory:      Option<PathBuf>,
    pub status:         EvidenceStatus,
    pub fragments_used: usize,
    pub skipped:        Vec<SkippedFragment>,
    pub candidates:     Vec<Candidate>,
}

impl Default for EvidenceReport {
    fn default() -> Self {
        Self {
            directory:      None,
            status:         EvidenceStatus::NotProvided,
            fragments_used: 0,
            skipped:        Vec::new(),
            candidates:     Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    #[serde(flatten)]
    pub artifact: Artifact,
    pub proposal: Proposal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at:       String,
    pub quarantine_root:    PathBuf,
    pub output_root:        PathBuf,
    pub containers_found:   usize,
    pub artifacts:          Vec<ArtifactEntry>,
    pub skipped_containers: Vec<SkippedContainer>,
    pub evidence:           EvidenceReport,
    pub outcome:            SessionState,
    pub materialized:       Option<MaterializeSummary>,
}

impl RunReport {
    pub fn new(
        quarantine_root:  &Path,
        output_root:      &Path,
        containers_found: usize,
        artifacts:        &[Artifact],
        proposals:        &Proposals,
    ) -> Self {
        let artifacts = artifacts
            .iter()
            .map(|a| ArtifactEntry {
                artifact: a.clone(),
                proposal: proposals.get(&a.index).cloned().unwrap_or_else(Proposal::missing),
            })
            .collect();
        Self {
            generated_at:       chrono::Local::now().to_rfc3339(),
            quarantine_root:    quarantine_root.to_path_buf(),
            output_root:        output_root.to_path_buf(),
            containers_found,
            artifacts,
            skipped_containers: Vec::new(),
            evidence:           EvidenceReport::default(),
            outcome:            SessionState::Proposed,
            materialized:       None,
        }
    }

    /// Number of named copies written.
    pub fn copies_made(&self) -> usize {
        self.materialized.as_ref().map(|m| m.copied()).unwrap_or(0)
    }

    /// Every skipped or degraded condition, one line each.
    pub fn issues(&self) -> Vec<String> {
        let mut out = Vec::new();
        for s in &self.skipped_containers {
            out.push(format!("[skip] #{} {}: {}", s.index, s.source.display(), s.reason));
        }
        match &self.evidence.status {
            EvidenceStatus::NotProvided => {
                out.push("[ocr] no evidence directory given; all names are missing".into())
            }
            EvidenceStatus::Unavailable { reason } => {
                out.push(format!("[ocr] evidence unavailable ({reason}); all names are missing"))
            }
            EvidenceStatus::NoCandidates => {
                out.push("[ocr] evidence produced no candidates; all names are missing".into())
            }
            EvidenceStatus::Found => {}
        }
        for f in &self.evidence.skipped {
            out.push(format!("[ocr] skipped {}: {}", f.source.display(), f.reason));
        }
        let ambiguous = self.artifacts.iter().filter(|e| e.proposal.flag == ProposalFlag::Duplicate).count();
        if ambiguous > 0 && self.outcome == SessionState::Confirmed {
            out.push(format!("[!] {ambiguous} name(s) confirmed while flagged as possible duplicates"));
        }
        if let Some(m) = &self.materialized {
            for t in &m.existing {
                out.push(format!("[exists] {}", t.display()));
            }
            for f in &m.failed {
                out.push(format!("[err] #{} {}: {}", f.index, f.name, f.reason));
            }
        }
        out
    }

    /// Human-readable summary lines.
    pub fn summary(&self) -> Vec<String> {
        let mut out = vec![format!(
            "[i] {} container(s) found, {} decrypted, {} skipped",
            self.containers_found,
            self.artifacts.len(),
            self.skipped_containers.len(),
        )];
        let total: u64 = self.artifacts.iter().map(|e| e.artifact.size).sum();
        out.push(format!("[i] {} decrypted in total", humanize(total)));
        out.push(format!(
            "[i] {} candidate name(s) from {} evidence fragment(s)",
            self.evidence.candidates.len(),
            self.evidence.fragments_used,
        ));
        out.extend(self.issues());
        out.push(match self.outcome {
            SessionState::Confirmed => format!(
                "[✓] Done. Created {} named copy/copies next to .out files.",
                self.copies_made()
            ),
            SessionState::Cancelled => "[!] Cancelled. No named copies were written.".into(),
            SessionState::Proposed  => "[i] Names not yet confirmed.".into(),
        });
        out.push(format!("    Output root: {}", self.output_root.display()));
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}
