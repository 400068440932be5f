//! High-level [`Recovery`] API tying the stages together.
//!
//! ```no_run
//! use std::path::Path;
//! use unquarantine::config::AppConfig;
//! use unquarantine::pipeline::Recovery;
//!
//! let mut rec = Recovery::decrypt(Path::new("quarantine"), Path::new("out"), AppConfig::default())?;
//! rec.gather_evidence(Some(Path::new("screenshots")), None)?;
//! let mut session = rec.review_session();
//! session.confirm()?;
//! let report = rec.finish(session);
//! println!("{} copies", report.copies_made());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::{AppConfig, ConfigError};
use crate::evidence::ocr::{gather_fragments, TextRecognizer};
use crate::evidence::{Candidate, CandidateExtractor, ExtractError};
use crate::materialize::materialize;
use crate::matcher::Matcher;
use crate::recovery::{decrypt_all, discover, Artifact, DecryptBatch, DecryptOptions, ScanError};
use crate::report::{EvidenceReport, EvidenceStatus, RunReport};
use crate::review::ReviewSession;

#[derive(Error, Debug)]
pub enum RecoverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// State of one recovery run between decryption and materialization.
#[derive(Debug)]
pub struct Recovery {
    cfg:              AppConfig,
    quarantine:       PathBuf,
    output:           PathBuf,
    containers_found: usize,
    batch:            DecryptBatch,
    evidence:         EvidenceReport,
}

impl Recovery {
    /// Discover and decrypt every container.  Only a bad configuration, an
    /// unreadable quarantine root or an unwritable output root fail here;
    /// individual containers that cannot be read are recorded and skipped.
    pub fn decrypt(quarantine: &Path, output: &Path, cfg: AppConfig) -> Result<Self, RecoverError> {
        cfg.validate()?;
        let containers = discover(quarantine, &cfg.scan.container_extension)?;
        info!(root = %quarantine.display(), found = containers.len(), "scanning quarantine");

        let opts = DecryptOptions { copy_container: cfg.scan.copy_container };
        let batch = decrypt_all(&containers, output, &opts)?;

        Ok(Self {
            cfg,
            quarantine:       quarantine.to_path_buf(),
            output:           output.to_path_buf(),
            containers_found: containers.len(),
            batch,
            evidence:         EvidenceReport::default(),
        })
    }

    /// Read name evidence.  A missing or unreadable directory degrades to no
    /// candidates rather than failing.
    pub fn gather_evidence(
        &mut self,
        dir:        Option<&Path>,
        recognizer: Option<&dyn TextRecognizer>,
    ) -> Result<(), RecoverError> {
        let extractor = CandidateExtractor::new(&self.cfg.extract)?;
        let Some(dir) = dir else {
            self.evidence = EvidenceReport::default();
            return Ok(());
        };

        let mut report = EvidenceReport { directory: Some(dir.to_path_buf()), ..EvidenceReport::default() };
        match gather_fragments(dir, &self.cfg.scan.image_extensions, recognizer) {
            Ok(fragments) => {
                let extraction = extractor.extract_fragments(fragments);
                report.status = if extraction.candidates.is_empty() {
                    EvidenceStatus::NoCandidates
                } else {
                    EvidenceStatus::Found
                };
                report.fragments_used = extraction.fragments_used;
                report.skipped = extraction.skipped;
                report.candidates = extraction.candidates;
            }
            Err(e) => {
                report.status = EvidenceStatus::Unavailable { reason: e.to_string() };
            }
        }
        info!(candidates = report.candidates.len(), "evidence gathered");
        self.evidence = report;
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn batch(&self) -> &DecryptBatch {
        &self.batch
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.batch.artifacts
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.evidence.candidates
    }

    pub fn evidence(&self) -> &EvidenceReport {
        &self.evidence
    }

    /// A fresh review session holding the matcher's proposals.
    pub fn review_session(&self) -> ReviewSession {
        let matcher = Matcher::new(self.cfg.matching.clone());
        ReviewSession::propose(self.batch.artifacts.clone(), self.evidence.candidates.clone(), &matcher)
    }

    /// Close the run.  Named copies are written only when `session` was
    /// confirmed.
    pub fn finish(self, session: ReviewSession) -> RunReport {
        let mut report = RunReport::new(
            &self.quarantine,
            &self.output,
            self.containers_found,
            session.artifacts(),
            session.proposals(),
        );
        report.skipped_containers = self.batch.skipped;
        report.evidence = self.evidence;
        report.outcome = session.state();
        if let Some(mapping) = session.into_confirmed() {
            report.materialized = Some(materialize(&mapping));
        }
        report
    }
}
