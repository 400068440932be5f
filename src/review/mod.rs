//! Human review of proposed names.
//!
//! A [`ReviewSession`] is a small state machine:
//!
//! ```text
//!            edit(index, name)
//!              ┌──────────┐
//!              ▼          │
//!          Proposed ──────┘
//!          │      │
//!  confirm │      │ cancel
//!          ▼      ▼
//!   Confirmed    Cancelled
//! ```
//!
//! It is driven by [`Command`] values, one at a time, so the same logic serves
//! the line-oriented terminal loop in [`terminal`] or any other front end.
//! Every artifact has exactly one proposal at all times.

pub mod terminal;

use std::fmt::Write as _;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::evidence::Candidate;
use crate::matcher::{Matcher, Proposal, Proposals};
use crate::recovery::Artifact;
use crate::size::humanize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Index {0} is not in the list")]
    UnknownIndex(usize),
    #[error("Session is already {0:?}; no further commands are accepted")]
    Closed(SessionState),
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Proposed,
    Confirmed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionState::Proposed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Confirm,
    Cancel,
    /// Replace the proposal for `index`.  A blank name marks it missing.
    Edit { index: usize, name: String },
}

/// The command word typed by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Confirm,
    Edit,
    Cancel,
}

impl Verb {
    /// Case-insensitive; accepts the single-letter and full-word aliases.
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_lowercase().as_str() {
            "y" | "yes" | "confirm"            => Some(Verb::Confirm),
            "e" | "edit"                       => Some(Verb::Edit),
            "c" | "q" | "cancel" | "quit"      => Some(Verb::Cancel),
            _                                  => None,
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReviewSession {
    artifacts:  Vec<Artifact>,
    candidates: Vec<Candidate>,
    proposals:  Proposals,
    state:      SessionState,
    edits:      usize,
}

impl ReviewSession {
    /// Start a session from existing proposals.  Artifacts without a
    /// proposal get `missing`; proposals for unknown artifacts are dropped.
    pub fn new(artifacts: Vec<Artifact>, candidates: Vec<Candidate>, mut proposals: Proposals) -> Self {
        proposals.retain(|index, _| artifacts.iter().any(|a| a.index == *index));
        for a in &artifacts {
            proposals.entry(a.index).or_insert_with(Proposal::missing);
        }
        Self { artifacts, candidates, proposals, state: SessionState::Proposed, edits: 0 }
    }

    /// Start a session with the matcher's proposals.
    pub fn propose(artifacts: Vec<Artifact>, candidates: Vec<Candidate>, matcher: &Matcher) -> Self {
        let proposals = matcher.propose(&artifacts, &candidates);
        Self::new(artifacts, candidates, proposals)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn proposals(&self) -> &Proposals {
        &self.proposals
    }

    pub fn proposal(&self, index: usize) -> Option<&Proposal> {
        self.proposals.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.proposals.contains_key(&index)
    }

    /// Number of edits applied so far.
    pub fn edits(&self) -> usize {
        self.edits
    }

    /// Apply one command.  Errors leave the session unchanged.
    pub fn apply(&mut self, cmd: Command) -> Result<SessionState, ReviewError> {
        if self.state.is_terminal() {
            return Err(ReviewError::Closed(self.state));
        }
        match cmd {
            Command::Confirm => {
                self.state = SessionState::Confirmed;
                info!(edits = self.edits, "names confirmed");
            }
            Command::Cancel => {
                self.state = SessionState::Cancelled;
                info!("review cancelled");
            }
            Command::Edit { index, name } => {
                let slot = self
                    .proposals
                    .get_mut(&index)
                    .ok_or(ReviewError::UnknownIndex(index))?;
                let name = name.trim();
                *slot = if name.is_empty() { Proposal::missing() } else { Proposal::named(name) };
                self.edits += 1;
                debug!(index, proposal = %slot, "edited");
            }
        }
        Ok(self.state)
    }

    pub fn confirm(&mut self) -> Result<SessionState, ReviewError> {
        self.apply(Command::Confirm)
    }

    pub fn cancel(&mut self) -> Result<SessionState, ReviewError> {
        self.apply(Command::Cancel)
    }

    pub fn edit(&mut self, index: usize, name: impl Into<String>) -> Result<SessionState, ReviewError> {
        self.apply(Command::Edit { index, name: name.into() })
    }

    /// One line per artifact, in index order:
    ///
    /// ```text
    ///  1 ABCD.NQF  ->  ABCD.NQF.00000000_ESET.out (47.4 KB)  ->  UltraMP3keygen.exe
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();
        for a in &self.artifacts {
            let source = a
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let proposal = self.proposals.get(&a.index).cloned().unwrap_or_else(Proposal::missing);
            let _ = writeln!(
                out,
                "{:>2} {}  ->  {} ({})  ->  {}",
                a.index,
                source,
                a.output_name(),
                humanize(a.size),
                proposal,
            );
        }
        out
    }

    /// The confirmed mapping, available only once the session is confirmed.
    pub fn into_confirmed(self) -> Option<ConfirmedMapping> {
        match self.state {
            SessionState::Confirmed => Some(ConfirmedMapping {
                artifacts: self.artifacts,
                proposals: self.proposals,
            }),
            _ => None,
        }
    }
}

/// Final names approved by the operator.  Only a confirmed
/// [`ReviewSession`] can produce one.
#[derive(Debug, Clone)]
pub struct ConfirmedMapping {
    artifacts: Vec<Artifact>,
    proposals: Proposals,
}

impl ConfirmedMapping {
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn proposals(&self) -> &Proposals {
        &self.proposals
    }

    /// Artifacts paired with their confirmed name, skipping missing ones.
    pub fn named(&self) -> impl Iterator<Item = (&Artifact, &str)> {
        self.artifacts.iter().filter_map(|a| {
            self.proposals
                .get(&a.index)
                .and_then(|p| p.name.as_deref())
                .map(|name| (a, name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::ProposalFlag;
    use std::path::PathBuf;

    fn artifact(index: usize, size: u64) -> Artifact {
        Artifact {
            index,
            source: PathBuf::from(format!("/q/H{index}.NQF")),
            output: PathBuf::from(format!("/out/H{index}/H{index}.NQF.00000000_ESET.out")),
            size,
            digest: String::new(),
        }
    }

    fn session() -> ReviewSession {
        let arts = vec![artifact(1, 48_550), artifact(2, 2_000), artifact(3, 48_600)];
        let cands = vec![Candidate::new("a.exe", 48_640), Candidate::new("b.exe", 48_640)];
        ReviewSession::propose(arts, cands, &Matcher::default())
    }

    #[test]
    fn verbs() {
        for w in ["y", "Y", "yes", "CONFIRM"] {
            assert_eq!(Verb::parse(w), Some(Verb::Confirm));
        }
        for w in ["e", "Edit"] {
            assert_eq!(Verb::parse(w), Some(Verb::Edit));
        }
        for w in ["c", "q", "cancel", "Quit"] {
            assert_eq!(Verb::parse(w), Some(Verb::Cancel));
        }
        assert_eq!(Verb::parse("maybe"), None);
        assert_eq!(Verb::parse(""), None);
    }

    #[test]
    fn starts_proposed_with_a_proposal_per_artifact() {
        let s = session();
        assert_eq!(s.state(), SessionState::Proposed);
        assert_eq!(s.proposals().len(), 3);
        assert_eq!(s.proposal(1).unwrap().flag, ProposalFlag::Duplicate);
        assert!(s.proposal(2).unwrap().is_missing());
    }

    #[test]
    fn new_fills_gaps_and_drops_strays() {
        let mut props = Proposals::new();
        props.insert(9, Proposal::named("stray.exe"));
        let s = ReviewSession::new(vec![artifact(1, 10)], vec![], props);
        assert_eq!(s.proposals().len(), 1);
        assert!(s.proposal(1).unwrap().is_missing());
    }

    #[test]
    fn edit_with_name_clears_flag() {
        let mut s = session();
        assert_eq!(s.edit(1, "  chosen.exe ").unwrap(), SessionState::Proposed);
        assert_eq!(s.proposal(1), Some(&Proposal::named("chosen.exe")));
        s.edit(2, "was_missing.exe").unwrap();
        assert_eq!(s.proposal(2).unwrap().flag, ProposalFlag::Clear);
        assert_eq!(s.edits(), 2);
    }

    #[test]
    fn blank_edit_marks_missing() {
        let mut s = session();
        s.edit(1, "").unwrap();
        s.edit(3, "   ").unwrap();
        assert_eq!(s.proposal(1), Some(&Proposal::missing()));
        assert_eq!(s.proposal(3), Some(&Proposal::missing()));
    }

    #[test]
    fn edit_unknown_index_changes_nothing() {
        let mut s = session();
        let before = s.proposals().clone();
        assert_eq!(s.edit(42, "x.exe"), Err(ReviewError::UnknownIndex(42)));
        assert_eq!(s.proposals(), &before);
        assert_eq!(s.state(), SessionState::Proposed);
        assert_eq!(s.edits(), 0);
    }

    #[test]
    fn terminal_states_reject_commands() {
        let mut s = session();
        s.cancel().unwrap();
        assert_eq!(s.confirm(), Err(ReviewError::Closed(SessionState::Cancelled)));
        assert_eq!(s.edit(1, "x"), Err(ReviewError::Closed(SessionState::Cancelled)));
        assert!(s.into_confirmed().is_none());

        let mut s = session();
        s.confirm().unwrap();
        assert_eq!(s.cancel(), Err(ReviewError::Closed(SessionState::Confirmed)));
        assert!(s.into_confirmed().is_some());
    }

    #[test]
    fn pending_session_has_no_mapping() {
        assert!(session().into_confirmed().is_none());
    }

    #[test]
    fn render_is_complete_and_deterministic() {
        let mut s = session();
        s.edit(3, "third.rar").unwrap();
        let text = s.render();
        assert_eq!(text, s.render());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            " 1 H1.NQF  ->  H1.NQF.00000000_ESET.out (47.4 KB)  ->  a.exe (possible duplicate)"
        );
        assert!(lines[1].ends_with("->  (missing)"));
        assert!(lines[2].ends_with("->  third.rar"));
    }

    #[test]
    fn confirmed_mapping_skips_missing() {
        let mut s = session();
        s.confirm().unwrap();
        let m = s.into_confirmed().unwrap();
        let named: Vec<(usize, &str)> = m.named().map(|(a, n)| (a.index, n)).collect();
        assert_eq!(named, vec![(1, "a.exe"), (3, "a.exe")]);
    }
}
