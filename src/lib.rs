pub mod config;
pub mod crypto;
pub mod evidence;
pub mod logging;
pub mod materialize;
pub mod matcher;
pub mod pipeline;
pub mod recovery;
pub mod report;
pub mod review;
pub mod size;

pub use config::{AppConfig, ExtractConfig, MatchConfig, ScanConfig};
pub use evidence::{Candidate, CandidateExtractor};
pub use matcher::{Matcher, Proposal, ProposalFlag, Proposals};
pub use pipeline::{RecoverError, Recovery};
pub use recovery::Artifact;
pub use review::{Command, ConfirmedMapping, ReviewSession, SessionState};
