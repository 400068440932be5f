use std::fs;
use std::path::Path;

use tempfile::TempDir;
use unquarantine::config::AppConfig;
use unquarantine::crypto::encrypt;
use unquarantine::materialize::materialize;
use unquarantine::matcher::{Proposal, ProposalFlag};
use unquarantine::pipeline::{RecoverError, Recovery};
use unquarantine::recovery::ScanError;
use unquarantine::report::EvidenceStatus;
use unquarantine::review::{terminal, SessionState};

struct Fixture {
    quarantine: TempDir,
    output:     TempDir,
    evidence:   TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            quarantine: tempfile::tempdir().unwrap(),
            output:     tempfile::tempdir().unwrap(),
            evidence:   tempfile::tempdir().unwrap(),
        }
    }

    /// Write a container whose decrypted payload is `plain`.
    fn container(&self, name: &str, plain: &[u8]) {
        fs::write(self.quarantine.path().join(name), encrypt(plain)).unwrap();
    }

    fn evidence_text(&self, name: &str, text: &str) {
        fs::write(self.evidence.path().join(name), text).unwrap();
    }

    fn recovery(&self) -> Recovery {
        Recovery::decrypt(self.quarantine.path(), self.output.path(), AppConfig::default()).unwrap()
    }

    fn artifact_dir(&self, stem: &str) -> std::path::PathBuf {
        self.output.path().join(stem)
    }
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn keygen_scenario_restores_one_name() {
    let fx = Fixture::new();
    let plain = payload(48_550);
    fx.container("8F2A.NQF", &plain);
    fx.evidence_text("downloads.txt", "Name                 Size\nUltraMP3keygen.exe   47.5 KB\n");

    let mut rec = fx.recovery();
    rec.gather_evidence(Some(fx.evidence.path()), None).unwrap();
    assert_eq!(rec.candidates().len(), 1);
    assert_eq!(rec.candidates()[0].size, 48_640);

    let mut session = rec.review_session();
    assert_eq!(session.proposal(1), Some(&Proposal::named("UltraMP3keygen.exe")));
    session.confirm().unwrap();

    let report = rec.finish(session);
    assert_eq!(report.outcome, SessionState::Confirmed);
    assert_eq!(report.copies_made(), 1);

    let dir = fx.artifact_dir("8F2A");
    assert_eq!(dir_names(&dir), vec!["8F2A.NQF.00000000_ESET.out", "UltraMP3keygen.exe"]);
    assert_eq!(fs::read(dir.join("UltraMP3keygen.exe")).unwrap(), plain);
}

#[test]
fn no_candidates_means_no_copies() {
    let fx = Fixture::new();
    fx.container("0001.NQF", &payload(2_000));

    let mut rec = fx.recovery();
    rec.gather_evidence(None, None).unwrap();
    let mut session = rec.review_session();
    assert_eq!(session.proposal(1), Some(&Proposal::missing()));
    session.confirm().unwrap();

    let report = rec.finish(session);
    assert_eq!(report.copies_made(), 0);
    assert_eq!(report.evidence.status, EvidenceStatus::NotProvided);
    assert_eq!(dir_names(&fx.artifact_dir("0001")), vec!["0001.NQF.00000000_ESET.out"]);
}

#[test]
fn unreadable_evidence_degrades_to_missing() {
    let fx = Fixture::new();
    fx.container("0001.NQF", &payload(4_096));

    let mut rec = fx.recovery();
    rec.gather_evidence(Some(&fx.evidence.path().join("does-not-exist")), None).unwrap();
    assert!(matches!(rec.evidence().status, EvidenceStatus::Unavailable { .. }));
    let session = rec.review_session();
    assert!(session.proposals().values().all(|p| p.flag == ProposalFlag::Missing));
}

#[test]
fn materializing_twice_is_idempotent() {
    let fx = Fixture::new();
    fx.container("A.NQF", &payload(10_000));
    fx.container("B.NQF", &payload(30_000));
    fx.evidence_text("shot.txt", "first.zip 9.8 KB\nsecond.rar 29,3 KB\n");

    let mut rec = fx.recovery();
    rec.gather_evidence(Some(fx.evidence.path()), None).unwrap();
    let mut session = rec.review_session();
    session.confirm().unwrap();
    let mapping = session.into_confirmed().unwrap();

    let first = materialize(&mapping);
    assert_eq!(first.copied(), 2);
    let before = (dir_names(&fx.artifact_dir("A")), dir_names(&fx.artifact_dir("B")));

    let second = materialize(&mapping);
    assert_eq!(second.copied(), 0);
    assert_eq!(second.existing.len(), 2);
    assert_eq!((dir_names(&fx.artifact_dir("A")), dir_names(&fx.artifact_dir("B"))), before);
}

#[test]
fn duplicate_evidence_flags_and_human_resolves() {
    let fx = Fixture::new();
    fx.container("K.NQF", &payload(48_550));
    fx.evidence_text(
        "a.txt",
        "Ultra MP3 v1.45 Keygen.exe   47.5 KB\nUltraMP3_keygen.exe   47.5 KB\n",
    );

    let mut rec = fx.recovery();
    rec.gather_evidence(Some(fx.evidence.path()), None).unwrap();
    let mut session = rec.review_session();
    assert_eq!(session.proposal(1), Some(&Proposal::duplicate("Ultra MP3 v1.45 Keygen.exe")));

    let mut out = Vec::new();
    let state = terminal::run(&mut session, "e 1 UltraMP3_keygen.exe\ny\n".as_bytes(), &mut out).unwrap();
    assert_eq!(state, SessionState::Confirmed);

    let report = rec.finish(session);
    assert_eq!(report.copies_made(), 1);
    assert!(fx.artifact_dir("K").join("UltraMP3_keygen.exe").exists());
    assert!(!fx.artifact_dir("K").join("Ultra MP3 v1.45 Keygen.exe").exists());
}

#[test]
fn cancel_writes_nothing() {
    let fx = Fixture::new();
    fx.container("C.NQF", &payload(48_550));
    fx.evidence_text("a.txt", "UltraMP3keygen.exe 47.5 KB");

    let mut rec = fx.recovery();
    rec.gather_evidence(Some(fx.evidence.path()), None).unwrap();
    let mut session = rec.review_session();
    let state = terminal::run(&mut session, "c\n".as_bytes(), Vec::new()).unwrap();
    assert_eq!(state, SessionState::Cancelled);

    let report = rec.finish(session);
    assert!(report.materialized.is_none());
    assert_eq!(dir_names(&fx.artifact_dir("C")), vec!["C.NQF.00000000_ESET.out"]);
}

#[test]
fn unwritable_output_root_aborts_before_decrypting() {
    let fx = Fixture::new();
    fx.container("C.NQF", &payload(100));
    let blocker = fx.output.path().join("plain-file");
    fs::write(&blocker, b"x").unwrap();

    let res = Recovery::decrypt(fx.quarantine.path(), &blocker.join("out"), AppConfig::default());
    assert!(matches!(res, Err(RecoverError::Scan(ScanError::OutputRoot { .. }))));
    assert_eq!(dir_names(fx.output.path()), vec!["plain-file"]);
}

#[test]
fn same_stem_in_subfolder_gets_its_own_directory() {
    let fx = Fixture::new();
    fs::create_dir(fx.quarantine.path().join("sub")).unwrap();
    let plain = payload(48_550);
    fx.container("A.NQF", &plain);
    fx.container("sub/A.NQF", &payload(10));
    fx.evidence_text("a.txt", "UltraMP3keygen.exe 47.5 KB");

    let mut rec = fx.recovery();
    assert_eq!(rec.artifacts().len(), 2);
    for a in rec.artifacts() {
        assert_eq!(fs::metadata(&a.output).unwrap().len(), a.size);
    }
    assert_eq!(dir_names(fx.output.path()), vec!["A", "A_2"]);

    rec.gather_evidence(Some(fx.evidence.path()), None).unwrap();
    let mut session = rec.review_session();
    assert_eq!(session.proposal(1), Some(&Proposal::named("UltraMP3keygen.exe")));
    assert_eq!(session.proposal(2), Some(&Proposal::missing()));
    session.confirm().unwrap();

    let report = rec.finish(session);
    assert_eq!(report.copies_made(), 1);
    assert_eq!(fs::read(fx.artifact_dir("A").join("UltraMP3keygen.exe")).unwrap(), plain);
}

#[test]
fn other_extensions_are_ignored() {
    let fx = Fixture::new();
    fx.container("A.NQF", &payload(10));
    fx.container("A.NAF", &payload(10));
    fx.container("notes.txt", &payload(10));

    let rec = fx.recovery();
    assert_eq!(rec.artifacts().len(), 1);
    assert_eq!(dir_names(fx.output.path()), vec!["A"]);
}

#[test]
fn report_round_trips_through_json() {
    let fx = Fixture::new();
    fx.container("R.NQF", &payload(48_550));
    fx.evidence_text("a.txt", "UltraMP3keygen.exe 47.5 KB");

    let mut rec = fx.recovery();
    rec.gather_evidence(Some(fx.evidence.path()), None).unwrap();
    let mut session = rec.review_session();
    session.confirm().unwrap();
    let report = rec.finish(session);

    let path = fx.output.path().join("report.json");
    report.write_json(&path).unwrap();
    let v: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(v["outcome"], "confirmed");
    assert_eq!(v["artifacts"][0]["size"], 48_550);
    assert_eq!(v["artifacts"][0]["proposal"]["name"], "UltraMP3keygen.exe");
    assert_eq!(v["artifacts"][0]["proposal"]["flag"], "none");
    assert_eq!(v["materialized"]["created"].as_array().unwrap().len(), 1);
}
