use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

use unquarantine::config::AppConfig;
use unquarantine::evidence::ocr::{gather_fragments, TesseractCli, TextRecognizer};
use unquarantine::evidence::CandidateExtractor;
use unquarantine::logging::init_logger;
use unquarantine::pipeline::Recovery;
use unquarantine::review::terminal;
use unquarantine::size::humanize;

#[derive(Parser)]
#[command(name = "unquarantine", about = "Recover ESET quarantine files and restore their names")]
struct Cli {
    /// Configuration file (TOML).  Defaults to ./Unquarantine.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RootArgs {
    /// Quarantine folder holding the .NQF containers
    #[arg(short, long)]
    quarantine: PathBuf,
    /// Output root; one sub-folder per container is created
    #[arg(short, long)]
    output: PathBuf,
    /// Also copy each container next to its decrypted output
    #[arg(long)]
    copy_container: bool,
}

#[derive(Args)]
struct EvidenceArgs {
    /// Folder of screenshots and/or recognized .txt dumps
    #[arg(long)]
    ocr: Option<PathBuf>,
    /// Text recognition program used for screenshots
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,
    /// Only read .txt evidence; never run the recognition program
    #[arg(long)]
    text_only: bool,
}

#[derive(Args)]
struct MatchArgs {
    /// Size in bytes from which the 2 % band applies (default 1048576)
    #[arg(long)]
    large_threshold: Option<u64>,
    /// Artifacts smaller than this many bytes are never matched
    #[arg(long)]
    min_size: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decrypt, propose names, review them interactively and write named copies
    Recover {
        #[command(flatten)]
        roots: RootArgs,
        #[command(flatten)]
        evidence: EvidenceArgs,
        #[command(flatten)]
        matching: MatchArgs,
        /// Accept the proposals without prompting
        #[arg(short, long)]
        yes: bool,
        /// Write a JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Decrypt containers only
    Decrypt {
        #[command(flatten)]
        roots: RootArgs,
    },
    /// Decrypt and print proposed names without writing copies
    Propose {
        #[command(flatten)]
        roots: RootArgs,
        #[command(flatten)]
        evidence: EvidenceArgs,
        #[command(flatten)]
        matching: MatchArgs,
    },
    /// Print the (name, size) candidates found in an evidence folder
    Candidates {
        #[command(flatten)]
        evidence: EvidenceArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let mut cfg = AppConfig::load(cli.config.as_deref())?;

    match cli.command {

        // ── Recover ──────────────────────────────────────────────────────────
        Commands::Recover { roots, evidence, matching, yes, report } => {
            apply_overrides(&mut cfg, &roots, &matching);
            let rec = prepare(&roots, &evidence, cfg)?;

            let mut session = rec.review_session();
            if session.artifacts().is_empty() {
                println!("[!] No decryptable .NQF files under: {}", roots.quarantine.display());
                session.cancel()?;
            } else if yes {
                println!("\nProposed names\n");
                print!("{}", session.render());
                session.confirm()?;
            } else {
                let stdin = io::stdin();
                terminal::run(&mut session, stdin.lock(), io::stdout())?;
            }

            let run = rec.finish(session);
            println!();
            for line in run.summary() {
                println!("{line}");
            }
            if let Some(path) = report {
                run.write_json(&path)?;
                println!("    Report: {}", path.display());
            }
        }

        // ── Decrypt ──────────────────────────────────────────────────────────
        Commands::Decrypt { roots } => {
            apply_overrides(&mut cfg, &roots, &MatchArgs { large_threshold: None, min_size: None });
            let rec = Recovery::decrypt(&roots.quarantine, &roots.output, cfg)?;
            print_decrypted(&rec);
            println!("Decrypted {} file(s) into {}", rec.artifacts().len(), roots.output.display());
        }

        // ── Propose ──────────────────────────────────────────────────────────
        Commands::Propose { roots, evidence, matching } => {
            apply_overrides(&mut cfg, &roots, &matching);
            let rec = prepare(&roots, &evidence, cfg)?;
            println!("\nProposed names\n");
            print!("{}", rec.review_session().render());
        }

        // ── Candidates ───────────────────────────────────────────────────────
        Commands::Candidates { evidence } => {
            let Some(dir) = evidence.ocr.as_deref() else {
                return Err("--ocr <folder> is required".into());
            };
            let recognizer = recognizer(&evidence);
            let fragments = gather_fragments(dir, &cfg.scan.image_extensions, recognizer.as_ref().map(as_dyn))?;
            let extraction = CandidateExtractor::new(&cfg.extract)?.extract_fragments(fragments);
            for skip in &extraction.skipped {
                println!("[ocr] skipped {}: {}", skip.source.display(), skip.reason);
            }
            println!("{:<60} {:>12} {:>10}", "Name", "Bytes", "Size");
            for c in &extraction.candidates {
                println!("{:<60} {:>12} {:>10}", c.name, c.size, humanize(c.size));
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn apply_overrides(cfg: &mut AppConfig, roots: &RootArgs, matching: &MatchArgs) {
    if roots.copy_container {
        cfg.scan.copy_container = true;
    }
    if let Some(t) = matching.large_threshold {
        cfg.matching.large_threshold = t;
    }
    if let Some(m) = matching.min_size {
        cfg.matching.min_artifact_size = m;
    }
}

fn as_dyn(t: &TesseractCli) -> &dyn TextRecognizer {
    t
}

fn recognizer(evidence: &EvidenceArgs) -> Option<TesseractCli> {
    if evidence.text_only || evidence.ocr.is_none() {
        return None;
    }
    let found = TesseractCli::detect(&evidence.tesseract);
    if found.is_none() {
        warn!("{} not available; screenshots will be skipped", evidence.tesseract.display());
    }
    found
}

fn prepare(roots: &RootArgs, evidence: &EvidenceArgs, cfg: AppConfig) -> Result<Recovery, Box<dyn std::error::Error>> {
    println!("[i] Scanning quarantine: {}", roots.quarantine.display());
    let mut rec = Recovery::decrypt(&roots.quarantine, &roots.output, cfg)?;
    println!("[i] Found {} quarantined file(s).", rec.artifacts().len() + rec.batch().skipped.len());
    print_decrypted(&rec);

    let engine = recognizer(evidence);
    if let Some(dir) = evidence.ocr.as_deref() {
        println!("[ocr] scanning {}", dir.display());
    }
    rec.gather_evidence(evidence.ocr.as_deref(), engine.as_ref().map(as_dyn))?;
    Ok(rec)
}

fn print_decrypted(rec: &Recovery) {
    for a in rec.artifacts() {
        println!("[ok] {} -> {} ({})", file_name(&a.source), a.output_name(), humanize(a.size));
    }
    for s in &rec.batch().skipped {
        println!("[skip] {}: {}", file_name(&s.source), s.reason);
    }
}

fn file_name(p: &Path) -> String {
    p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
