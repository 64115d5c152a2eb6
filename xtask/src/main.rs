use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for meshview")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests and doc in sequence
    Check,
    Fmt,
    /// Clippy with warnings denied
    Clippy,
    Test,
    Doc,
    /// Validate a scene directory and dry-run two frames through the CLI
    Smoke {
        dir: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
}

const FMT: &[&str] = &["fmt", "--all", "--", "--check"];
const CLIPPY: &[&str] = &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"];
const TEST: &[&str] = &["test", "--workspace"];
const DOC: &[&str] = &["doc", "--workspace", "--no-deps"];

fn cargo(step: &str, args: &[&str]) -> Result<()> {
    println!("==> cargo {step}");
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        bail!("cargo {step} failed");
    }
    Ok(())
}

fn smoke(dir: &std::path::Path, recursive: bool) -> Result<()> {
    let dir = dir.to_string_lossy().into_owned();
    let dir = dir.as_str();
    let mut validate = vec!["run", "-q", "-p", "meshview-cli", "--", "validate", dir];
    let mut frame = vec!["run", "-q", "-p", "meshview-cli", "--", "frame", dir, "--frames", "2"];
    if recursive {
        validate.push("--recursive");
        frame.push("--recursive");
    }
    cargo("run meshview-cli validate", &validate)?;
    cargo("run meshview-cli frame", &frame)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            cargo("fmt", FMT)?;
            cargo("clippy", CLIPPY)?;
            cargo("test", TEST)?;
            cargo("doc", DOC)?;
        }
        Commands::Fmt => cargo("fmt", FMT)?,
        Commands::Clippy => cargo("clippy", CLIPPY)?,
        Commands::Test => cargo("test", TEST)?,
        Commands::Doc => cargo("doc", DOC)?,
        Commands::Smoke { dir, recursive } => smoke(&dir, recursive)?,
    }

    Ok(())
}
