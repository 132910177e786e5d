use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use multizip_core::collect::{collect, UnreadablePolicy, WalkPolicy};
use multizip_core::localize::{FluentLoc, Localize};
use multizip_core::naming::EntryNamer;
use multizip_core::writer::{DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE};
use multizip_core::{ArchiveConfig, ArchiveTask, TaskOutcome};

const EXIT_CANCELLED: u8 = 130;
const BUFFER_DEFAULT: u64 = DEFAULT_BUFFER_SIZE as u64;
const BUFFER_MIN: u64 = MIN_BUFFER_SIZE as u64;
const BUFFER_MAX: u64 = MAX_BUFFER_SIZE as u64;

#[derive(Parser)]
#[command(name = "multizip", version, about = "Pack files and folders into one zip archive")]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Compress the inputs into a single zip archive
    Create(CreateArgs),
    /// Print the entry names an archive of the inputs would contain
    Plan {
        #[command(flatten)]
        walk: WalkArgs,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct WalkArgs {
    /// Resolve symlinks instead of skipping them
    #[arg(long, default_value_t = false)]
    follow_symlinks: bool,
    /// Fail on unreadable directories instead of skipping them
    #[arg(long, default_value_t = false)]
    strict: bool,
}

impl WalkArgs {
    fn policy(&self) -> WalkPolicy {
        WalkPolicy {
            follow_symlinks: self.follow_symlinks,
            unreadable: if self.strict { UnreadablePolicy::Fail } else { UnreadablePolicy::Skip },
        }
    }
}

#[derive(Args)]
struct CreateArgs {
    /// Destination archive (".zip" is appended when missing)
    #[arg(short, long)]
    output: PathBuf,
    /// Do not ask for confirmation
    #[arg(short, long, default_value_t = false)]
    yes: bool,
    #[command(flatten)]
    walk: WalkArgs,
    /// Copy buffer size in bytes
    #[arg(long, default_value_t = BUFFER_DEFAULT,
          value_parser = clap::value_parser!(u64).range(BUFFER_MIN..=BUFFER_MAX))]
    buffer_size: u64,
    /// Print a JSON report on stdout after success
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Show a progress line on stderr
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long, default_value = "en-GB")]
    lang: String,
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let res = match cli.cmd {
        Cmd::Create(args) => create(args),
        Cmd::Plan { walk, inputs } => plan(&walk, &inputs).map(|_| ExitCode::SUCCESS),
    };
    match res {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn absolutize(cwd: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}

fn resolve_inputs(inputs: &[PathBuf]) -> Result<(PathBuf, Vec<PathBuf>)> {
    let cwd = std::env::current_dir().context("resolve current directory")?;
    let v = inputs.iter().map(|p| absolutize(&cwd, p)).collect();
    Ok((cwd, v))
}

fn create(args: CreateArgs) -> Result<ExitCode> {
    let loc = FluentLoc::builtin(&args.lang);
    let (cwd, selection) = resolve_inputs(&args.inputs)?;
    tracing::debug!(roots = selection.len(), cwd = %cwd.display(), "resolved selection");
    let cfg = ArchiveConfig { walk: args.walk.policy(), buffer_size: args.buffer_size as usize };
    let task = ArchiveTask::new(selection, absolutize(&cwd, &args.output), cfg);

    if !args.yes && !confirm(&loc, task.selection().len(), task.destination())? {
        eprintln!("{}", loc.msg("compress-aborted", &[]));
        return Ok(ExitCode::SUCCESS);
    }

    let show_progress = args.progress;
    let t0 = Instant::now();
    let handle = task.start();
    let progress = handle.progress().clone();
    let outcome = handle.wait_with_cleanup(
        |pct| {
            if show_progress {
                eprint!(
                    "\r[{:>4}s] compressing | files {}/{} | {:>3}%",
                    t0.elapsed().as_secs(),
                    progress.completed(),
                    progress.total(),
                    pct
                );
            }
        },
        |_| {
            // Reset the progress line whatever happened.
            if show_progress {
                eprintln!();
            }
        },
    );

    eprintln!("{}", outcome.message(&loc));
    match outcome {
        TaskOutcome::Succeeded(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        TaskOutcome::Failed(_) => Ok(ExitCode::FAILURE),
        TaskOutcome::Cancelled { .. } => Ok(ExitCode::from(EXIT_CANCELLED)),
    }
}

fn confirm(loc: &impl Localize, count: usize, destination: &Path) -> Result<bool> {
    let count = count.to_string();
    let path = destination.to_string_lossy();
    let prompt = loc.msg("confirm-compress", &[("count", count.as_str()), ("path", &*path)]);
    eprint!("{} ", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("read confirmation")?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn plan(walk: &WalkArgs, inputs: &[PathBuf]) -> Result<()> {
    let (_, roots) = resolve_inputs(inputs)?;
    let files = collect(&roots, walk.policy())?;
    let entries = EntryNamer::new(&roots).plan(&files)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for e in &entries {
        writeln!(out, "{}\t{}", e.name, e.source.display())?;
    }
    eprintln!("{} entries from {} root(s)", entries.len(), roots.len());
    Ok(())
}
