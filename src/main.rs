//! rnaseqde CLI Entry Point
//!
//! One binary plays three roles: the workflow driver, the stage executable
//! the scheduler launches for every task, and the final verification pass.
//!
//! # Usage
//!
//! ```bash
//! # Queue the STAR/RSEM/EBSeq pipeline for every grch38 annotation
//! rnaseqde samples.tsv
//!
//! # Paired-end HISAT2/StringTie, one annotation, commands only
//! rnaseqde samples.tsv --workflow hisat2-stringtie --layout pe \
//!     --annotation gencode --dry-run
//!
//! # Resubmit from quantification on
//! rnaseqde samples.tsv --resume-from quant
//!
//! # Launched by the scheduler
//! rnaseqde stage align_star --index /ref/star --fastq s1.fastq.gz --output-dir gencode/align_star
//! rnaseqde verify outputs.tsv --working-dir /data/run
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info, warn};

use rnaseqde::config::{Settings, SETTINGS_ENV};
use rnaseqde::graph::Step;
use rnaseqde::stages::run_stage;
use rnaseqde::submit::SystemRunner;
use rnaseqde::verify::verify;
use rnaseqde::workflow::{self, RunRequest, DEFAULT_ASSETS, DEFAULT_REFERENCE};
use rnaseqde::{APP_NAME, VERSION};

/// What this invocation was asked to do.
#[derive(Debug)]
enum Command {
    Drive { request: RunRequest, settings: Option<PathBuf>, verbose: bool },
    Stage { kind: String, args: Vec<String> },
    Verify { manifest: PathBuf, working_dir: Option<PathBuf> },
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("RNA-Seq Differential Expression Pipeline");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: rnaseqde [OPTIONS] <SAMPLE_SHEET>");
    println!("       rnaseqde stage <KIND> [--KEY VALUE ...]");
    println!("       rnaseqde verify <MANIFEST> [--working-dir DIR]");
    println!();
    println!("Arguments:");
    println!("  <SAMPLE_SHEET>        Tab-delimited sheet with sample, group, fastq1[, fastq2]");
    println!();
    println!("Options:");
    println!("  --workflow NAME       star-rsem-ebseq (default) or hisat2-stringtie");
    println!("  --layout TYPE         Library layout: sr (default) or pe");
    println!("  --strandness TYPE     Library strandness: none (default), rf or fr");
    println!("  --reference NAME      Reference name (default: {})", DEFAULT_REFERENCE);
    println!("  --annotation NAME     Use only this annotation of the reference");
    println!("  --assets PATH         Assets file (default: {})", DEFAULT_ASSETS);
    println!("  --settings PATH       Settings file (default: ${})", SETTINGS_ENV);
    println!("  --working-dir PATH    Directory the pipeline writes into");
    println!("  --dry-run             Log commands without submitting anything");
    println!("  --step-by-step STEP   Submit only this step: align, quant or de");
    println!("  --resume-from STEP    Dry-run every step before this one");
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
}

/// Returns the value following the option at `*i`.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", option))
}

/// Parses command-line arguments into a Command.
fn parse_arguments(args: &[String]) -> Result<Command, String> {
    match args.get(1).map(String::as_str) {
        Some("stage") => {
            let kind = args.get(2).ok_or("stage requires a kind")?;
            return Ok(Command::Stage {
                kind: kind.clone(),
                args: args[3..].to_vec(),
            });
        }
        Some("verify") => return parse_verify(&args[2..]),
        _ => {}
    }

    let mut request = RunRequest::new(PathBuf::new(), PathBuf::new());
    let mut sample_sheet = None;
    let mut settings = None;
    let mut working_dir = None;
    let mut verbose = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => request.dry_run = true,
            "--verbose" | "-v" => verbose = true,
            "--workflow" => {
                request.pipeline = option_value(args, &mut i, arg)?.parse().map_err(|e| format!("{}", e))?;
            }
            "--layout" => {
                request.layout = option_value(args, &mut i, arg)?.parse().map_err(|e| format!("{}", e))?;
            }
            "--strandness" => {
                request.strandness = option_value(args, &mut i, arg)?.parse().map_err(|e| format!("{}", e))?;
            }
            "--reference" => request.reference = option_value(args, &mut i, arg)?.to_string(),
            "--annotation" => request.annotation = Some(option_value(args, &mut i, arg)?.to_string()),
            "--assets" => request.assets = PathBuf::from(option_value(args, &mut i, arg)?),
            "--settings" => settings = Some(PathBuf::from(option_value(args, &mut i, arg)?)),
            "--working-dir" => working_dir = Some(PathBuf::from(option_value(args, &mut i, arg)?)),
            "--step-by-step" => request.step_by_step = Some(parse_step(option_value(args, &mut i, arg)?)?),
            "--resume-from" => request.resume_from = Some(parse_step(option_value(args, &mut i, arg)?)?),
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if sample_sheet.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                sample_sheet = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    request.sample_sheet = sample_sheet.ok_or("a sample sheet is required")?;
    request.working_dir = working_dir.unwrap_or_default();

    Ok(Command::Drive {
        request,
        settings,
        verbose,
    })
}

fn parse_verify(args: &[String]) -> Result<Command, String> {
    let mut manifest = None;
    let mut working_dir = None;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--working-dir" => working_dir = Some(PathBuf::from(option_value(args, &mut i, "--working-dir")?)),
            arg if arg.starts_with('-') => return Err(format!("Unknown option: {}", arg)),
            arg if manifest.is_none() => manifest = Some(PathBuf::from(arg)),
            arg => return Err(format!("Unexpected argument: {}", arg)),
        }
        i += 1;
    }

    Ok(Command::Verify {
        manifest: manifest.ok_or("verify requires a manifest path")?,
        working_dir,
    })
}

fn parse_step(value: &str) -> Result<Step, String> {
    value.parse().map_err(|e| format!("{}", e))
}

/// Makes `path` absolute against the current directory.
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Validates the working directory and changes into it, so that task
/// output directories resolve the same way for the driver and its jobs.
fn setup_working_directory(working_dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if working_dir.as_os_str().is_empty() {
        let current = env::current_dir()?;
        info!("Working directory: {}", current.display());
        return Ok(current);
    }

    if !working_dir.is_dir() {
        return Err(format!("Working directory does not exist: {}", working_dir.display()).into());
    }

    env::set_current_dir(working_dir)?;
    let current = env::current_dir()?;
    info!("Working directory: {}", current.display());
    Ok(current)
}

/// Workflow driver: builds the task graph and submits it.
fn drive(mut request: RunRequest, settings: Option<PathBuf>) -> Result<ExitCode, Box<dyn std::error::Error>> {
    print_banner();

    // Paths on the command line are relative to where we were started.
    request.sample_sheet = absolute(&request.sample_sheet)?;
    request.assets = absolute(&request.assets)?;
    if let Some(path) = settings {
        // Stage jobs inherit the environment and load the same settings.
        env::set_var(SETTINGS_ENV, absolute(&path)?);
    }
    let settings = Settings::load_default()?;

    request.working_dir = setup_working_directory(&request.working_dir)?;

    if request.dry_run {
        info!("Mode: DRY RUN (nothing will be submitted)");
        println!();
    }

    let summary = workflow::run(&request, &settings).map_err(|e| {
        error!("Workflow failed: {}", e);
        e
    })?;

    println!();
    info!(
        "{} tasks, {} submitted; verification job {}",
        summary.tasks, summary.submitted, summary.verifier
    );
    info!("Submission record: {}", summary.record.display());

    Ok(match summary.verified {
        Some(true) => {
            println!("{}", "PASSED".green().bold());
            ExitCode::SUCCESS
        }
        Some(false) => {
            println!("{}", "FAILED".red().bold());
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    })
}

/// Stage executable: runs this process's shard of one task.
fn stage(kind: &str, args: &[String]) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let settings = Settings::load_default()?;
    let outcome = run_stage(kind, args, &settings, &mut SystemRunner)?;

    if outcome.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("{}: {} of {} commands failed", kind, outcome.failed, outcome.executed);
        Ok(ExitCode::FAILURE)
    }
}

/// Verification pass: checks the manifest and leaves the marker behind.
fn verify_outputs(manifest: &Path, working_dir: Option<PathBuf>) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let working_dir = match working_dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    let outcome = verify(manifest, &working_dir)?;

    if outcome.success() {
        println!("{}", "PASSED".green().bold());
    } else {
        for path in &outcome.missing {
            error!("{} doesn't exist", path.display());
        }
        println!("{} ({} missing, see {})", "FAILED".red().bold(), outcome.missing.len(), outcome.marker.display());
    }
    Ok(outcome.exit_code())
}

/// Main application entry point.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let command = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    match command {
        Command::Drive {
            request,
            settings,
            verbose,
        } => {
            setup_logging(verbose);
            drive(request, settings)
        }
        Command::Stage { kind, args } => {
            setup_logging(false);
            stage(&kind, &args)
        }
        Command::Verify { manifest, working_dir } => {
            setup_logging(false);
            verify_outputs(&manifest, working_dir)
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
