//! xform-link CLI
//!
//! Applies the survey linking conventions to compiled XForm XML and checks
//! that cross-form references resolve.

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use glob::glob;
use std::path::PathBuf;
use xform_link::config::{Config, OutputFormat};
use xform_link::linker::CrossFormLinker;
use xform_link::metadata::{FormMetadata, Manifest};
use xform_link::output::{JsonFormatter, OutputFormatter, TextFormatter};
use xform_link::LinkError;

#[derive(Parser)]
#[command(
    name = "xform-link",
    version,
    about = "Link paired XForm survey instruments",
    long_about = "Rewrites compiled XForm XML to add instance names, transfer fields and \
                  delete triggers, then verifies that every saveInstance/saveForm reference \
                  resolves to a form in the batch."
)]
struct Cli {
    /// XML files or glob patterns
    files: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Manifest with per-form metadata (YAML or JSON)
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Write `<stem>-<suffix>.xml` instead of editing in place
    #[arg(short, long)]
    suffix: Option<String>,

    /// Replace suffixed outputs that already exist
    #[arg(long)]
    overwrite: bool,

    /// Report unresolved links as warnings and keep the output
    #[arg(short = 'l', long)]
    linking_warn: bool,

    /// Do not insert the version comment
    #[arg(long)]
    no_stamp: bool,

    /// Report forms without a meta/logging element
    #[arg(long)]
    require_logging: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Only validate links; do not edit
    #[arg(long)]
    check: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };
    config.merge_cli(
        cli.suffix.clone(),
        cli.overwrite,
        cli.linking_warn,
        cli.no_stamp,
        cli.require_logging,
        cli.format.map(OutputFormat::from),
    )?;

    let forms = collect_forms(&cli)?;
    let formatter: Box<dyn OutputFormatter> = match config.output.format {
        OutputFormat::Text => {
            let text = TextFormatter::new();
            if cli.no_color {
                Box::new(text.without_color())
            } else {
                Box::new(text)
            }
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
    };

    let linker = CrossFormLinker::new(config);
    let outcome = if cli.check {
        linker.check(forms)
    } else {
        linker.run(forms)
    };

    match outcome {
        Ok(report) => {
            print!("{}", formatter.format(&report));
            Ok(report.is_success())
        }
        Err(LinkError::UnresolvedLinks(report)) => {
            print!("{}", formatter.format(&report));
            bail!(
                "{} unresolved cross-form reference(s){}",
                report.links.problem_count(),
                if cli.check { "" } else { "; batch output removed" }
            )
        }
        Err(e) if e.is_batch_fatal() => {
            Err(anyhow::Error::new(e).context("Batch aborted; no forms were written"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Expand patterns and attach manifest metadata
fn collect_forms(cli: &Cli) -> anyhow::Result<Vec<FormMetadata>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for pattern in &cli.files {
        let paths = glob(pattern).with_context(|| format!("Invalid pattern '{}'", pattern))?;
        let before = files.len();
        files.extend(paths.flatten().filter(|p| p.is_file()));
        if files.len() == before {
            log::warn!("No files match '{}'", pattern);
        }
    }
    files.dedup();

    let manifest = match &cli.manifest {
        Some(path) => Some(
            Manifest::load(path)
                .with_context(|| format!("Failed to load manifest {}", path.display()))?,
        ),
        None => None,
    };

    let forms = match (manifest, files.is_empty()) {
        (Some(manifest), true) => manifest.forms,
        (Some(manifest), false) => manifest.for_paths(&files),
        (None, _) => files.into_iter().map(FormMetadata::new).collect(),
    };

    if forms.is_empty() {
        bail!("No forms to process");
    }
    Ok(forms)
}
