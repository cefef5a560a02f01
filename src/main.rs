// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for chatgpt2md.
//!
//! This binary provides the `chatgpt2md` command for converting ChatGPT
//! conversation exports from JSON to Markdown format.

use chatgpt2md::{parser, renderer};
use lexopt::prelude::*;
use snafu::{OptionExt, ensure, prelude::*};
use std::ffi::OsString;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Where to write the rendered output.
#[derive(Clone)]
enum OutputTarget {
    /// Write to the given file, or into the given directory for several inputs.
    Path(PathBuf),
    /// Write to stdout.
    Stdout,
}

/// A source of JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    /// The base name for a per-input output file.
    fn stem(&self) -> Option<OsString> {
        match self {
            Self::Stdin => Some("stdin".into()),
            Self::File(path) => path.file_stem().map(ToOwned::to_owned),
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[allow(clippy::struct_excessive_bools)]
struct Cli {
    input: Vec<PathBuf>,
    output: OutputTarget,
    concat: bool,
    show_timestamps: bool,
    heading_offset: u8,
    debug: bool,
    quiet: bool,
    dry_run: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("at least one input file or directory is required"))]
    NoInputFiles,

    #[snafu(display("cannot output multiple files to stdout without --concat"))]
    MultipleFilesToStdout,

    #[snafu(display("failed to create output directory: {source}"))]
    CreateOutputDir { source: std::io::Error },

    #[snafu(display("failed to read {input}: {source}"))]
    ReadInput {
        input: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {input}: {source}"))]
    ParseInput {
        input: String,
        source: parser::ParseError,
    },

    #[snafu(display("invalid input filename: no file stem"))]
    InvalidFilename,

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert ChatGPT conversation exports (including Canvas) to Markdown

Usage: {name} [OPTIONS] <INPUT>...

Arguments:
  <INPUT>...  Input JSON files, directories containing exports, or - for stdin

Options:
  -o, --output <OUTPUT>     Output file (directory for several inputs, - for stdout)
      --concat              Combine all inputs into a single output
      --heading-offset <N>  Shift heading levels by N (0-5, default: 0)
      --show-timestamps     Include message timestamps (default: off)
      --hide-timestamps     Hide message timestamps
  -d, --debug               Print a summary of parsed messages to stderr

Other options:
  -q, --quiet               Suppress progress messages
  -n, --dry-run             Show what would be processed without writing
  -f, --force               Overwrite existing output files (without it, any
                            existing output file, including -o FILE, is skipped)
  -h, --help                Print help
  -V, --version             Print version

Set RUST_LOG (e.g. RUST_LOG=debug) for detailed diagnostics.",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input = Vec::new();
    let mut output = OutputTarget::Stdout;
    let mut concat = false;
    let mut show_timestamps = false;
    let mut heading_offset: u8 = 0;
    let mut debug = false;
    let mut quiet = false;
    let mut dry_run = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::Path(val)
                };
            }
            Long("concat") => concat = true,
            // Show/hide flags - last one wins
            Long("show-timestamps") => show_timestamps = true,
            Long("hide-timestamps") => show_timestamps = false,
            Long("heading-offset") => {
                let val: u8 = parser
                    .value()?
                    .parse()
                    .map_err(|_| "heading-offset must be a number 0-5")?;
                if val > 5 {
                    return Err("heading-offset must be 0-5".into());
                }
                heading_offset = val;
            }
            Short('d') | Long("debug") => debug = true,
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        output,
        concat,
        show_timestamps,
        heading_offset,
        debug,
        quiet,
        dry_run,
        force,
    })
}

/// Sends library diagnostics to stderr; `--debug` overrides `RUST_LOG`.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("chatgpt2md=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;
    init_logging(cli.debug);

    ensure!(!cli.input.is_empty(), NoInputFilesSnafu);

    // Collect all inputs first
    let inputs = collect_inputs(&cli.input);
    ensure!(!inputs.is_empty(), NoInputFilesSnafu);

    if cli.concat {
        process_concat(&inputs, &cli)?;
    } else if let [input] = inputs.as_slice() {
        process_single(input, &cli)?;
    } else {
        match &cli.output {
            OutputTarget::Stdout => return MultipleFilesToStdoutSnafu.fail(),
            OutputTarget::Path(dir) => {
                if !cli.dry_run {
                    std::fs::create_dir_all(dir).context(CreateOutputDirSnafu)?;
                }
                for input in &inputs {
                    process_into_dir(input, dir, &cli)?;
                }
            }
        }
    }

    Ok(())
}

/// Resolves the command-line inputs: `-` is stdin, directories are searched
/// recursively for JSON files.
fn collect_inputs(paths: &[PathBuf]) -> Vec<Input> {
    let mut inputs = Vec::new();
    for path in paths {
        if path == Path::new("-") {
            inputs.push(Input::Stdin);
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            {
                inputs.push(Input::File(entry.path().to_path_buf()));
            }
        } else {
            inputs.push(Input::File(path.clone()));
        }
    }
    inputs
}

/// Creates render options from CLI arguments.
const fn make_render_options(cli: &Cli) -> renderer::RenderOptions {
    renderer::RenderOptions {
        show_timestamps: cli.show_timestamps,
        heading_offset: cli.heading_offset,
    }
}

/// Reads, parses, and renders one input.
fn convert(input: &Input, cli: &Cli) -> Result<String, Error> {
    let json = match input {
        Input::Stdin => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context(ReadInputSnafu { input: input.to_string() })?;
            buf
        }
        Input::File(path) => std::fs::read_to_string(path)
            .context(ReadInputSnafu { input: input.to_string() })?,
    };

    let messages = parser::parse_conversation(&json).context(ParseInputSnafu {
        input: input.to_string(),
    })?;
    tracing::debug!(%input, messages = messages.len(), "parsed conversation");

    if cli.debug {
        eprint!("{}", renderer::debug_summary(&messages));
    }

    Ok(renderer::render_conversation(
        &messages,
        &make_render_options(cli),
    ))
}

/// Processes a single input, writing to stdout or the output file.
fn process_single(input: &Input, cli: &Cli) -> Result<(), Error> {
    match &cli.output {
        OutputTarget::Stdout => {
            if cli.dry_run {
                eprintln!("Would output {input}");
                return Ok(());
            }
            print!("{}", convert(input, cli)?);
        }
        OutputTarget::Path(path) => {
            if cli.dry_run {
                eprintln!("Would write {}", path.display());
                return Ok(());
            }
            if skip_existing(path, cli) {
                return Ok(());
            }
            let markdown = convert(input, cli)?;
            write_markdown(path, &markdown)?;
            if !cli.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

/// Processes multiple inputs and concatenates them into a single output.
fn process_concat(inputs: &[Input], cli: &Cli) -> Result<(), Error> {
    let mut output = String::new();

    for (i, input) in inputs.iter().enumerate() {
        if i > 0 {
            output.push_str("\n---\n\n");
        }
        output.push_str(&convert(input, cli)?);
    }

    match &cli.output {
        OutputTarget::Stdout => {
            if cli.dry_run {
                eprintln!("Would output {} files concatenated", inputs.len());
            } else {
                print!("{output}");
            }
        }
        OutputTarget::Path(path) => {
            if cli.dry_run {
                eprintln!(
                    "Would write {} ({} files concatenated)",
                    path.display(),
                    inputs.len()
                );
            } else if !skip_existing(path, cli) {
                write_markdown(path, &output)?;
                if !cli.quiet {
                    eprintln!("Wrote {} ({} files)", path.display(), inputs.len());
                }
            }
        }
    }

    Ok(())
}

/// Processes one of several inputs, writing `<stem>.md` into the output directory.
fn process_into_dir(input: &Input, out_dir: &Path, cli: &Cli) -> Result<(), Error> {
    let out_name = input.stem().context(InvalidFilenameSnafu)?;
    let out_path = out_dir.join(format!("{}.md", out_name.to_string_lossy()));

    if cli.dry_run {
        eprintln!("Would write {}", out_path.display());
        return Ok(());
    }
    if skip_existing(&out_path, cli) {
        return Ok(());
    }

    let markdown = convert(input, cli)?;
    write_markdown(&out_path, &markdown)?;

    if !cli.quiet {
        eprintln!("Wrote {}", out_path.display());
    }
    Ok(())
}

/// Returns `true` (and says so) if `path` exists and `--force` was not given.
fn skip_existing(path: &Path, cli: &Cli) -> bool {
    let skip = path.exists() && !cli.force;
    if skip {
        eprintln!(
            "Skipping {} (already exists, use --force to overwrite)",
            path.display()
        );
    }
    skip
}

/// Writes `markdown` to `path`, creating the parent directory if needed.
fn write_markdown(path: &Path, markdown: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateOutputDirSnafu)?;
    }
    std::fs::write(path, markdown).context(WriteFileSnafu { path })
}
