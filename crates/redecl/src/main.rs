use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use redecl_core::error::{RedeclError, Result};
use redecl_core::{cleanup, loader, path, Context};
use redecl_utils::{info, init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingGuard, LoggingError};

/// Written at the top of every generated header.
const HEADER_PREAMBLE: &str = "#pragma once\n\n";

/// Regenerates C++ headers from the DWARF debug information of a compiled binary.
#[derive(Parser, Debug)]
#[command(name = "redecl")]
#[command(version)]
#[command(about = "Regenerates C++ headers from the DWARF debug information of a compiled binary", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace). Overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log output format (pretty or json). Overrides REDECL_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Write one header per original source file
    Generate
    {
        /// Binary (or object file) carrying DWARF debug information
        binary: PathBuf,
        /// Output directory (default: `out` next to the binary)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only emit files below this directory (default: common directory of all compile units)
        #[arg(long)]
        base_dir: Option<String>,
        /// Keep standard library names exactly as recorded
        #[arg(long, default_value_t = false)]
        no_cleanup: bool,
    },
    /// List the headers that would be generated
    List
    {
        /// Binary (or object file) carrying DWARF debug information
        binary: PathBuf,
        /// Only list files below this directory
        #[arg(long)]
        base_dir: Option<String>,
    },
    /// Print a single reconstructed header to stdout
    Show
    {
        /// Binary (or object file) carrying DWARF debug information
        binary: PathBuf,
        /// Header path relative to the base directory, as printed by `list`
        header: String,
        /// Resolve `header` against this directory
        #[arg(long)]
        base_dir: Option<String>,
        /// Keep standard library names exactly as recorded
        #[arg(long, default_value_t = false)]
        no_cleanup: bool,
    },
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match setup_logging(cli.log_level, cli.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn setup_logging(level: Option<LogLevel>, format: Option<LogFormat>) -> std::result::Result<LoggingGuard, LoggingError>
{
    match (level, format) {
        (None, None) => init_logging(),
        (level, format) => init_logging_with_level(level.unwrap_or(LogLevel::Info), format.unwrap_or(LogFormat::Pretty)),
    }
}

fn run_command(command: Commands) -> Result<()>
{
    match command {
        Commands::Generate {
            binary,
            output,
            base_dir,
            no_cleanup,
        } => {
            let context = reconstruct(&binary)?;
            let output = output.unwrap_or_else(|| default_output_dir(&binary));
            let headers = context.headers(base_dir.as_deref());
            for (relative, text) in &headers {
                write_header(&output, relative, text, !no_cleanup)?;
            }
            info!("Wrote {} headers to {}", headers.len(), output.display());
            println!("Wrote {} headers to {}", headers.len(), output.display());
            Ok(())
        }
        Commands::List { binary, base_dir } => {
            let context = reconstruct(&binary)?;
            if let Some(base) = base_dir.as_deref().or(context.base_dir()) {
                info!("Base directory: {base}");
            }
            for (relative, _) in context.headers(base_dir.as_deref()) {
                println!("{relative}");
            }
            Ok(())
        }
        Commands::Show {
            binary,
            header,
            base_dir,
            no_cleanup,
        } => {
            let context = reconstruct(&binary)?;
            let wanted = path::normalize(&header);
            let text = context
                .headers(base_dir.as_deref())
                .into_iter()
                .find_map(|(relative, text)| (relative == wanted).then_some(text))
                .ok_or_else(|| RedeclError::InvalidArgument(format!("no header named {header}")))?;
            print!("{}", render_header(&text, !no_cleanup));
            Ok(())
        }
    }
}

fn reconstruct(binary: &Path) -> Result<Context>
{
    let tree = loader::load_file(binary)?;
    Ok(redecl_core::reconstruct(&tree))
}

/// `out` in the directory holding the binary.
fn default_output_dir(binary: &Path) -> PathBuf
{
    binary.parent().unwrap_or_else(|| Path::new(".")).join("out")
}

fn render_header(text: &str, clean: bool) -> String
{
    let body = if clean { cleanup::clean(text) } else { text.to_string() };
    format!("{HEADER_PREAMBLE}{body}")
}

fn write_header(output: &Path, relative: &str, text: &str, clean: bool) -> Result<()>
{
    let target = output.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, render_header(text, clean))?;
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_default_output_dir_is_next_to_binary()
    {
        assert_eq!(default_output_dir(Path::new("/build/game")), PathBuf::from("/build/out"));
        assert_eq!(default_output_dir(Path::new("game")), PathBuf::from("out"));
    }

    #[test]
    fn test_rendered_header_has_preamble()
    {
        let text = render_header("std::__1::mutex m;\n", true);
        assert_eq!(text, "#pragma once\n\nstd::mutex m;\n");
        assert!(render_header("std::__1::mutex m;\n", false).contains("std::__1::mutex"));
    }

    #[test]
    fn test_cli_parses_generate()
    {
        let cli = Cli::try_parse_from(["redecl", "generate", "game", "-o", "headers", "--no-cleanup", "--log-level", "debug"])
            .unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        match cli.command {
            Commands::Generate {
                binary,
                output,
                no_cleanup,
                base_dir,
            } => {
                assert_eq!(binary, PathBuf::from("game"));
                assert_eq!(output, Some(PathBuf::from("headers")));
                assert!(no_cleanup);
                assert_eq!(base_dir, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_write_header_creates_directories()
    {
        let output = std::env::temp_dir().join(format!("redecl-cli-test-{}", process::id()));
        write_header(&output, "engine/core/types.h", "using Id = int;\n", true).unwrap();
        let written = fs::read_to_string(output.join("engine/core/types.h")).unwrap();
        assert_eq!(written, "#pragma once\n\nusing Id = int;\n");
        fs::remove_dir_all(&output).unwrap();
    }
}
