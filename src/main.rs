//! Reference CLI: convert between keymap and JSON layout documents and
//! validate them. Exit codes: 0 success, 1 validation errors, 2 parse
//! errors, 3 I/O errors.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use zmk_layout::parser::dt::diagnostic_for;
use zmk_layout::Layout;

#[derive(Parser)]
#[command(name = "zmk-layout", about = "ZMK keymap <-> JSON layout toolkit")]
struct Args {
    /// Increase log verbosity (-d for debug output).
    #[arg(short, long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a .keymap into a JSON layout document.
    Parse {
        /// Input .keymap file.
        input: PathBuf,
        /// Output JSON file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keyboard name recorded in the document.
        #[arg(short, long, default_value = "keyboard")]
        keyboard: String,
    },
    /// Emit a .keymap (and optionally a .conf) from a JSON layout document.
    Emit {
        /// Input JSON file.
        input: PathBuf,
        /// Output .keymap file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the Kconfig .conf to this path.
        #[arg(long)]
        conf: Option<PathBuf>,
    },
    /// Validate a layout document (JSON or .keymap, auto-detected).
    Validate {
        input: PathBuf,
        /// Keyboard name used when the input is a .keymap.
        #[arg(short, long, default_value = "keyboard")]
        keyboard: String,
        /// Recommended per-layer key limit.
        #[arg(long, default_value_t = 100)]
        max_keys: usize,
    },
}

fn init_log(debug: bool) {
    use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn read_input(path: &Path) -> Result<String, ExitCode> {
    std::fs::read_to_string(path).map_err(|e| {
        eprintln!("error: cannot read {}: {e}", path.display());
        ExitCode::from(3)
    })
}

fn write_output(path: Option<&Path>, content: &str) -> Result<(), ExitCode> {
    match path {
        Some(path) => std::fs::write(path, content).map_err(|e| {
            eprintln!("error: cannot write {}: {e}", path.display());
            ExitCode::from(3)
        }),
        None => {
            print!("{content}");
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_log(args.debug);
    match run(args.command) {
        Ok(code) => code,
        Err(code) => code,
    }
}

fn run(command: Command) -> Result<ExitCode, ExitCode> {
    match command {
        Command::Parse {
            input,
            output,
            keyboard,
        } => {
            let content = read_input(&input)?;
            let import = Layout::from_keymap(&content, &keyboard);
            report_diagnostics(&input, &content, &import);
            if !import.is_clean() {
                return Ok(ExitCode::from(2));
            }
            let json = import.layout.to_json().map_err(internal_error)?;
            write_output(output.as_deref(), &json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Emit { input, output, conf } => {
            let content = read_input(&input)?;
            let layout = match Layout::from_json(&content) {
                Ok(layout) => layout,
                Err(e) => {
                    eprintln!("error: {e}");
                    return Ok(ExitCode::from(2));
                }
            };
            let keymap = layout
                .export()
                .keymap()
                .generate()
                .map_err(internal_error)?;
            write_output(output.as_deref(), &keymap)?;
            if let Some(conf_path) = conf {
                let (conf_content, _) = layout
                    .export()
                    .config()
                    .generate()
                    .map_err(internal_error)?;
                write_output(Some(&conf_path), &conf_content)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate {
            input,
            keyboard,
            max_keys,
        } => {
            let content = read_input(&input)?;
            let import = match Layout::from_string(&content, &keyboard) {
                Ok(import) => import,
                Err(e) => {
                    eprintln!("error: {e}");
                    return Ok(ExitCode::from(2));
                }
            };
            report_diagnostics(&input, &content, &import);
            if !import.is_clean() {
                return Ok(ExitCode::from(2));
            }
            let summary = import.layout.validate().validate_all(max_keys).summary();
            for warning in &summary.warnings {
                eprintln!("warning: {warning}");
            }
            for error in &summary.errors {
                eprintln!("error: {error}");
            }
            if summary.is_valid {
                eprintln!(
                    "ok: {} layers, {} warnings",
                    import.layout.data().layer_names.len(),
                    summary.warnings.len()
                );
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
    }
}

fn report_diagnostics(path: &Path, source: &str, import: &zmk_layout::KeymapImport) {
    let name = path.display().to_string();
    for warning in &import.warnings {
        log::warn!("{warning}");
    }
    for error in &import.errors {
        let report: miette::Report = diagnostic_for(error, &name, source).into();
        eprintln!("{report:?}");
    }
}

fn internal_error(e: impl std::fmt::Display) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::from(2)
}
