use clap::{Parser as ClapParser, Subcommand};
use kcl_lang::{
    diagnostics::{
        emit_module_errors, report_load_error, report_manifest_error, report_runtime_error,
    },
    project::{MemorySources, ModuleId, ProjectConfig, Session},
    runtime::{Entry, EntryArg, Interpreter},
};
use std::io::{self, IsTerminal};
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Module name given to source read from stdin.
const STDIN_MODULE: &str = "stdin.kcl";

#[derive(ClapParser)]
#[command(name = "kcl", version, about = "Resolve and evaluate KCL modules")]
struct Cli {
    /// Project root; defaults to the directory holding kcl.toml, else the file's directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and resolve a module and everything it imports
    Check {
        /// Module to check, or `-` for stdin; defaults to the manifest's `main`,
        /// then to piped stdin
        file: Option<PathBuf>,
    },
    /// Evaluate a module's entry points
    Run {
        /// Module to run, or `-` for stdin
        file: Option<PathBuf>,
        /// Top-level function to call instead of `main` (repeatable)
        #[arg(long = "function", value_name = "NAME")]
        functions: Vec<String>,
        /// Argument as a literal, `VALUE` or `NAME=VALUE` (repeatable)
        #[arg(long = "arg", value_name = "[NAME=]VALUE", allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KCL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Check { file } => check(cli.root, file),
        Command::Run {
            file,
            functions,
            args,
        } => run(cli.root, file, functions, args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

fn check(root: Option<PathBuf>, file: Option<PathBuf>) -> Result<(), ()> {
    let (session, id) = load(root, file)?;
    let count = emit_module_errors(&session);
    if count > 0 {
        eprintln!("{count} error(s)");
        return Err(());
    }
    let record = session.module(id);
    println!(
        "{}: {} module(s), {} export(s)",
        record.path(),
        session.modules().count(),
        record.exports().len()
    );
    Ok(())
}

fn run(
    root: Option<PathBuf>,
    file: Option<PathBuf>,
    functions: Vec<String>,
    args: Vec<String>,
) -> Result<(), ()> {
    let args = args
        .iter()
        .map(|text| EntryArg::parse(text))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| report_runtime_error(&err))?;
    let (session, id) = load(root, file)?;
    if emit_module_errors(&session) > 0 {
        return Err(());
    }

    let entry = if functions.is_empty() {
        Entry::Main
    } else {
        Entry::Functions(functions)
    };
    let mut interpreter = Interpreter::new(&session);
    let results = interpreter
        .run(id, &entry, &args)
        .map_err(|err| report_runtime_error(&err))?;
    for (name, value) in results {
        println!("{name} = {value}");
    }
    Ok(())
}

fn load(root: Option<PathBuf>, file: Option<PathBuf>) -> Result<(Session, ModuleId), ()> {
    let dash = file.as_ref().is_some_and(|file| file.as_os_str() == "-");
    let file = file.filter(|_| !dash);
    let start = file
        .clone()
        .or_else(|| root.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let mut config = ProjectConfig::discover(&start).map_err(|err| report_manifest_error(&err))?;
    if let Some(root) = root {
        config.root = root;
    }

    let (mut session, module) = match file {
        Some(file) => {
            let module = relative_module_path(&config.root, &file)?;
            (Session::new(config), module)
        }
        None if dash || (config.main.is_none() && !io::stdin().is_terminal()) => {
            let source = io::read_to_string(io::stdin()).map_err(|err| {
                eprintln!("Failed to read stdin: {err}");
            })?;
            let overlay = MemorySources::new().with(STDIN_MODULE, &source);
            (Session::with_overlay(config, overlay), STDIN_MODULE.to_string())
        }
        None => match config.main.clone() {
            Some(main) => (Session::new(config), main),
            None => {
                eprintln!("No file given, no `main` in kcl.toml and nothing piped to stdin");
                return Err(());
            }
        },
    };

    let id = session
        .load(&module)
        .map_err(|err| report_load_error(&err))?;
    Ok((session, id))
}

/// `file` as a `/`-separated path under `root`.
fn relative_module_path(root: &Path, file: &Path) -> Result<String, ()> {
    let root = root.canonicalize().map_err(|err| {
        eprintln!("Failed to access {}: {}", root.display(), err);
    })?;
    let file = file.canonicalize().map_err(|err| {
        eprintln!("Failed to access {}: {}", file.display(), err);
    })?;
    let relative = file.strip_prefix(&root).map_err(|_| {
        eprintln!(
            "{} is outside the project root {}",
            file.display(),
            root.display()
        );
    })?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(segments.join("/"))
}
