use clap::{Parser as ClapParser, Subcommand};
use prime_repl::{
    compilation::{compile_library, LibraryError},
    config::{ConfigError, EngineConfig},
    diagnostics::{emit_diagnostics, report_error},
    logging::{init_logging, resolve_level},
    references::{EngineFetcher, ReferenceCache},
    repl::{self, Editor, ScriptedLines},
    session::ScriptSession,
};
use std::{
    fs,
    io::{self, IsTerminal},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG: &str = "prime-repl.toml";

#[derive(ClapParser)]
#[command(name = "prime-repl")]
#[command(about = "Incremental Prime script engine")]
struct Cli {
    /// Engine configuration (defaults to ./prime-repl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// off, error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session (the default)
    Repl,
    /// Submit each file, in order, to one session
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Build a library image from a file of `fn` declarations
    Pack {
        /// Namespace the library's exports live under
        #[arg(long)]
        namespace: String,
        source: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(resolve_level(cli.log_level));

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(error) => {
            report_error(&error);
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            let mut session = new_session(&config);
            let (mut out, mut err) = (io::stdout(), io::stderr());
            let result = if io::stdin().is_terminal() {
                let mut editor = match Editor::new() {
                    Ok(editor) => editor,
                    Err(error) => {
                        report_error(&error);
                        return ExitCode::FAILURE;
                    }
                };
                let result = repl::run(&mut session, &mut editor, &mut out, &mut err).await;
                editor.save_history();
                result
            } else {
                let mut lines = ScriptedLines::new(io::stdin().lock());
                repl::run(&mut session, &mut lines, &mut out, &mut err).await
            };
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    report_error(&error);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Run { files } => run_files(&config, &files).await,
        Commands::Pack {
            namespace,
            source,
            output,
        } => pack(&namespace, &source, &output),
    }
}

fn load_config(explicit: Option<&PathBuf>) -> Result<EngineConfig, ConfigError> {
    match explicit {
        Some(path) => EngineConfig::load(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if default.is_file() {
                EngineConfig::load(&default)
            } else {
                Ok(EngineConfig::default())
            }
        }
    }
}

fn new_session(config: &EngineConfig) -> ScriptSession<EngineFetcher> {
    let cache = ReferenceCache::new(config.fetcher(), config.references.locations.clone());
    ScriptSession::new(Arc::new(cache), config.session_options())
}

async fn run_files(config: &EngineConfig, files: &[PathBuf]) -> ExitCode {
    let mut session = new_session(config);
    let mut failed = false;
    for file in files {
        let source = match fs::read_to_string(file) {
            Ok(source) => source,
            Err(error) => {
                eprintln!("Failed to access {}: {}", file.display(), error);
                return ExitCode::FAILURE;
            }
        };
        let report = session.submit(&source).await;
        failed |= !report.is_success();
        let name = file.display().to_string();
        if let Err(error) =
            repl::print_report(&name, &source, &report, &mut io::stdout(), &mut io::stderr())
        {
            report_error(&error);
            return ExitCode::FAILURE;
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn pack(namespace: &str, source_path: &Path, output: &Path) -> ExitCode {
    let source = match fs::read_to_string(source_path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Failed to access {}: {}", source_path.display(), error);
            return ExitCode::FAILURE;
        }
    };
    let bytes = match compile_library(namespace, &source) {
        Ok(bytes) => bytes,
        Err(LibraryError::Rejected { diagnostics, .. }) => {
            emit_diagnostics(&source_path.display().to_string(), &source, &diagnostics);
            return ExitCode::FAILURE;
        }
        Err(error) => {
            report_error(&error);
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = fs::write(output, &bytes) {
        eprintln!("Failed to write {}: {}", output.display(), error);
        return ExitCode::FAILURE;
    }
    println!("wrote {} ({} bytes)", output.display(), bytes.len());
    ExitCode::SUCCESS
}
