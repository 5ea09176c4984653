use archivist::chat::ChatTurn;
use archivist::cli::{Cli, Commands, ConfigAction, SessionAction};
use archivist::config::{Config, ConfigValidator};
use archivist::engine::{Exchange, IndexReport, RagEngine, Services};
use archivist::error::{ArchivistError, Result};
use archivist::session::{new_session_id, SessionArchive};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

fn main() {
    // Credentials may live in a .env file beside the data
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        config: config_path,
        profile,
        command,
        ..
    } = cli;

    // Handle commands
    match command {
        Commands::Index { dir, extensions } => {
            cmd_index(config_path, profile, dir, extensions)?;
        }
        Commands::Upload { files } => {
            cmd_upload(config_path, profile, &files)?;
        }
        Commands::Ask {
            question,
            session,
            json,
        } => {
            cmd_ask(config_path, profile, &question, session, json)?;
        }
        Commands::Chat { session } => {
            cmd_chat(config_path, profile, session)?;
        }
        Commands::Sessions { action } => {
            cmd_sessions(config_path, profile, action)?;
        }
        Commands::Config { action } => {
            cmd_config(config_path, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "archivist=debug" } else { "archivist=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| ArchivistError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn build_engine(config: Config) -> Result<RagEngine> {
    let services = Services::from_config(&config)?;
    RagEngine::new(config, services)
}

/// Engine with the persisted snapshot installed, for answering
fn open_engine(config: Config) -> Result<RagEngine> {
    let engine = build_engine(config)?;
    engine.load_persisted()?;
    Ok(engine)
}

fn cmd_index(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    dir: Option<PathBuf>,
    extensions: Vec<String>,
) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let dir = dir.unwrap_or_else(|| config.storage.documents_dir.clone());
    let extensions = if extensions.is_empty() {
        config.ingestion.allowed_extensions.clone()
    } else {
        extensions
    };

    std::fs::create_dir_all(&dir).map_err(|e| ArchivistError::Io {
        source: e,
        context: format!("Failed to create documents directory: {}", dir.display()),
    })?;

    // A rebuild replaces whatever is on disk, readable or not
    let engine = build_engine(config)?;
    let rt = runtime()?;
    let report = rt.block_on(engine.build_index(&dir, &extensions))?;

    print_index_report(&dir, &report);
    Ok(())
}

fn print_index_report(dir: &Path, report: &IndexReport) {
    match &report.version {
        Some(version) => {
            println!("✓ Indexed {}", dir.display());
            println!("  Documents: {}", report.documents_indexed);
            println!("  Chunks:    {}", report.chunks);
            println!("  Snapshot:  {}", version);
            println!("  Took:      {}ms", report.duration_ms);
        }
        None => {
            println!("⚠ No documents could be indexed from {}", dir.display());
            println!("  The existing index (if any) was kept.");
        }
    }

    if !report.skipped.is_empty() {
        println!("\nSkipped {} file(s):", report.skipped.len());
        for skipped in &report.skipped {
            println!("  - {}: {}", skipped.path.display(), skipped.reason);
        }
    }
}

fn cmd_upload(config_path: Option<PathBuf>, profile: Option<String>, files: &[PathBuf]) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let report = archivist::corpus::DocumentLoader::import_files(files, &config.storage.documents_dir)?;

    for path in &report.imported {
        println!("✓ Added {}", path.display());
    }
    for skipped in &report.skipped {
        println!("⚠ Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    if !report.imported.is_empty() {
        println!("\nRun 'archivist index' to include the new documents.");
    }
    Ok(())
}

fn cmd_ask(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    question: &str,
    session: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let archive = SessionArchive::new(&config.storage.history_dir);
    let (session_id, mut history) = open_session(&archive, session)?;

    let engine = open_engine(config)?;
    let rt = runtime()?;
    let exchange = rt.block_on(engine.ask(&history, question))?;

    history.push(exchange.user_turn.clone());
    history.push(exchange.assistant_turn.clone());
    archive.save(&session_id, &history)?;

    if json {
        let out = serde_json::json!({
            "session_id": session_id,
            "exchange": exchange,
        });
        let text = serde_json::to_string_pretty(&out).map_err(|e| ArchivistError::Json {
            source: e,
            context: "Failed to serialize exchange".to_string(),
        })?;
        println!("{}", text);
    } else {
        print_exchange(&exchange);
        println!("\nSession: {}", session_id);
    }
    Ok(())
}

fn open_session(archive: &SessionArchive, session: Option<String>) -> Result<(String, Vec<ChatTurn>)> {
    match session {
        Some(id) => {
            let history = archive.load(&id)?;
            Ok((id, history))
        }
        None => Ok((new_session_id(), Vec::new())),
    }
}

fn print_exchange(exchange: &Exchange) {
    println!("{}", exchange.assistant_turn.content);

    if !exchange.cited_chunks.is_empty() {
        println!("\nSources:");
        for (i, chunk) in exchange.cited_chunks.iter().enumerate() {
            println!("  [{}] {} - {}", i + 1, chunk.source_uri, chunk.preview(80));
        }
    }

    if let Some(evaluation) = &exchange.assistant_turn.evaluation {
        println!(
            "\nFaithful: {}  Relevant: {}",
            verdict_mark(evaluation.faithfulness),
            verdict_mark(evaluation.relevancy)
        );
        if !evaluation.feedback.is_empty() {
            println!("  {}", evaluation.feedback);
        }
    }

    for degradation in &exchange.degradations {
        println!("⚠ {}", degradation);
    }
}

fn verdict_mark(verdict: Option<bool>) -> &'static str {
    match verdict {
        Some(true) => "✓",
        Some(false) => "✗",
        None => "?",
    }
}

fn cmd_chat(config_path: Option<PathBuf>, profile: Option<String>, session: Option<String>) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let archive = SessionArchive::new(&config.storage.history_dir);
    let (mut session_id, mut history) = open_session(&archive, session)?;

    let engine = open_engine(config)?;
    let rt = runtime()?;

    println!("Session {} ({} messages). /new starts over, /quit leaves.", session_id, history.len());

    let stdin = std::io::stdin();
    loop {
        print!("\n> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(|e| ArchivistError::Io {
            source: e,
            context: "Failed to read input".to_string(),
        })?;
        if read == 0 {
            break;
        }

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                session_id = new_session_id();
                history.clear();
                println!("New session {}", session_id);
                continue;
            }
            question => match rt.block_on(engine.ask(&history, question)) {
                Ok(exchange) => {
                    print_exchange(&exchange);
                    history.push(exchange.user_turn);
                    history.push(exchange.assistant_turn);
                    archive.save(&session_id, &history)?;
                }
                // One failed exchange leaves the session usable
                Err(e @ (ArchivistError::EmptyCorpus | ArchivistError::AnswerUnavailable { .. })) => {
                    println!("⚠ {}", e);
                }
                Err(e) => return Err(e),
            },
        }
    }

    Ok(())
}

fn cmd_sessions(config_path: Option<PathBuf>, profile: Option<String>, action: SessionAction) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let archive = SessionArchive::new(&config.storage.history_dir);

    match action {
        SessionAction::List => {
            let sessions = archive.list()?;
            if sessions.is_empty() {
                println!("No saved sessions");
                return Ok(());
            }
            for s in sessions {
                println!(
                    "{}  {}  {}",
                    s.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    s.id,
                    s.preview
                );
            }
        }
        SessionAction::Show { id } => {
            let session = archive.load_session(&id)?;
            println!("Session {} (updated {})", session.session_id, session.updated_at.to_rfc3339());
            for turn in &session.messages {
                let role = match turn.role {
                    archivist::chat::Role::User => "user",
                    archivist::chat::Role::Assistant => "assistant",
                };
                println!("\n[{}] {}", role, turn.content);
                if let Some(evaluation) = &turn.evaluation {
                    println!(
                        "  faithful={} relevant={}",
                        verdict_mark(evaluation.faithfulness),
                        verdict_mark(evaluation.relevancy)
                    );
                }
            }
        }
        SessionAction::Delete { id } => {
            archive.delete(&id)?;
            println!("✓ Deleted session {}", id);
        }
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| ArchivistError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            ConfigValidator::validate(&config)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ArchivistError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::with_data_dir(Config::default_data_dir()?);
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Data directory: {}", config.storage.data_dir.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    let mut config = if path.exists() {
        match &profile {
            Some(profile) => Config::load_with_profile(&path, profile)?,
            None => Config::load(&path)?,
        }
    } else {
        tracing::warn!(
            "Config file not found, using defaults. Run 'archivist config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = &profile {
            config.apply_profile(profile)?;
        }
        ConfigValidator::validate(&config)?;
        config
    };

    config.storage.data_dir = expand_path(&config.storage.data_dir)?;
    config.storage.documents_dir = expand_path(&config.storage.documents_dir)?;
    config.storage.index_dir = expand_path(&config.storage.index_dir)?;
    config.storage.history_dir = expand_path(&config.storage.history_dir)?;

    Ok(config)
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ArchivistError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ArchivistError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
