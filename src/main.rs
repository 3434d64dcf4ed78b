use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use qtriage::cli::{Cli, Commands, ConfigAction, HistoryAction};
use qtriage::client::{HistoryCommand, HistoryReply, HttpBackend, QaBackend, Upload};
use qtriage::config::{expand_path, Config};
use qtriage::error::{Result, TriageError};
use qtriage::export::write_export;
use qtriage::filtering::{filter_with_stats, TierFilter};
use qtriage::ingestion::{BatchPayload, Feedback, QuestionRecord};
use qtriage::references::{DocumentMap, ReferenceResolver, DEFAULT_DOCUMENTS_TOML};
use qtriage::submission::{SubmissionController, SubmissionOutcome, ViewHandle};
use qtriage::triage::{TriageState, TriageStore};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    let config_path = cli.config;
    let profile = cli.profile;

    // Handle commands
    match cli.command {
        Commands::Ingest { payload, tier, json } => {
            let config = load_config(config_path, profile)?;
            cmd_ingest(&config, &payload, tier, json)?;
        }
        Commands::Export {
            payload,
            output_dir,
            approve,
            reject,
        } => {
            let config = load_config(config_path, profile)?;
            cmd_export(&config, &payload, output_dir, &approve, &reject)?;
        }
        Commands::Submit {
            questionnaire,
            export,
            tier,
        } => {
            let config = load_config(config_path, profile)?;
            cmd_submit(&config, &questionnaire, export, tier)?;
        }
        Commands::Ask { message } => {
            let config = load_config(config_path, profile)?;
            cmd_ask(&config, &message)?;
        }
        Commands::History { action } => {
            let config = load_config(config_path, profile)?;
            cmd_history(&config, action)?;
        }
        Commands::Resolve { citations } => {
            let config = load_config(config_path, profile)?;
            cmd_resolve(&config, &citations)?;
        }
        Commands::Config { action } => {
            cmd_config(config_path, profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "qtriage=debug" } else { "qtriage=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| TriageError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn cmd_ingest(config: &Config, payload_path: &Path, tier: TierFilter, json: bool) -> Result<()> {
    let payload = read_payload(payload_path)?;
    let store = TriageStore::new();
    let state = store.set_results(&payload);

    let (records, stats) = filter_with_stats(state.records(), &tier);

    if json {
        let json = serde_json::to_string_pretty(&records).map_err(|e| TriageError::Json {
            source: e,
            context: "Failed to serialize records".to_string(),
        })?;
        println!("{}", json);
        return Ok(());
    }

    print_summary(&state);
    println!(
        "\nShowing {} of {} records (filter: {})",
        stats.output_records, stats.input_records, stats.filter
    );
    print_records(&records, &load_resolver(config)?);

    Ok(())
}

fn cmd_export(
    config: &Config,
    payload_path: &Path,
    output_dir: Option<PathBuf>,
    approve: &[String],
    reject: &[String],
) -> Result<()> {
    let payload = read_payload(payload_path)?;
    let store = TriageStore::new();
    store.set_results(&payload);

    let verdicts = approve
        .iter()
        .map(|id| (id, Feedback::Approved))
        .chain(reject.iter().map(|id| (id, Feedback::Rejected)));
    for (id, verdict) in verdicts {
        let state = store.set_feedback(id, verdict);
        if !state.batch().is_some_and(|b| b.contains(id)) {
            tracing::warn!(id = %id, "No question with this id, verdict ignored");
        }
    }

    let state = store.snapshot();
    let batch = state.batch().ok_or(TriageError::NoBatchLoaded)?;
    let dir = expand_path(&output_dir.unwrap_or_else(|| config.export.output_dir.clone()))?;
    let path = write_export(batch, &dir, Utc::now())?;

    println!("✓ Exported {} records", batch.questions().len());
    println!("  File: {}", path.display());

    Ok(())
}

fn cmd_submit(config: &Config, questionnaire: &Path, export: bool, tier: TierFilter) -> Result<()> {
    let upload = Upload::from_path(questionnaire, &config.upload.allowed_extensions)?;
    let backend = HttpBackend::from_config(config)?;
    let controller = SubmissionController::new(
        backend,
        Arc::new(TriageStore::new()),
        ViewHandle::new(),
        config.notifications.dismiss_duration()?,
    );

    println!("Submitting {} ({} bytes)...", upload.file_name, upload.bytes.len());

    let rt = runtime()?;
    let outcome = match rt.block_on(controller.submit(&upload)) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(note) = controller.notification(Utc::now()) {
                eprintln!("✗ {}", note.message);
            }
            return Err(e);
        }
    };

    let state = match outcome {
        SubmissionOutcome::Applied(state) => state,
        SubmissionOutcome::Discarded => return Ok(()),
    };

    print_summary(&state);
    let (records, stats) = filter_with_stats(state.records(), &tier);
    println!(
        "\nShowing {} of {} records (filter: {})",
        stats.output_records, stats.input_records, stats.filter
    );
    print_records(&records, &load_resolver(config)?);

    if export {
        let batch = state.batch().ok_or(TriageError::NoBatchLoaded)?;
        let dir = expand_path(&config.export.output_dir)?;
        let path = write_export(batch, &dir, Utc::now())?;
        println!("\n✓ Exported to {}", path.display());
    }

    Ok(())
}

fn cmd_ask(config: &Config, message: &str) -> Result<()> {
    let backend = HttpBackend::from_config(config)?;
    let rt = runtime()?;
    let response = rt.block_on(backend.ask(message))?;

    let answer = response.answer();
    println!("{}", answer.text);
    println!(
        "\nConfidence: {} ({})",
        response.tier(),
        display_or_dash(&response.confidence().display_value())
    );

    let references = response.references();
    if !references.is_empty() {
        println!("References:");
        let resolver = load_resolver(config)?;
        for reference in resolver.resolve_all(&references) {
            println!("  - {}", render_reference(&reference.citation, reference.url.as_deref()));
        }
    }

    Ok(())
}

fn cmd_history(config: &Config, action: HistoryAction) -> Result<()> {
    let command = HistoryCommand::from(action);
    let backend = HttpBackend::from_config(config)?;
    let rt = runtime()?;

    match rt.block_on(backend.history(&command))? {
        HistoryReply::Topics(topics) => {
            if topics.is_empty() {
                println!("No saved conversations");
            }
            for topic in topics {
                let marker = if topic.active { "*" } else { " " };
                println!("{} {}  {}", marker, topic.id, topic.title);
            }
        }
        HistoryReply::Messages(messages) => {
            for message in messages {
                println!("[{}] {}", message.kind, message.text());
            }
        }
        HistoryReply::TopicId(id) => println!("✓ Started conversation {}", id),
        HistoryReply::Status(status) => println!("{}", status),
    }

    Ok(())
}

fn cmd_resolve(config: &Config, citations: &[String]) -> Result<()> {
    let resolver = load_resolver(config)?;
    for reference in resolver.resolve_all(citations) {
        println!(
            "{} -> {}",
            reference.citation,
            reference.url.as_deref().unwrap_or("(unlinked)")
        );
    }
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| TriageError::Json {
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
                std::fs::create_dir_all(parent).map_err(|e| TriageError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            // Save default config
            let config = Config::default();
            config.save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());

            let mapping = expand_path(&config.references.mapping_file)?;
            install_document_map(&mapping, force)?;
            println!("✓ Document mapping table installed at: {}", mapping.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'qtriage config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn install_document_map(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TriageError::Io {
            source: e,
            context: format!("Failed to create directory: {:?}", parent),
        })?;
    }

    std::fs::write(path, DEFAULT_DOCUMENTS_TOML).map_err(|e| TriageError::Io {
        source: e,
        context: format!("Failed to write documents.toml: {:?}", path),
    })
}

fn load_resolver(config: &Config) -> Result<ReferenceResolver> {
    let path = expand_path(&config.references.mapping_file)?;
    Ok(ReferenceResolver::new(DocumentMap::load_or_builtin(&path)?))
}

fn read_payload(path: &Path) -> Result<BatchPayload> {
    let content = std::fs::read_to_string(path).map_err(|e| TriageError::Io {
        source: e,
        context: format!("Failed to read batch payload: {:?}", path),
    })?;
    BatchPayload::from_json_str(&content)
}

fn print_summary(state: &TriageState) {
    let Some(batch) = state.batch() else {
        println!("No batch loaded");
        return;
    };
    let counts = batch.tier_counts();

    println!("Triage Summary");
    println!("==============");
    println!("  Total questions:  {}", batch.total_questions());
    println!("  Answered:         {}", batch.answered_questions());
    println!("  High confidence:  {}", counts.high);
    println!("  Medium:           {}", counts.medium);
    println!("  Low:              {}", counts.low);
    println!("  Needs review:     {}", counts.needs_review());
}

fn print_records(records: &[&QuestionRecord], resolver: &ReferenceResolver) {
    for record in records {
        println!(
            "\n[{}] {} ({})",
            record.id,
            record.confidence_tier,
            display_or_dash(&record.confidence_raw.display_value())
        );
        println!("  Q: {}", record.question_text);
        println!("  A: {}", record.normalized_answer_text);
        if let Some(feedback) = record.feedback {
            println!("  Verdict: {}", feedback.as_str());
        }
        for reference in resolver.resolve_all(&record.references) {
            println!(
                "  ref: {}",
                render_reference(&reference.citation, reference.url.as_deref())
            );
        }
    }
}

fn render_reference(citation: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("{} <{}>", citation, url),
        None => citation.to_string(),
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
