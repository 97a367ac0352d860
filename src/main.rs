use chrono::{NaiveDate, Utc};
use reviewlens::cli::{Cli, Commands, ConfigAction};
use reviewlens::config::Config;
use reviewlens::engine::{RagEngine, ServiceContext};
use reviewlens::error::{Result, ReviewLensError};
use reviewlens::models::{QueryRequest, QueryResponse, StreamEvent};
use reviewlens::server::{expand_tilde, IpcClient, IpcMessage, IpcResponse, QueryServer};
use reviewlens::stats::{ReviewStats, ReviewStatsCollector, StatsPeriod, RATINGS};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    let config_path = cli.config;
    let profile = cli.profile;

    match cli.command {
        Commands::Ask {
            question,
            stream,
            json,
            date,
            remote,
        } => {
            let config = load_config(config_path, profile)?;
            let today = date.unwrap_or_else(|| Utc::now().date_naive());
            if remote {
                cmd_ask_remote(&config, question, stream, json, date)?;
            } else {
                cmd_ask(config, question, stream, json, today)?;
            }
        }
        Commands::Search { query, date, json } => {
            let config = load_config(config_path, profile)?;
            let today = date.unwrap_or_else(|| Utc::now().date_naive());
            cmd_search(config, &query, today, json)?;
        }
        Commands::Stats { json, remote } => {
            let config = load_config(config_path, profile)?;
            cmd_stats(config, json, remote)?;
        }
        Commands::Serve => {
            let config = load_config(config_path, profile)?;
            cmd_serve(config)?;
        }
        Commands::Status => {
            let config = load_config(config_path, profile)?;
            cmd_status(&config)?;
        }
        Commands::Config { action } => {
            cmd_config(config_path, profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "reviewlens=debug"
    } else {
        "reviewlens=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| ReviewLensError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn build_engine(config: Config) -> Result<Arc<RagEngine>> {
    let context = ServiceContext::from_config(config)?;
    Ok(Arc::new(RagEngine::new(context)?))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ReviewLensError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

fn cmd_ask(config: Config, question: String, stream: bool, json: bool, today: NaiveDate) -> Result<()> {
    let engine = build_engine(config)?;
    let request = QueryRequest::new(question);

    runtime()?.block_on(async {
        if stream {
            let mut events = engine.answer_stream(request, today);
            let mut failed = None;
            let mut printed = false;
            while let Some(event) = events.recv().await {
                if let StreamEvent::Error { message } = &event {
                    failed = Some(message.clone());
                }
                render_event(&event, json, &mut printed)?;
            }
            match failed {
                Some(message) => Err(ReviewLensError::StreamFailed(message)),
                None => Ok(()),
            }
        } else {
            match engine.answer(&request, today).await {
                Ok(response) => render_response(&response, json),
                Err(e) => {
                    tracing::debug!("Ask failed: {:?}", e);
                    eprintln!("{}", e.public_message());
                    Err(e)
                }
            }
        }
    })
}

fn cmd_ask_remote(
    config: &Config,
    question: String,
    stream: bool,
    json: bool,
    date: Option<NaiveDate>,
) -> Result<()> {
    let client = client_for(config);
    let request = QueryRequest::new(question);

    runtime()?.block_on(async {
        if stream {
            let mut render_result = Ok(());
            let mut failed = None;
            let mut printed = false;
            client
                .ask_stream(request, date, |event| {
                    if let StreamEvent::Error { message } = event {
                        failed = Some(message.clone());
                    }
                    if render_result.is_ok() {
                        render_result = render_event(event, json, &mut printed);
                    }
                })
                .await?;
            render_result?;
            match failed {
                Some(message) => Err(ReviewLensError::StreamFailed(message)),
                None => Ok(()),
            }
        } else {
            let message = IpcMessage::Ask {
                request,
                stream: false,
                date,
            };
            let response = client.send(&message).await?;
            let data = response_data(response)?;
            let answer: QueryResponse =
                serde_json::from_value(data).map_err(|e| ReviewLensError::Json {
                    source: e,
                    context: "Failed to decode server answer".to_string(),
                })?;
            render_response(&answer, json)
        }
    })
}

fn render_response(response: &QueryResponse, json: bool) -> Result<()> {
    if json {
        return print_json(response);
    }

    println!("{}", response.answer);
    if !response.context.is_empty() {
        println!("\n({} reviews used as context)", response.context.len());
    }
    Ok(())
}

/// `printed` tracks whether any answer text has reached stdout yet
fn render_event(event: &StreamEvent, json: bool, printed: &mut bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(event).map_err(|e| ReviewLensError::Json {
            source: e,
            context: "Failed to serialize event".to_string(),
        })?;
        println!("{}", line);
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    match event {
        StreamEvent::Metadata { data } => {
            tracing::info!("Answering from {} reviews", data.context.len());
        }
        StreamEvent::Token { text } | StreamEvent::Answer { text } => {
            print!("{}", text);
            stdout.flush().ok();
            *printed = true;
        }
        StreamEvent::Done { text } => {
            // Declines and empty results arrive with no preceding tokens
            if *printed {
                println!();
            } else {
                println!("{}", text);
            }
        }
        StreamEvent::Error { message } => {
            println!();
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

fn cmd_search(config: Config, query: &str, today: NaiveDate, json: bool) -> Result<()> {
    let engine = build_engine(config)?;

    let (parsed, hits) = runtime()?.block_on(engine.search(query, today))?;

    if json {
        return print_json(&serde_json::json!({
            "parsed": parsed,
            "hits": hits,
        }));
    }

    println!("Embedding text: {}", parsed.embedding_text);
    println!("Intent: {}", parsed.intent.as_str());
    if parsed.off_topic {
        println!("Question is off-topic; nothing retrieved");
        return Ok(());
    }
    if let Some(filter) = &parsed.filter {
        let filter = serde_json::to_string(filter).unwrap_or_default();
        println!("Filter: {}", filter);
    }

    println!("\n{} results:", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let rating = hit
            .payload
            .rating
            .map(|r| format!("{}★", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}. [{:.3}] {} {} {}",
            i + 1,
            hit.combined_score,
            hit.id,
            rating,
            hit.preview(120)
        );
    }
    Ok(())
}

fn cmd_stats(config: Config, json: bool, remote: bool) -> Result<()> {
    let stats: ReviewStats = if remote {
        let client = client_for(&config);
        let response = runtime()?.block_on(client.send(&IpcMessage::Stats))?;
        serde_json::from_value(response_data(response)?).map_err(|e| ReviewLensError::Json {
            source: e,
            context: "Failed to decode server stats".to_string(),
        })?
    } else {
        let max_concurrent = config.stats.max_concurrent;
        let context = ServiceContext::from_config(config)?;
        let collector = ReviewStatsCollector::new(context.store.clone(), max_concurrent);
        runtime()?.block_on(collector.collect(Utc::now()))?
    };

    if json {
        return print_json(&stats);
    }

    println!("Review counts as of {}", stats.generated_at.format("%Y-%m-%d %H:%M UTC"));
    println!("\n{:<8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>9}", "period", "1★", "2★", "3★", "4★", "5★", "total");
    for period in StatsPeriod::ALL {
        let label = format!("{:?}", period).to_lowercase();
        print!("{:<8}", label);
        for rating in RATINGS {
            print!("{:>8}", stats.count(period, rating).unwrap_or(0));
        }
        println!("{:>9}", stats.total(period));
    }
    Ok(())
}

fn cmd_serve(config: Config) -> Result<()> {
    let engine = build_engine(config)?;
    let server = QueryServer::new(engine);

    println!("✓ Serving on {}", server.socket_path().display());
    runtime()?.block_on(server.run())
}

fn cmd_status(config: &Config) -> Result<()> {
    let client = client_for(config);
    match runtime()?.block_on(client.send(&IpcMessage::Status)) {
        Ok(response) => {
            let data = response_data(response)?;
            println!("ReviewLens Status");
            println!("=================");
            println!("\nServer: running");
            print_json(&data)?;
        }
        Err(e) => {
            tracing::debug!("Status request failed: {}", e);
            println!("Server: not running");
        }
    }
    Ok(())
}

fn client_for(config: &Config) -> IpcClient {
    IpcClient::new(expand_tilde(&config.server.socket_path))
        .with_max_message_size(config.server.max_message_size)
}

fn response_data(response: IpcResponse) -> Result<serde_json::Value> {
    if !response.success {
        return Err(ReviewLensError::Server(
            response
                .message
                .unwrap_or_else(|| "Request failed".to_string()),
        ));
    }
    response
        .data
        .ok_or_else(|| ReviewLensError::Server("Response carried no data".to_string()))
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = serde_json::to_value(&config).map_err(|e| ReviewLensError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            match section {
                Some(section) => {
                    let part = value.get(&section).ok_or_else(|| {
                        ReviewLensError::Config(format!("Unknown config section: {}", section))
                    })?;
                    print_json(part)?;
                }
                None => print_json(&value)?,
            }
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

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ReviewLensError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
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
            "Config file not found, using defaults. Run 'reviewlens config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}
