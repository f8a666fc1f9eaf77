use juris::{
    api::routes::create_router,
    cli::{
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands,
    },
    research::{spawn_sweeper, ReportFormat, ReportLength, ReportOptions, ResearchRequest},
    utils::bootstrap,
    AppState, InMemoryJobStore, JobState, JurisConfig, RetrievalComponent, SearchFilters,
};
use std::{path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(default_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("juris={level},juris_server={level},tower_http={level}", level = default_level)
            .into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

fn load_config(path: &Path, output: &Output) -> anyhow::Result<JurisConfig> {
    match JurisConfig::load(path) {
        Ok(config) => Ok(config),
        Err(e) => {
            output.error(&format!("Failed to load {}: {}", path.display(), e));
            output.hint("Run 'juris-server init' to create a configuration");
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        None | Some(Commands::Serve) => serve(&cli.config, cli.verbose, cli.json_logs, &output).await,
        Some(Commands::Init {
            path,
            force,
            provider,
            web_provider,
            host,
            port,
        }) => {
            let result = init::run(
                InitConfig {
                    path,
                    force,
                    provider,
                    web_provider,
                    host,
                    port,
                },
                &output,
            );
            match result {
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
                InitResult::Error(e) => Err(anyhow::anyhow!(e)),
            }
        }
        Some(Commands::Config { full, validate }) => show_config(&cli.config, full, validate, &output),
        Some(Commands::Research {
            query,
            no_case_law,
            no_web,
            year_start,
            year_end,
            format,
            length,
            timeout_secs,
        }) => {
            let level = if cli.verbose { "debug" } else { "warn" };
            init_tracing(level, cli.json_logs);

            let mut config = load_config(&cli.config, &output)?;
            if no_case_law {
                config.case_law.enabled = false;
            }
            if no_web {
                config.web.enabled = false;
            }
            config.validate()?;

            let request = ResearchRequest::new(query)
                .with_components(config.enabled_components())
                .with_filters(SearchFilters::new(year_start, year_end))
                .with_options(ReportOptions {
                    format: format.parse::<ReportFormat>()?,
                    length: length.parse::<ReportLength>()?,
                });
            run_research(&config, request, Duration::from_secs(timeout_secs), &output).await
        }
    }
}

async fn serve(config_path: &Path, verbose: bool, json_logs: bool, output: &Output) -> anyhow::Result<()> {
    let config = load_config(config_path, output)?;
    let level = if verbose {
        "debug".to_string()
    } else {
        config.server.log_level.clone()
    };
    init_tracing(&level, json_logs);

    let storage = bootstrap::storage_provider(&config)?;
    let store = storage.create_store().await?;
    tracing::info!(backend = storage.name(), "Job store ready");

    let orchestrator = bootstrap::build_orchestrator(&config, store).await?;

    if storage.is_durable() {
        let resumed = orchestrator.resume_incomplete().await?;
        if resumed > 0 {
            tracing::info!(jobs = resumed, "Recovered unfinished research jobs");
        }
    }

    if let Some(max_age) = config.retention_max_age() {
        spawn_sweeper(orchestrator.clone(), max_age, config.sweep_interval());
        tracing::info!(max_age_secs = max_age.as_secs(), "Retention sweeper started");
    }

    let addr = config.bind_address();
    let state = AppState {
        config: Arc::new(config),
        orchestrator,
    };

    let app = create_router().with_state(state).layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
    );

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("JURIS listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

fn show_config(path: &Path, full: bool, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = JurisConfig::load_unchecked(path)?;

    output.header(&format!("Configuration ({})", path.display()));
    output.kv("server", &config.bind_address());
    output.kv("storage", &format!("{:?}", config.storage.backend).to_lowercase());
    output.kv(
        "llm",
        &format!("{:?} / {}", config.llm.provider, config.llm.model).to_lowercase(),
    );
    output.subheader("Retrieval components");
    for component in RetrievalComponent::ALL {
        let enabled = config.enabled_components().contains(&component);
        output.list_item(&format!(
            "{} ({})",
            component.label(),
            if enabled { "enabled" } else { "disabled" }
        ));
    }
    output.kv(
        "retention",
        &config
            .retention
            .max_age_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "keep forever".to_string()),
    );

    if full {
        output.subheader("Full configuration");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if validate {
        output.newline();
        match config.validate() {
            Ok(()) => output.success("Configuration is valid"),
            Err(e) => {
                output.error(&e.to_string());
                return Err(e.into());
            }
        }
    }

    Ok(())
}

async fn run_research(
    config: &JurisConfig,
    request: ResearchRequest,
    limit: Duration,
    output: &Output,
) -> anyhow::Result<()> {
    let orchestrator =
        bootstrap::build_orchestrator(config, Arc::new(InMemoryJobStore::new())).await?;
    let format = request.options.format;

    let id = orchestrator.submit(request).await?;
    let job = orchestrator.get_status(&id).await?;
    for advisory in job.advisories() {
        output.warning(advisory);
    }

    let mut events = orchestrator.subscribe();
    let id_for_progress = id.clone();
    let progress_output = *output;
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if event.job_id != id_for_progress {
                continue;
            }
            progress_output.event(&event);
            if event.state.is_terminal() {
                break;
            }
        }
    });

    let job = orchestrator.wait_for_terminal(&id, limit).await?;
    progress.abort();

    match (job.state(), job.report(), job.error()) {
        (JobState::Completed, Some(report), _) => {
            output.newline();
            match format {
                ReportFormat::Markdown => println!("{}", report.to_markdown()),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            }
            Ok(())
        }
        (_, _, Some(error)) => {
            for component_error in &error.component_errors {
                output.component_failure(component_error);
            }
            output.error(&error.message);
            Err(anyhow::anyhow!("research job {} failed", id))
        }
        _ => Err(anyhow::anyhow!("research job {} ended without a result", id)),
    }
}
