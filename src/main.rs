//! chatloop - main CLI entry point

use anyhow::{Context, Result};
use chatloop::agent::{AgentDefinition, AgentLoader};
use chatloop::cli::{load_dotenv, Args, ChatConfig, EngineConfig};
use chatloop::repl::{ConsoleShell, DisplayManager, InputHandler, LineSource};
use chatloop::session::StatusBar;
use chatloop::streaming::StreamCollector;
use chatloop::templates::TemplateStore;
use chatloop::{logging, QueryExecutor};
use clap::Parser;
use colored::Colorize;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let env_file = load_dotenv();

    let config = ChatConfig::load(args.config.as_deref()).context("Invalid configuration")?;

    let definition = AgentDefinition::from_file(&args.agent)?;
    let agent_name = definition.display_name(&args.agent);
    let engine = EngineConfig::resolve(&config, &agent_name)
        .with_context(|| format!("Invalid configuration for agent '{}'", agent_name))?;

    match logging::init(&engine.paths.log_dir, &agent_name, args.verbosity().log_level()) {
        Ok(path) => tracing::info!(log = %path.display(), "Logging initialized"),
        Err(e) => eprintln!("{} {}", "Warning:".yellow(), e),
    }
    if let Some(path) = env_file {
        tracing::info!(path = %path.display(), "Environment loaded");
    }
    for source in config.sources() {
        tracing::info!(path = %source.display(), "Configuration loaded");
    }

    let loader = AgentLoader::new(&args.agent, engine.timeout);
    let agent = loader
        .build(&definition)
        .with_context(|| format!("Could not start agent '{}'", agent_name))?;

    let model_label = engine
        .model_display_name
        .clone()
        .unwrap_or_else(|| agent.profile().model_label());
    tracing::info!(agent = %agent_name, model = %model_label, "Agent loaded");

    let executor = QueryExecutor::new(
        StreamCollector::new(engine.timeout, engine.indicator.clone()),
        engine.retry_policy(),
    );

    let display = DisplayManager::new(
        agent_name.clone(),
        engine.palette,
        engine.features,
        engine.paths.clone(),
    )
    .with_file_backed(engine.file_backed)
    .with_status_bar(StatusBar::new(
        agent_name.clone(),
        &model_label,
        engine.features.show_tokens,
    ));

    let input: Box<dyn LineSource> = Box::new(
        InputHandler::with_history(engine.paths.history_file.clone())
            .context("Could not initialize line editor")?,
    );

    let shell = ConsoleShell::new(
        agent,
        executor,
        TemplateStore::new(engine.paths.prompts_dir.clone()),
        display,
        input,
        model_label,
    )
    .with_factory(loader.into_factory());

    let report = shell.run().await;
    tracing::info!(
        session = %report.session_id,
        reason = ?report.reason,
        queries = report.queries,
        "Exiting"
    );

    Ok(())
}
