//! checkrun - main entry point
//!
//! Thin bootstrap: parse the CLI, initialize logging, wire the registry,
//! plugin manager, queue, service and worker together, and dispatch one
//! command. All behavior lives in the library.

use std::sync::Arc;
use tracing::info;

use checkrun::checks::FileAuditCheck;
use checkrun::cli::{Cli, Commands};
use checkrun::{
    AppConfig, CheckStore, EventBus, JobQueue, JobService, MemoryStore, PluginManager,
    ScriptRegistry, Worker,
};

/// Initialize the tracing subscriber with env-filter overrides.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Populate the factory map with one audit unit per discovered file.
///
/// This is the static-registration path: every qualifying file in the
/// script folder is backed by a [`FileAuditCheck`] over the current
/// directory. A deployment with bespoke units would register their
/// factories here instead.
fn build_registry(config: &AppConfig) -> anyhow::Result<ScriptRegistry> {
    let mut registry = ScriptRegistry::new(config.scripts.clone());
    for id in registry.discover()? {
        let unit = id.clone();
        registry.register_factory(
            id,
            Box::new(move || Box::new(FileAuditCheck::new(&unit, "."))),
        )?;
    }
    Ok(registry)
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse_args();
    let config = AppConfig::load_from_file(&cli.config)?;
    info!(config = %cli.config.display(), "configuration loaded");

    if let Commands::Validate = cli.command {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    let registry = Arc::new(build_registry(&config)?);
    let store: Arc<dyn CheckStore> = Arc::new(MemoryStore::new());
    let plugins = Arc::new(PluginManager::new(registry, Arc::clone(&store)));
    let queue = Arc::new(JobQueue::new());
    let service = JobService::new(Arc::clone(&store), Arc::clone(&plugins), Arc::clone(&queue));

    match cli.command {
        Commands::Validate => unreachable!("handled above"),
        Commands::Discover => {
            let found = plugins.search_new()?;
            if found.is_empty() {
                println!("no new units in {}", config.scripts.folder.display());
            }
            for unit in found {
                println!(
                    "{}\t{}\t{}\t{}",
                    unit.id,
                    unit.author,
                    if unit.ready { "ready" } else { "not ready" },
                    unit.description
                );
            }
        }
        Commands::Run { id } => {
            let check_id = plugins.register(&id)?;
            let link_id = service.grant(1, check_id)?;
            let job_id = service.submit(check_id, link_id)?;

            let events = Arc::new(EventBus::new());
            let worker = Worker::new(Arc::clone(&store), Arc::clone(&queue), events);
            worker.spawn().shutdown();

            let job = store.read_job(job_id)?;
            println!(
                "job {} finished: status={} objects={}",
                job.id,
                job.status,
                job.object_count
                    .map_or_else(|| "-".to_string(), |c| c.to_string())
            );
            for finding in store.findings_for_job(job_id)? {
                println!(
                    "  [{}] {}\t{}",
                    finding.severity, finding.name, finding.identifier
                );
            }
        }
    }
    Ok(())
}
