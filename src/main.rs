use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stratus::config::Config;
use stratus::crawler::{CrawlOptions, RepositoryType};
use stratus::federation::{SearchService, ShardProber, ShardRegistry};
use stratus::index::query::QueryInput;
use stratus::index::IndexClient;
use stratus::models::RecordType;
use stratus::pipeline::orchestrator::PublishingService;

#[derive(Parser)]
#[command(
    name = "stratus",
    version,
    about = "Federated metadata harvesting, publishing, and search node",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML configuration file (environment otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a catalog tree and publish its datasets
    Publish {
        /// Root catalog location
        location: String,

        /// Repository type of the catalog source
        #[arg(short = 't', long, default_value = "thredds")]
        repository_type: String,

        /// Only visit catalog locations matching this regular expression
        #[arg(short, long)]
        filter: Option<String>,

        /// Visit the root catalog only, without recursing
        #[arg(long, default_value = "false")]
        no_recurse: bool,

        /// Validate against this named sub-schema
        #[arg(short, long)]
        schema: Option<String>,

        /// Publish records as replicas of another node's originals
        #[arg(long, default_value = "false")]
        replica: bool,
    },

    /// Crawl a catalog tree and remove its datasets, or remove by id
    Unpublish {
        /// Root catalog location
        #[arg(short, long, conflicts_with = "id")]
        location: Option<String>,

        /// Record id to remove (repeatable)
        #[arg(short, long)]
        id: Vec<String>,

        /// Repository type of the catalog source
        #[arg(short = 't', long, default_value = "thredds")]
        repository_type: String,

        /// Record type of the ids being removed
        #[arg(long, default_value = "Dataset")]
        record_type: String,

        /// Only visit catalog locations matching this regular expression
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Flag records as retracted while keeping them searchable
    Retract {
        /// Record id to retract (repeatable)
        #[arg(short, long, required = true)]
        id: Vec<String>,

        /// Record type of the ids being retracted
        #[arg(long, default_value = "Dataset")]
        record_type: String,
    },

    /// Run a federated search across the configured shards
    Search {
        /// Free-text query
        #[arg(default_value = "*:*")]
        query: String,

        /// Exact-match constraint in field=value form (repeatable)
        #[arg(short = 'C', long)]
        constraint: Vec<String>,

        /// Facet dimension to compute a distribution for (repeatable)
        #[arg(short = 'F', long)]
        facet: Vec<String>,

        /// Record type to search
        #[arg(long, default_value = "Dataset")]
        record_type: String,

        /// Pagination offset
        #[arg(long, default_value = "0")]
        start: usize,

        /// Page size
        #[arg(short, long)]
        rows: Option<usize>,

        /// Query the local index only, ignoring the shard set
        #[arg(long, default_value = "false")]
        local_only: bool,
    },

    /// Probe the configured shards and report their health
    Probe,

    /// Ask the local index engine to optimize a core's storage
    Optimize {
        /// Record type whose core should be optimized
        #[arg(long, default_value = "Dataset")]
        record_type: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Publish {
            location,
            repository_type,
            filter,
            no_recurse,
            schema,
            replica,
        } => {
            tracing::info!(location = %location, "Starting publish command");
            publish(
                &config,
                location,
                repository_type,
                filter,
                no_recurse,
                schema,
                replica,
            )
            .await?;
        }

        Commands::Unpublish {
            location,
            id,
            repository_type,
            record_type,
            filter,
        } => {
            tracing::info!(
                location = ?location,
                ids = id.len(),
                "Starting unpublish command"
            );
            unpublish(&config, location, id, repository_type, record_type, filter).await?;
        }

        Commands::Retract { id, record_type } => {
            tracing::info!(ids = id.len(), "Starting retract command");
            retract(&config, id, record_type).await?;
        }

        Commands::Search {
            query,
            constraint,
            facet,
            record_type,
            start,
            rows,
            local_only,
        } => {
            tracing::info!(query = %query, "Starting search command");
            search(
                &config,
                query,
                constraint,
                facet,
                record_type,
                start,
                rows,
                local_only,
            )
            .await?;
        }

        Commands::Probe => {
            tracing::info!(shards = config.federation.shards.len(), "Starting probe command");
            probe(&config).await?;
        }

        Commands::Optimize { record_type } => {
            tracing::info!(record_type = %record_type, "Starting optimize command");
            let record_type = parse_record_type(&record_type)?;
            let index = IndexClient::new(&config.index)?;
            index.optimize(record_type).await?;
            println!("Optimize request accepted");
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("stratus=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("stratus=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn parse_repository_type(s: &str) -> Result<RepositoryType> {
    RepositoryType::parse(s).with_context(|| format!("Unknown repository type: {s}"))
}

fn parse_record_type(s: &str) -> Result<RecordType> {
    RecordType::parse(s).with_context(|| format!("Unknown record type: {s}"))
}

fn crawl_options(filter: Option<String>, recursive: bool, schema: Option<String>, replica: bool) -> Result<CrawlOptions> {
    let filter = filter
        .map(|f| regex::Regex::new(&f).with_context(|| format!("Invalid filter pattern: {f}")))
        .transpose()?;
    Ok(CrawlOptions {
        filter,
        recursive,
        publish: true,
        schema,
        replica,
    })
}

async fn publish(
    config: &Config,
    location: String,
    repository_type: String,
    filter: Option<String>,
    no_recurse: bool,
    schema: Option<String>,
    replica: bool,
) -> Result<()> {
    let repository_type = parse_repository_type(&repository_type)?;
    let options = crawl_options(filter, !no_recurse, schema, replica)?;

    let service = PublishingService::from_config(config)?;
    let stats = service.publish(&location, repository_type, options).await?;

    println!("Publish finished");
    println!("  Catalogs visited:  {}", stats.catalogs_visited);
    println!("  Records published: {}", stats.records_published);
    println!("  Subtrees skipped:  {}", stats.subtrees_skipped);
    println!("  Errors:            {}", stats.errors);
    Ok(())
}

async fn unpublish(
    config: &Config,
    location: Option<String>,
    ids: Vec<String>,
    repository_type: String,
    record_type: String,
    filter: Option<String>,
) -> Result<()> {
    let service = PublishingService::from_config(config)?;

    if let Some(location) = location {
        let repository_type = parse_repository_type(&repository_type)?;
        let options = crawl_options(filter, true, None, false)?;
        let stats = service.unpublish(&location, repository_type, options).await?;

        println!("Unpublish finished");
        println!("  Catalogs visited: {}", stats.catalogs_visited);
        println!("  Records removed:  {}", stats.records_removed);
        println!("  Errors:           {}", stats.errors);
    } else if !ids.is_empty() {
        let record_type = parse_record_type(&record_type)?;
        service.unpublish_ids(record_type, &ids).await?;
        println!("Removed {} record(s)", ids.len());
    } else {
        anyhow::bail!("unpublish needs either --location or at least one --id");
    }
    Ok(())
}

async fn retract(config: &Config, ids: Vec<String>, record_type: String) -> Result<()> {
    let record_type = parse_record_type(&record_type)?;
    let service = PublishingService::from_config(config)?;
    let retracted = service.retract(record_type, &ids).await?;
    println!("Retracted {retracted} of {} record(s)", ids.len());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn search(
    config: &Config,
    query: String,
    constraints: Vec<String>,
    facets: Vec<String>,
    record_type: String,
    start: usize,
    rows: Option<usize>,
    local_only: bool,
) -> Result<()> {
    let record_type = parse_record_type(&record_type)?;

    let mut input = QueryInput::new(query)
        .paginate(start, rows.unwrap_or(config.federation.default_rows));
    for constraint in &constraints {
        let (field, value) = constraint
            .split_once('=')
            .with_context(|| format!("Constraint must be field=value: {constraint}"))?;
        input = input.constrain(field, value);
    }
    for facet in facets {
        input = input.facet(facet);
    }

    let index = IndexClient::new(&config.index)?;
    let result = if local_only || config.federation.shards.is_empty() {
        index.search(record_type, &input).await?
    } else {
        let registry = Arc::new(ShardRegistry::new(&config.federation.shards));
        let prober = ShardProber::new(&config.federation)?;
        SearchService::new(index, registry, prober)
            .search(record_type, input)
            .await?
    };

    println!("Found {} record(s)", result.num_found);
    for record in &result.records {
        let title = record.first_value("title").unwrap_or(&record.id);
        println!("  {}  [{}]  {}", record.id, record.record_type, title);
    }
    for (field, options) in &result.facets {
        println!("Facet {field}:");
        for option in options {
            println!("  {} ({})", option.value, option.count);
        }
    }
    Ok(())
}

async fn probe(config: &Config) -> Result<()> {
    let registry = ShardRegistry::new(&config.federation.shards);
    let prober = ShardProber::new(&config.federation)?;

    let probed = prober.probe_all(registry.snapshot().await).await;
    if probed.is_empty() {
        println!("No shards configured");
        return Ok(());
    }

    for shard in &probed {
        if shard.is_healthy {
            let latency = shard
                .last_probe_latency
                .map(|d| format!("{}ms", d.as_millis()))
                .unwrap_or_else(|| "-".to_string());
            let count = shard
                .last_known_result_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {}  healthy  latency={latency}  records={count}", shard.host_address);
        } else {
            println!("  {}  unhealthy", shard.host_address);
        }
    }
    Ok(())
}
