//! backstagectl CLI - read-only queries and integrity checks against a Backstage catalog.

use backstagectl::output::{annotation_table, dangling_table, entity_table, owner_table};
use backstagectl::{
    AuthConfig, CatalogError, CatalogQuery, OutputFormat, RelationCheckOptions, RelationType,
    Result, Selector, Session, Table, default_config_path, find_dangling_relations,
    find_missing_annotations, find_missing_owners, find_orphans, render_entities,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "backstagectl")]
#[command(about = "A read-only command-line client for the Backstage software catalog")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Config file (default: ~/.config/backstagectl/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log catalog requests to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the catalog URL and credentials
    Login {
        /// Base URL of the Backstage instance
        #[arg(long)]
        base_url: String,

        /// Bearer token
        #[arg(long, conflicts_with_all = ["tls_cert", "tls_key"])]
        token: Option<String>,

        /// Client certificate (PEM) for mutual TLS
        #[arg(long, requires = "tls_key")]
        tls_cert: Option<PathBuf>,

        /// Client key (PEM) for mutual TLS
        #[arg(long, requires = "tls_cert")]
        tls_key: Option<PathBuf>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Show entities matching a kind or entity reference
    Get {
        /// [KIND|REF] [NAME], e.g. `component api` or `component:payments/api`
        selector: Vec<String>,

        /// Only entities carrying this annotation
        #[arg(short, long)]
        annotation: Option<String>,

        /// Output format (table, json, yaml)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// List entities of one or more kinds
    List {
        /// Comma-separated kinds, e.g. `users,groups` (default: every kind)
        kinds: Option<String>,

        /// Output format (table, json, yaml)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Check catalog integrity
    Check {
        #[command(subcommand)]
        check_command: CheckCommands,
    },
}

#[derive(Subcommand)]
enum CheckCommands {
    /// Entities the catalog flags as orphaned
    Orphan {
        /// Exit with status 2 when anything is found
        #[arg(long)]
        strict: bool,

        /// Output format (table, json, yaml)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Entities lacking an annotation
    MissingAnnotation {
        /// ANNOTATION [KIND|REF] [NAME]
        args: Vec<String>,

        /// Exit with status 2 when anything is found
        #[arg(long)]
        strict: bool,

        /// Output format (table, json, yaml)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Entities whose owner is not a known user or group
    MissingOwner {
        /// KIND|REF [NAME]
        selector: Vec<String>,

        /// Exit with status 2 when anything is found
        #[arg(long)]
        strict: bool,

        /// Output format (table, json, yaml)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Relation targets that do not exist in the catalog
    NotFound {
        /// KIND|REF [NAME]
        selector: Vec<String>,

        /// Only report targets whose reference contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Relation types to follow (dependsOn, partOf, ownedBy)
        #[arg(long, default_value = "dependsOn,partOf")]
        relations: String,

        /// Exit with status 2 when anything is found
        #[arg(long)]
        strict: bool,

        /// Output format (table, json, yaml)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

impl Commands {
    fn output(&self) -> &str {
        match self {
            Commands::Login { .. } => "table",
            Commands::Get { output, .. } | Commands::List { output, .. } => output,
            Commands::Check { check_command } => match check_command {
                CheckCommands::Orphan { output, .. }
                | CheckCommands::MissingAnnotation { output, .. }
                | CheckCommands::MissingOwner { output, .. }
                | CheckCommands::NotFound { output, .. } => output,
            },
        }
    }
}

fn is_json(format: &str) -> bool {
    format.eq_ignore_ascii_case("json")
}

fn emit_error(format: &str, err: &CatalogError) -> ! {
    if is_json(format) {
        eprintln!("{}", json!({"error": err.code(), "detail": err.to_string()}));
    } else {
        eprintln!("{}", format!("Error: {}", err).red());
    }
    process::exit(1);
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "backstagectl=debug"
    } else {
        "backstagectl=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => default_config_path(),
    }
}

fn open_session(explicit: Option<PathBuf>) -> Result<Session> {
    let path = config_path(explicit)?;
    debug!(path = %path.display(), "loading config");
    Session::open(&path)
}

fn parse_relations(list: &str) -> Result<Vec<RelationType>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<RelationType>())
        .collect()
}

/// Print a check report and return the process exit status.
fn finish_check(table: &Table, format: OutputFormat, strict: bool) -> Result<i32> {
    println!("{}", table.render(format)?);
    info!(findings = table.len(), "check complete");
    Ok(table.exit_code(strict))
}

async fn run(command: Commands, config: Option<PathBuf>) -> Result<i32> {
    match command {
        Commands::Login {
            base_url,
            token,
            tls_cert,
            tls_key,
            timeout_secs,
        } => {
            let auth = AuthConfig {
                base_url,
                token: token.unwrap_or_default(),
                tls_cert_path: tls_cert,
                tls_key_path: tls_key,
                timeout_secs,
            };
            let path = config_path(config)?;
            auth.save(&path)?;
            println!(
                "{}",
                format!("Saved configuration to {}", path.display()).green()
            );
            Ok(0)
        }

        Commands::Get {
            selector,
            annotation,
            output,
        } => {
            let format: OutputFormat = output.parse()?;
            let selector = Selector::from_args(&selector)?.with_annotation(annotation);
            let session = open_session(config)?;

            let query = CatalogQuery::new().clause(selector.to_clause());
            let entities = session.client.fetch_by_query(&query).await?;
            println!(
                "{}",
                render_entities(&entities, session.client.base_url(), format)?
            );
            Ok(0)
        }

        Commands::List { kinds, output } => {
            let format: OutputFormat = output.parse()?;
            let args: Vec<String> = kinds.into_iter().collect();
            let selector = Selector::from_kind_list(&args)?;
            let session = open_session(config)?;

            let query = CatalogQuery::new().clause(selector.to_clause());
            let entities = session.client.fetch_by_query(&query).await?;
            let table = entity_table(&entities, session.client.base_url());
            println!("{}", table.render(format)?);
            Ok(0)
        }

        Commands::Check { check_command } => run_check(check_command, config).await,
    }
}

async fn run_check(command: CheckCommands, config: Option<PathBuf>) -> Result<i32> {
    match command {
        CheckCommands::Orphan { strict, output } => {
            let format: OutputFormat = output.parse()?;
            let session = open_session(config)?;

            let orphans = find_orphans(&session.client).await?;
            let table = entity_table(&orphans, session.client.base_url());
            finish_check(&table, format, strict)
        }

        CheckCommands::MissingAnnotation {
            args,
            strict,
            output,
        } => {
            let format: OutputFormat = output.parse()?;
            let (annotation, rest) = args.split_first().ok_or_else(|| {
                CatalogError::MissingRequiredSelector("no annotation key provided".to_string())
            })?;
            let selector = Selector::from_args(rest)?;
            let session = open_session(config)?;

            let issues = find_missing_annotations(&session.client, &selector, annotation).await?;
            let table = annotation_table(&issues, session.client.base_url());
            finish_check(&table, format, strict)
        }

        CheckCommands::MissingOwner {
            selector,
            strict,
            output,
        } => {
            let format: OutputFormat = output.parse()?;
            let selector =
                Selector::from_required_args(&selector, "no kind or entity reference provided")?;
            let session = open_session(config)?;

            let issues = find_missing_owners(&session.client, &selector).await?;
            let table = owner_table(&issues, session.client.base_url());
            finish_check(&table, format, strict)
        }

        CheckCommands::NotFound {
            selector,
            filter,
            relations,
            strict,
            output,
        } => {
            let format: OutputFormat = output.parse()?;
            let selector =
                Selector::from_required_args(&selector, "no kind or entity reference provided")?;
            let options = RelationCheckOptions {
                relation_types: parse_relations(&relations)?,
                target_filter: filter,
            };
            let session = open_session(config)?;

            let report = find_dangling_relations(&session.client, &selector, &options).await?;
            let table = dangling_table(&report, session.client.base_url());
            debug!(checked = report.checked, "relation targets checked");
            finish_check(&table, format, strict)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = cli.command.output().to_string();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => emit_error(&format, &CatalogError::Io(e)),
    };

    match runtime.block_on(run(cli.command, cli.config)) {
        Ok(0) => {}
        Ok(status) => process::exit(status),
        Err(e) => emit_error(&format, &e),
    }
}
