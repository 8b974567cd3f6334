//! `optimizeql` - explain-plan driven optimization suggestions from the terminal

mod logging;
mod output;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use logging::LoggingConfig;
use optimizeql_analyzer::{Analyzer, Introspector, PromptBuilder, compare, extract_table_names};
use optimizeql_core::{ConnectionConfig, Dialect, IntrospectionContext, Settings};
use optimizeql_drivers::with_connector;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "optimizeql", version, about = "Explain-plan driven SQL optimization suggestions")]
struct Cli {
    /// Settings file (default: <config dir>/optimizeql/config.toml)
    #[arg(long, global = true, env = "OPTIMIZEQL_CONFIG")]
    config: Option<PathBuf>,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tables a statement reads or writes
    Tables {
        /// SQL text, or @path to read it from a file
        sql: String,

        #[arg(long)]
        dialect: Option<Dialect>,
    },
    /// Print the system and user messages that would be sent to the model
    Prompt(PromptArgs),
    /// Introspect a statement and ask the model for suggestions
    Analyze(AnalyzeArgs),
    /// Run a statement and its rewrite and compare their rows
    Compare(CompareArgs),
    /// Check that the database is reachable
    TestConnection {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct ConnectionArgs {
    /// postgresql or mysql; without it, prompt and analyze run offline
    #[arg(long, env = "OPTIMIZEQL_DIALECT")]
    dialect: Option<Dialect>,

    #[arg(long, env = "OPTIMIZEQL_HOST", default_value = "localhost")]
    host: String,

    /// Defaults to the dialect's standard port
    #[arg(long, env = "OPTIMIZEQL_PORT")]
    port: Option<u16>,

    #[arg(long, env = "OPTIMIZEQL_USER")]
    user: Option<String>,

    #[arg(long, env = "OPTIMIZEQL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "OPTIMIZEQL_DATABASE")]
    database: Option<String>,

    /// Require TLS
    #[arg(long, env = "OPTIMIZEQL_SSL")]
    ssl: bool,
}

impl ConnectionArgs {
    /// `None` when no dialect was given
    fn config(&self) -> Option<ConnectionConfig> {
        let dialect = self.dialect?;
        let mut config = ConnectionConfig::new(dialect, &self.host);
        if let Some(port) = self.port {
            config.port = port;
        }
        config.database = self.database.clone();
        config.username = self.user.clone();
        config.password = self.password.clone();
        config.ssl = self.ssl;
        Some(config)
    }

    fn require_config(&self, command: &str) -> Result<ConnectionConfig> {
        match self.config() {
            Some(config) => Ok(config),
            None => bail!("{} needs a database: pass --dialect and connection options", command),
        }
    }
}

#[derive(Args, Debug)]
struct PromptArgs {
    /// SQL text, or @path to read it from a file
    sql: String,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Skip the database even when a dialect is configured
    #[arg(long)]
    offline: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// SQL text, or @path to read it from a file
    sql: String,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[arg(long)]
    offline: bool,

    /// Provider tag for this run, overriding `llm_provider`
    #[arg(long)]
    provider: Option<String>,

    /// Model for this run
    #[arg(long)]
    model: Option<String>,

    /// Identifier echoed in the result; a UUID by default
    #[arg(long)]
    query_id: Option<String>,

    /// Print a table instead of JSON
    #[arg(long)]
    table: bool,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Original SQL text, or @path
    original: String,

    /// Rewritten SQL text, or @path
    rewritten: String,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Rows fetched per side, clamped to 1..=1000
    #[arg(long)]
    row_limit: Option<usize>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

/// Inline SQL, or the contents of the file named after a leading `@`
fn read_sql(arg: &str) -> Result<String> {
    let sql = match arg.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read SQL from {}", path))?
        }
        None => arg.to_string(),
    };
    let sql = sql.trim();
    if sql.is_empty() {
        bail!("SQL is empty");
    }
    Ok(sql.to_string())
}

fn load_sql(arg: &str, settings: &Settings) -> Result<String> {
    let sql = read_sql(arg)?;
    settings.check_query_length(&sql)?;
    Ok(sql)
}

async fn introspect(
    sql: &str,
    connection: &ConnectionArgs,
    offline: bool,
    settings: &Settings,
) -> Result<IntrospectionContext> {
    let config = if offline { None } else { connection.config() };
    let Some(config) = config else {
        tracing::debug!("no database configured, introspecting offline");
        return Ok(Introspector::offline(connection.dialect).introspect(sql).await);
    };

    let owned_sql = sql.to_string();
    let timeout_ms = settings.explain_timeout_ms;
    with_connector(&config, move |connector| {
        Box::pin(async move { Ok(Introspector::new(connector, timeout_ms).introspect(&owned_sql).await) })
    })
    .await
    .with_context(|| {
        format!(
            "failed to connect to {} at {}:{}",
            config.dialect.display_name(),
            config.host,
            config.port
        )
    })
}

fn run_tables(sql: &str, dialect: Option<Dialect>, settings: &Settings) -> Result<()> {
    let sql = load_sql(sql, settings)?;
    for table in extract_table_names(&sql, dialect) {
        println!("{}", table);
    }
    Ok(())
}

async fn run_prompt(args: PromptArgs, settings: &Settings) -> Result<()> {
    let sql = load_sql(&args.sql, settings)?;
    let context = introspect(&sql, &args.connection, args.offline, settings).await?;
    let prompt = PromptBuilder::new().build(&context);
    println!("=== SYSTEM ===\n{}\n\n=== USER ===\n{}", prompt.system, prompt.user);
    Ok(())
}

async fn run_analyze(args: AnalyzeArgs, mut settings: Settings) -> Result<()> {
    let sql = load_sql(&args.sql, &settings)?;

    if let Some(model) = &args.model {
        let tag = args.provider.clone().unwrap_or_else(|| settings.llm_provider.clone());
        settings.providers.entry(tag).or_default().model = Some(model.clone());
    }
    let provider_override = match &args.provider {
        Some(tag) => Some(
            optimizeql_llm::create_provider_by_name(tag, &settings)
                .with_context(|| format!("cannot use provider {}", tag))?,
        ),
        None => None,
    };

    let context = introspect(&sql, &args.connection, args.offline, &settings).await?;
    let query_id = args.query_id.unwrap_or_else(Analyzer::new_query_id);
    let analyzer = Analyzer::from_settings(&settings);
    let result = analyzer
        .analyze(&context, &query_id, provider_override.as_deref())
        .await;

    if args.table {
        println!("{}\n", result.summary);
        println!("{}", output::analysis_table(&result));
        if let Some(error) = &result.explain_error {
            println!("\nEXPLAIN failed: {}", error);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

async fn run_compare(args: CompareArgs, settings: &Settings) -> Result<()> {
    let original = load_sql(&args.original, settings)?;
    let rewritten = load_sql(&args.rewritten, settings)?;
    let config = args.connection.require_config("compare")?;
    let row_limit = args.row_limit.unwrap_or(settings.compare_row_limit);
    let timeout_ms = args.timeout_ms.unwrap_or(settings.compare_timeout_ms);

    let result = with_connector(&config, move |connector| {
        Box::pin(async move { Ok(compare(connector, &original, &rewritten, row_limit, timeout_ms).await) })
    })
    .await
    .with_context(|| format!("failed to connect to {} at {}", config.dialect.display_name(), config.host))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", output::compare_table(&result));
        println!("{}", output::compare_verdict(&result));
    }
    Ok(())
}

async fn run_test_connection(connection: &ConnectionArgs) -> Result<()> {
    let config = connection.require_config("test-connection")?;
    if optimizeql_drivers::test_connection(&config).await {
        println!(
            "OK: connected to {} at {}:{}",
            config.dialect.display_name(),
            config.host,
            config.port
        );
        Ok(())
    } else {
        bail!(
            "could not connect to {} at {}:{}",
            config.dialect.display_name(),
            config.host,
            config.port
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging_config = if cli.verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::production()
    };
    let _log_guard = logging::init(logging_config)?;

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Command::Tables { sql, dialect } => run_tables(&sql, dialect, &settings),
        Command::Prompt(args) => run_prompt(args, &settings).await,
        Command::Analyze(args) => run_analyze(args, settings).await,
        Command::Compare(args) => run_compare(args, &settings).await,
        Command::TestConnection { connection } => run_test_connection(&connection).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_read_sql_inline_and_file() {
        assert_eq!(read_sql("  SELECT 1;\n").unwrap(), "SELECT 1;");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.sql");
        std::fs::write(&path, "\nSELECT * FROM users\n").unwrap();
        assert_eq!(read_sql(&format!("@{}", path.display())).unwrap(), "SELECT * FROM users");

        assert!(read_sql("@/definitely/not/here.sql").is_err());
        assert!(read_sql("   ").is_err());
    }

    #[test]
    fn test_load_sql_enforces_length() {
        let settings = Settings {
            max_query_length: 8,
            ..Default::default()
        };
        assert!(load_sql("SELECT 1", &settings).is_ok());
        assert!(load_sql("SELECT 10", &settings).is_err());
    }

    #[test]
    fn test_connection_args() {
        let cli = Cli::try_parse_from([
            "optimizeql",
            "compare",
            "SELECT 1",
            "SELECT 2",
            "--dialect",
            "postgres",
            "--host",
            "db.internal",
            "--user",
            "app",
            "--database",
            "shop",
            "--row-limit",
            "20",
        ])
        .unwrap();

        let Command::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.row_limit, Some(20));
        let config = args.connection.config().unwrap();
        assert_eq!(config.dialect, Dialect::Postgresql);
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5432);
        assert_eq!(config.username.as_deref(), Some("app"));
        assert_eq!(config.database.as_deref(), Some("shop"));
    }

    #[test]
    fn test_no_dialect_means_offline() {
        let cli = Cli::try_parse_from(["optimizeql", "prompt", "SELECT 1", "--port", "3307"]).unwrap();
        let Command::Prompt(args) = cli.command else {
            panic!("expected prompt");
        };
        assert!(args.connection.config().is_none());
        assert!(args.connection.require_config("compare").is_err());
    }

    #[test]
    fn test_tables_accepts_dialect() {
        let cli = Cli::try_parse_from(["optimizeql", "tables", "SELECT 1", "--dialect", "MySQL"]).unwrap();
        let Command::Tables { dialect, .. } = cli.command else {
            panic!("expected tables");
        };
        assert_eq!(dialect, Some(Dialect::Mysql));
    }
}
