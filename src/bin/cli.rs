//! Binary entry point for the graphkb query CLI.
#![forbid(unsafe_code)]

#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use graphkb_query::{
    config::{default_config_path, QueryConfig},
    error::StoreError,
    logging::init_logging,
    query::{
        params::ParamMap,
        schema::{InMemorySchema, SchemaProvider},
        CompiledStatement, QuerySpec, WrapperQuery,
    },
    repo::{select_query, Record, StatementExecutor},
};
use serde::Serialize;
use tracing::debug;

use crate::ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "graphkb-query",
    version,
    about = "Compile and dry-run graphkb record queries",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "GKB_QUERY_CONFIG",
        help = "Query config file (defaults to <config dir>/graphkb/query.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ThemeArg::Auto,
        help = "Color theme for text output"
    )]
    theme: ThemeArg,

    #[arg(long, global = true, help = "Suppress decorations in text output")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Compile a JSON query into a parameterized statement")]
    Compile {
        #[arg(long, value_name = "FILE", help = "JSON schema document")]
        schema: PathBuf,
        #[arg(
            value_name = "QUERY",
            default_value = "-",
            help = "JSON query file, or - for stdin"
        )]
        query: PathBuf,
    },
    #[command(about = "List the classes of a schema document")]
    Classes {
        #[arg(long, value_name = "FILE", help = "JSON schema document")]
        schema: PathBuf,
        #[arg(long, help = "Only concrete classes without subclasses")]
        terminal: bool,
    },
    #[command(about = "Run a query against canned records and print the trimmed result")]
    Select {
        #[arg(long, value_name = "FILE", help = "JSON schema document")]
        schema: PathBuf,
        #[arg(
            long,
            value_name = "FILE",
            help = "JSON array of records returned for the statement"
        )]
        records: PathBuf,
        #[arg(long, value_name = "N", help = "Require exactly N records after trimming")]
        exactly: Option<usize>,
        #[arg(
            value_name = "QUERY",
            default_value = "-",
            help = "JSON query file, or - for stdin"
        )]
        query: PathBuf,
    },
    #[command(about = "Show the effective query limits")]
    Config,
    #[command(about = "Print a shell completion script")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

#[derive(Serialize)]
struct StatementReport<'a> {
    query: &'a str,
    params: &'a ParamMap,
    display: String,
}

impl<'a> From<&'a CompiledStatement> for StatementReport<'a> {
    fn from(statement: &'a CompiledStatement) -> Self {
        Self {
            query: &statement.query,
            params: &statement.params,
            display: statement.display(),
        }
    }
}

/// Executor answering every statement with a fixed record list.
struct CannedExecutor {
    records: Vec<Record>,
}

#[async_trait]
impl StatementExecutor for CannedExecutor {
    async fn execute(&self, statement: &str, params: &ParamMap) -> Result<Vec<Record>, StoreError> {
        debug!(statement, params = params.len(), "cli.canned.execute");
        Ok(self.records.clone())
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = QueryConfig::load(cli.config.clone())?;
    init_logging(&config.log_level);
    let ui = Ui::new(cli.theme.into(), cli.quiet);

    match cli.command {
        Command::Compile { schema, query } => {
            let schema = load_schema(&schema)?;
            let spec = load_query(&query)?;
            let statement = WrapperQuery::parse(&schema, &config, &spec)?.to_statement();
            let report = StatementReport::from(&statement);
            emit(&cli.format, &report, |_| print_statement(&ui, &statement))?;
        }
        Command::Classes { schema, terminal } => {
            let schema = load_schema(&schema)?;
            let names = if terminal {
                schema.terminal_classes()
            } else {
                schema.class_names()
            };
            emit(&cli.format, &names, |_| ui.list("Classes", names.iter().cloned()))?;
        }
        Command::Select {
            schema,
            records,
            exactly,
            query,
        } => {
            let schema = load_schema(&schema)?;
            let spec = load_query(&query)?;
            let executor = CannedExecutor {
                records: serde_json::from_str(&read_input(&records)?)?,
            };
            let parsed = WrapperQuery::parse(&schema, &config, &spec)?;
            let rows = select_query(&executor, &parsed, exactly, None).await?;
            emit(&cli.format, &rows, |_| print_records(&ui, &rows))?;
        }
        Command::Config => {
            emit(&cli.format, &config, |_| print_config(&ui, &config, cli.config.as_deref()))?;
        }
        Command::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
        }
    }

    Ok(())
}

fn load_schema(path: &Path) -> Result<InMemorySchema, Box<dyn Error>> {
    Ok(InMemorySchema::from_json(&read_input(path)?)?)
}

fn load_query(path: &Path) -> Result<QuerySpec, Box<dyn Error>> {
    Ok(QuerySpec::from_json(&read_input(path)?)?)
}

fn read_input(path: &Path) -> Result<String, Box<dyn Error>> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()).into())
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_statement(ui: &Ui, statement: &CompiledStatement) {
    ui.statement(&statement.query);
    ui.section(
        "Parameters",
        statement
            .params
            .iter()
            .map(|(name, value)| (name.as_str(), render_json(value))),
    );
    ui.spacer();
    ui.info(&statement.display());
}

fn print_records(ui: &Ui, records: &[Record]) {
    if records.is_empty() {
        ui.warn("no records selected");
        return;
    }
    ui.list(
        &format!("Records ({})", records.len()),
        records.iter().map(|record| {
            let rid = record
                .rid
                .map(|rid| rid.to_string())
                .unwrap_or_else(|| "-".to_owned());
            let class = record.class.as_deref().unwrap_or("-");
            match record.name() {
                Some(name) => format!("{rid} {class} {name}"),
                None => format!("{rid} {class}"),
            }
        }),
    );
    ui.success(&format!("selected {} record(s)", records.len()));
}

fn print_config(ui: &Ui, config: &QueryConfig, explicit: Option<&Path>) {
    let source = explicit
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<none>".to_owned());
    ui.section(
        "Query limits",
        [
            ("max_limit", config.max_limit.to_string()),
            ("max_neighbors", config.max_neighbors.to_string()),
            ("max_depth", config.max_depth.to_string()),
            ("related_node_depth", config.related_node_depth.to_string()),
            ("min_word_size", config.min_word_size.to_string()),
            ("log_level", config.log_level.clone()),
            ("file", source),
        ],
    );
}

fn render_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_owned())
}
