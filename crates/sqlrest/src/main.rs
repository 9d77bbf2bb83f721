mod logging;

use clap::Parser;
use serde_json::Value;
use sqlrest_engine::config::{DEFAULT_PRIMARY_KEY, SERVICE_KEY_VAR, URL_VAR};
use sqlrest_engine::{Connection, Error, ErrorPolicy, RestConfig, parser, plan};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "sqlrest",
    version,
    about = "Run a SQL statement against a PostgREST endpoint",
    disable_help_subcommand = true
)]
struct Cli {
    /// Statement to run, with `?` placeholders
    sql: String,

    /// Positional parameter; parsed as JSON, otherwise taken as a string
    #[arg(short = 'p', long = "param", value_name = "VALUE")]
    params: Vec<String>,

    /// Project URL (defaults to $SUPABASE_URL)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// API key (defaults to $SUPABASE_SERVICE_ROLE_KEY, then $SUPABASE_ANON_KEY)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log failures and return empty results instead of failing
    #[arg(long)]
    fail_soft: bool,

    /// Print the REST call instead of sending it
    #[arg(long)]
    plan: bool,

    /// Log filter, e.g. `debug` (defaults to $RUST_LOG, then `warn`)
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn config(cli: &Cli) -> Result<RestConfig, Error> {
    let mut config = RestConfig::from_lookup(|name| {
        let flag = match name {
            URL_VAR => cli.base_url.clone(),
            SERVICE_KEY_VAR => cli.api_key.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(name).ok())
    })?;
    if let Some(secs) = cli.timeout {
        config = config.set_timeout(Duration::from_secs(secs));
    }
    if cli.fail_soft {
        config = config.set_policy(ErrorPolicy::FailSoft);
    }
    Ok(config)
}

fn print_plan(cli: &Cli, params: &[Value]) -> Result<(), Error> {
    let statement = parser::parse(&cli.sql, params).map_err(|source| Error::Parse {
        sql: cli.sql.clone(),
        source,
    })?;
    let base_url = cli
        .base_url
        .clone()
        .or_else(|| std::env::var(URL_VAR).ok())
        .unwrap_or_default();
    match plan(&statement, DEFAULT_PRIMARY_KEY) {
        Some(request) => {
            println!("{} {}", request.method, request.url(&base_url));
            if let Some(body) = &request.body {
                println!("{body}");
            }
        }
        None => println!("-- answered locally, no request"),
    }
    if let Some(filter) = statement.filter() {
        for conjunct in &filter.unrecognized {
            println!("-- not understood: {conjunct}");
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), Error> {
    let params: Vec<Value> = cli.params.iter().map(String::as_str).map(parse_param).collect();
    if cli.plan {
        return print_plan(cli, &params);
    }

    let mut db = Connection::open(&config(cli)?)?;
    let rows = db.execute(&cli.sql, &params)?;
    match serde_json::to_string_pretty(&rows) {
        Ok(json) => println!("{json}"),
        Err(e) => log::warn!("[db] cannot render rows: {e}"),
    }
    if let Some(id) = rows.last_insert_id() {
        eprintln!("last insert id: {id}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level.as_deref()) {
        eprintln!("--log-level: {e}");
        return ExitCode::from(2);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
