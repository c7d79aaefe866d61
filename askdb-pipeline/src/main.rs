//! askdb command-line driver
//!
//! ```bash
//! # One question against a catalog file
//! askdb --catalog tables.csv --question "How many contacts are there?"
//!
//! # Interactive session, catalog read from the live database
//! askdb --introspect --schema public
//! ```
//!
//! Database, model and pipeline settings come from `ASKDB_*` environment
//! variables.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use askdb_context::SessionStore;
use askdb_core::{
    format_row, AskResult, ConfigError, PipelineConfig, PipelineFailure, PipelineResponse,
    ProviderConfig, SchemaCatalog, SessionId,
};
use askdb_llm::build_generator;
use askdb_pipeline::{
    init_tracing, introspect_catalog, ConnectionProvider, DbConfig, DirectConnector, LogFormat,
    Pipeline, PooledConnector, PostgresExecutor, PromptSet,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const PREVIEW_ROWS: usize = 10;

/// Ask questions of a PostgreSQL database in plain English
#[derive(Parser, Debug)]
#[command(name = "askdb", version, about = "Ask questions of a PostgreSQL database in plain English")]
struct Args {
    /// Schema catalog file (.csv with table_name,description rows, or .toml)
    #[arg(short = 'c', long, value_name = "FILE", conflicts_with = "introspect")]
    catalog: Option<PathBuf>,

    /// Build the schema catalog from information_schema
    #[arg(long)]
    introspect: bool,

    /// Schema to introspect
    #[arg(long, default_value = "public")]
    schema: String,

    /// Prompt overrides (TOML)
    #[arg(short = 'p', long, value_name = "FILE")]
    prompts: Option<PathBuf>,

    /// Answer a single question and exit
    #[arg(short = 'q', long)]
    question: Option<String>,

    /// Borrow connections from a pool instead of opening one per query
    #[arg(long)]
    pooled: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> AskResult<ExitCode> {
    let args = Args::parse();
    init_tracing(LogFormat::from_env());

    let config = PipelineConfig::from_env();
    let db = DbConfig::from_env();
    let provider: Arc<dyn ConnectionProvider> = if args.pooled {
        Arc::new(PooledConnector::from_config(&db)?)
    } else {
        Arc::new(DirectConnector::new(&db))
    };

    let catalog = match (&args.catalog, args.introspect) {
        (Some(path), _) => SchemaCatalog::from_path(path)?,
        (None, true) => introspect_catalog(provider.as_ref(), &args.schema).await?,
        (None, false) => {
            return Err(ConfigError::MissingRequired {
                field: "--catalog or --introspect".to_string(),
            }
            .into())
        }
    };
    info!(tables = catalog.len(), "schema catalog loaded");

    let prompts = match &args.prompts {
        Some(path) => PromptSet::from_path(path)?,
        None => PromptSet::default(),
    };

    let provider_config = ProviderConfig::from_env()?;
    let llm = build_generator(&provider_config, config.llm_retry.clone(), config.llm_timeout)?;
    let executor = Arc::new(PostgresExecutor::new(provider).with_connect_timeout(db.connect_timeout));
    let pipeline = Pipeline::new(llm, executor, Arc::new(catalog), prompts, config.clone())?;

    let mut sessions = SessionStore::new(config.history_limit);
    let session_id = sessions.open();

    if let Some(question) = &args.question {
        let outcome = pipeline
            .answer_in_session(&mut sessions, session_id, question)
            .await;
        let ok = outcome.is_ok();
        print_outcome(&outcome, args.json);
        return Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    run_repl(&pipeline, &mut sessions, session_id, args.json).await;
    Ok(ExitCode::SUCCESS)
}

async fn run_repl(pipeline: &Pipeline, sessions: &mut SessionStore, session_id: SessionId, json: bool) {
    println!("askdb: ask a question, or :status, :clear, :quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("askdb> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("failed to read input: {}", e);
                break;
            }
        };

        match line.trim() {
            "" => continue,
            ":quit" | ":exit" => break,
            ":clear" => {
                sessions.clear(session_id);
                println!("Conversation cleared.");
            }
            ":status" => {
                let status = sessions.status(session_id);
                match serde_json::to_string_pretty(&status) {
                    Ok(text) => println!("{}", text),
                    Err(e) => eprintln!("failed to render status: {}", e),
                }
            }
            question => {
                let outcome = pipeline
                    .answer_in_session(sessions, session_id, question)
                    .await;
                print_outcome(&outcome, json);
            }
        }
    }
}

fn print_outcome(outcome: &Result<PipelineResponse, PipelineFailure>, json: bool) {
    if json {
        let rendered = match outcome {
            Ok(response) => serde_json::to_string_pretty(response),
            Err(failure) => serde_json::to_string_pretty(failure),
        };
        match rendered {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("failed to render result: {}", e),
        }
        return;
    }

    match outcome {
        Ok(response) => print_response(response),
        Err(failure) => {
            println!("Error: {}", failure.error);
            if !failure.sql_attempted.is_empty() {
                println!("SQL attempted: {}", failure.sql_attempted);
            }
            if let Some(technical) = &failure.technical {
                println!("Details: {}", technical);
            }
        }
    }
}

fn print_response(response: &PipelineResponse) {
    println!("{}\n", response.answer);
    println!("SQL: {}", response.sql);
    println!(
        "Rows: {} of {} ({:.3}s)",
        response.rows_shown, response.total_rows, response.execution_time
    );

    if !response.columns.is_empty() {
        println!("{}", response.columns.join(" | "));
    }
    for row in response.rows.iter().take(PREVIEW_ROWS) {
        println!("{}", format_row(row));
    }
    if response.rows.len() > PREVIEW_ROWS || response.has_more {
        println!("...");
    }

    if !response.suggestions.is_empty() {
        println!("\nYou could also ask:");
        for suggestion in &response.suggestions {
            println!("  - {}", suggestion);
        }
    }
    if !response.column_suggestions.is_empty() {
        println!("\nColumns worth a look:");
        for column in &response.column_suggestions {
            println!("  - {}", column);
        }
    }
}
