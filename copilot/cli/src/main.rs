//! Copilot - Terminal Surface for the Finance Copilot
//!
//! Streams the AI financial insight into the terminal with a typewriter
//! effect, and wraps the backend's expense, income and summary endpoints.
//!
//! # Usage
//!
//! ```bash
//! # Stream the insight for the configured user
//! COPILOT_TOKEN=... copilot insight
//!
//! # Faster reveal, or wait for the whole insight first
//! copilot insight --delay-ms 5
//! copilot insight --buffered
//!
//! # Record and review transactions
//! copilot add-expense --amount 250 --category Food
//! copilot add-income --amount 50000 --source Salary --date 2024-03-01
//! copilot summary
//!
//! # Verbose logging
//! RUST_LOG=debug copilot insight
//! ```
//!
//! Ctrl-C while an insight is streaming cancels it and keeps what was shown.

mod render;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use copilot_core::{
    load_config_from_path, ConfigOverrides, CopilotConfig, Credential, FinanceApi,
    InsightRequest, InsightSession, NewExpense, NewIncome, PlaybackMode, SessionStatus,
};
use render::{format_expenses, format_rupees, format_summary, TypewriterRenderer};

/// Copilot - AI financial insights in your terminal
#[derive(Parser, Debug)]
#[command(name = "copilot")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "COPILOT_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, value_name = "URL", global = true)]
    api_url: Option<String>,

    /// User id
    #[arg(short = 'u', long, value_name = "ID", global = true)]
    user: Option<u64>,

    /// Bearer token from the login flow
    #[arg(long, env = "COPILOT_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream the AI insight for the user
    Insight {
        /// Milliseconds between revealed characters (0 = instant)
        #[arg(long, value_name = "MS")]
        delay_ms: Option<u64>,

        /// Wait for the whole insight before revealing it
        #[arg(long)]
        buffered: bool,
    },
    /// Show income, expenses, savings and score
    Summary,
    /// List recorded expenses
    Expenses,
    /// Record an expense
    AddExpense {
        /// Amount in rupees
        #[arg(long)]
        amount: f64,
        /// Category label
        #[arg(long)]
        category: String,
        /// Day spent (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record income
    AddIncome {
        /// Amount in rupees
        #[arg(long)]
        amount: f64,
        /// Where it came from
        #[arg(long)]
        source: String,
        /// Day received (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Check the backend is reachable
    Health,
}

/// Initialize logging on stderr so stdout carries only output
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("copilot={level},copilot_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<CopilotConfig> {
    let path = args
        .config
        .clone()
        .or_else(copilot_core::default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.api_url {
        overrides = overrides.with_base_url(url.clone());
    }
    if let Some(user) = args.user {
        overrides = overrides.with_user_id(user);
    }
    if let Command::Insight { delay_ms, buffered } = args.command {
        if let Some(ms) = delay_ms {
            overrides = overrides.with_char_delay_ms(ms);
        }
        if buffered {
            overrides = overrides.with_mode(PlaybackMode::Buffered);
        }
    }
    overrides
        .apply(&mut config)
        .context("Invalid command-line option")?;

    debug!(
        base_url = %config.api.base_url,
        user_id = config.api.user_id,
        source = %config.source(),
        "configuration resolved"
    );
    Ok(config)
}

fn credential(args: &Args) -> Option<Credential> {
    args.token
        .as_deref()
        .map(Credential::new)
        .filter(|c| !c.is_blank())
}

fn finance_api(args: &Args, config: &CopilotConfig) -> Result<FinanceApi> {
    let api = FinanceApi::from_config(&config.api).context("Failed to create HTTP client")?;
    Ok(match credential(args) {
        Some(credential) => api.with_credential(credential),
        None => api,
    })
}

/// Stream one insight to stdout until it settles or Ctrl-C
async fn run_insight(args: &Args, config: &CopilotConfig) -> Result<ExitCode> {
    let mut session = InsightSession::http(config).context("Failed to create HTTP client")?;

    let mut request = InsightRequest::new(config.api.user_id);
    if let Some(credential) = credential(args) {
        request = request.with_credential(credential);
    }

    session.start(request).await;
    let mut snapshots = session.snapshots();
    let mut renderer = TypewriterRenderer::new(io::stdout());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            next = snapshots.next() => {
                let Some(snapshot) = next else { break };
                renderer.render(&snapshot)?;
                if snapshot.is_settled() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted, cancelling insight");
                session.cancel().await;
                renderer.render(&session.snapshot())?;
                break;
            }
        }
    }

    let last = session.wait().await;
    if !renderer.is_closed() {
        renderer.render(&last)?;
    }

    Ok(match last.status {
        SessionStatus::Done => ExitCode::SUCCESS,
        _ if last.cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(&args)?;
    let today = Local::now().date_naive();

    match &args.command {
        Command::Insight { .. } => return run_insight(&args, &config).await,
        Command::Summary => {
            let summary = finance_api(&args, &config)?
                .summary(config.api.user_id)
                .await
                .context("Failed to fetch summary")?;
            print!("{}", format_summary(&summary));
        }
        Command::Expenses => {
            let expenses = finance_api(&args, &config)?
                .list_expenses(config.api.user_id)
                .await
                .context("Failed to list expenses")?;
            print!("{}", format_expenses(&expenses));
        }
        Command::AddExpense {
            amount,
            category,
            date,
        } => {
            let expense = NewExpense {
                amount: *amount,
                category: category.clone(),
                date: date.unwrap_or(today),
                user_id: config.api.user_id,
            };
            finance_api(&args, &config)?
                .create_expense(&expense)
                .await
                .context("Failed to record expense")?;
            println!(
                "Recorded {} for {} on {}",
                format_rupees(expense.amount),
                expense.category,
                expense.date
            );
        }
        Command::AddIncome {
            amount,
            source,
            date,
        } => {
            let income = NewIncome {
                amount: *amount,
                source: source.clone(),
                date: date.unwrap_or(today),
                user_id: config.api.user_id,
            };
            finance_api(&args, &config)?
                .create_income(&income)
                .await
                .context("Failed to record income")?;
            println!(
                "Recorded {} from {} on {}",
                format_rupees(income.amount),
                income.source,
                income.date
            );
        }
        Command::Health => {
            let status = finance_api(&args, &config)?
                .health_check()
                .await
                .with_context(|| format!("Backend at {} is not reachable", config.api.base_url))?;
            println!("{}", status.message);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            warn!(error = %err, "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
