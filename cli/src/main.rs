//! `unipolmove`: command-line front end for the client library.
//!
//! # Design
//! Credentials, contract id and base URL come from flags or `UNIPOL_*`
//! environment variables. Every subcommand logs in first, then fetches all
//! movements for the chosen interval and narrows them to a date range
//! locally. `report` defaults that range to the current month. Logs go to
//! stderr under `RUST_LOG`, so stdout carries only the table, JSON or output
//! path.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unipolmove_core::config::DEFAULT_BASE_URL;
use unipolmove_core::{ClientConfig, DateRange, Interval, Movement, UnipolMoveClient};

#[derive(Parser)]
#[command(name = "unipolmove")]
#[command(about = "Fetch Unipol Move toll movements and download PDF expense reports")]
struct Cli {
    /// Contract identifier, e.g. P000000000
    #[arg(long, env = "UNIPOL_CONTRACT_ID")]
    contract_id: String,
    /// Account e-mail
    #[arg(long, env = "UNIPOL_USERNAME")]
    username: String,
    #[arg(long, env = "UNIPOL_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, env = "UNIPOL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Service time window token
    #[arg(long, default_value = "ULTIMO_ANNO")]
    interval: Interval,
    /// Movements requested per page
    #[arg(long, default_value_t = 100)]
    batch_size: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// List movements, optionally restricted to a date range
    Movements {
        #[command(flatten)]
        selection: Selection,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Generate a PDF expense report (defaults to the current month)
    Report {
        #[command(flatten)]
        selection: Selection,
        /// Name printed on the report
        #[arg(long, env = "REPORT_RECIPIENT")]
        recipient: String,
        /// Output file (default: expense_report_YYYYMMDD.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "unipolmove=info,unipolmove_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::new(&cli.contract_id)
        .with_base_url(&cli.base_url)
        .with_timeout(Duration::from_secs(cli.timeout));
    let mut client = UnipolMoveClient::new(config);

    if !client
        .login(&cli.username, &cli.password)
        .context("login request failed")?
    {
        bail!("login rejected: check username and password");
    }

    match cli.command {
        Commands::Movements { selection, json } => {
            let movements = fetch_selection(&mut client, &selection, None)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&movements)?);
            } else {
                print_table(&movements);
            }
        }
        Commands::Report {
            selection,
            recipient,
            output,
        } => {
            let today = Local::now().date_naive();
            let month_start = today.with_day(1).unwrap_or(today);
            let movements =
                fetch_selection(&mut client, &selection, Some(DateRange::new(month_start, today)))?;
            if movements.is_empty() {
                bail!("no movements in the selected range, nothing to report");
            }
            let output = output.unwrap_or_else(|| {
                PathBuf::from(format!("expense_report_{}.pdf", today.format("%Y%m%d")))
            });
            let pdf = client
                .generate_pdf_report(&movements, &recipient, Some(&output))
                .context("report generation failed")?;
            info!(movements = movements.len(), "report ready");
            println!("{} ({} bytes)", output.display(), pdf.len());
        }
    }
    Ok(())
}

/// Fetch every movement in the interval and apply the date range, if any.
///
/// `default_range` is used when neither bound is given on the command line.
fn fetch_selection(
    client: &mut UnipolMoveClient,
    selection: &Selection,
    default_range: Option<DateRange>,
) -> anyhow::Result<Vec<Movement>> {
    let movements = client
        .fetch_all_movements(selection.batch_size, selection.interval.clone())
        .context("fetching movements failed")?;

    let range = match (selection.from, selection.to, default_range) {
        (None, None, None) => return Ok(movements),
        (None, None, Some(range)) => range,
        (from, to, _) => DateRange::new(
            from.unwrap_or(NaiveDate::MIN),
            to.unwrap_or(NaiveDate::MAX),
        ),
    };
    let filtered = client.filter_movements_by_date(&movements, range);
    info!(
        fetched = movements.len(),
        kept = filtered.len(),
        from = %range.start,
        to = %range.end,
        "filtered movements"
    );
    Ok(filtered)
}

fn print_table(movements: &[Movement]) {
    let mut total = 0.0;
    for movement in movements {
        let date = movement
            .entry_date()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let amount = movement.charged_amount();
        total += amount.unwrap_or(0.0);
        println!(
            "{date:<10}  {:<28} -> {:<28} {:>8}",
            movement.entry_point().unwrap_or("N/A"),
            movement.exit_point().unwrap_or("N/A"),
            amount.map_or_else(|| "N/A".to_string(), |a| format!("{a:.2}")),
        );
    }
    println!("{} movements, {total:.2} EUR", movements.len());
}
