//! Juice POS command line.
//!
//! # Usage
//!
//! ```bash
//! # Interactive till
//! juice-pos till
//!
//! # Menu management
//! juice-pos menu add --name "Kokum Sharbat" --price 50 --category JUICES
//! juice-pos category remove COMBOS
//!
//! # Reports
//! juice-pos report --today --json
//! juice-pos export-csv --out ~/Downloads/sales.csv
//!
//! # Printer
//! juice-pos printer config --type bluetooth --paper 58mm
//! juice-pos reprint 1004
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use juice_pos_lib::commands::menu::ProductEdit;
use juice_pos_lib::commands::{menu, printer, reports, till};
use juice_pos_lib::models::{PaperSize, PrinterKind};
use juice_pos_lib::{logging, Config, Session};

#[derive(Parser)]
#[command(name = "juice-pos")]
#[command(author, version, about = "Juice shop counter till")]
struct Cli {
    /// Data directory (overrides JUICE_POS_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Echo debug logs to the console
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive till session on stdin
    Till,
    /// Manage products
    Menu {
        #[command(subcommand)]
        action: MenuAction,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Sales report
    Report {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Only today's sales
        #[arg(long, conflicts_with = "date")]
        today: bool,

        /// Only sales on this local date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Recent bills, newest first
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Export the ledger as CSV
    ExportCsv {
        /// Output path (default: ./Sales_Report_<date>.csv)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show the receipt for a bill
    Receipt { bill: u64 },
    /// Print the receipt for a bill again
    Reprint { bill: u64 },
    /// Delete every recorded sale
    ResetLedger {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Printer settings and pairing
    Printer {
        #[command(subcommand)]
        action: PrinterAction,
    },
}

#[derive(Subcommand)]
enum MenuAction {
    /// List products
    List {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Add a product
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        price: f64,
        #[arg(short, long)]
        category: String,
        /// Tile style token
        #[arg(long)]
        color: Option<String>,
    },
    /// Change fields of a product
    Edit {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        price: Option<f64>,
        #[arg(short, long)]
        category: Option<String>,
        /// Tile style token
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a product
    Delete { id: String },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// List categories with product counts
    List,
    /// Add a category
    Add { label: String },
    /// Remove a category; its products move to UNCATEGORIZED
    Remove { label: String },
}

#[derive(Subcommand)]
enum PrinterAction {
    /// List Bluetooth serial ports
    Ports,
    /// Pair with the printer and send a test line
    Connect,
    /// Show or change printer settings
    Config {
        /// BLUETOOTH or SYSTEM
        #[arg(long = "type")]
        kind: Option<PrinterKind>,
        /// 58mm or 80mm
        #[arg(long)]
        paper: Option<PaperSize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }

    let _guard = logging::init_logging(&config.log_dir(), cli.verbose, config.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "juice-pos starting");

    if let Err(e) = run(cli, config).await {
        error!("Command failed: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn today(config: &Config) -> NaiveDate {
    Utc::now().with_timezone(&config.utc_offset()).date_naive()
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let today = today(&config);
    let mut session = Session::open(config).context("opening till database")?;

    let output = match cli.command {
        Commands::Till => {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            till::run(&mut session, stdin.lock(), &mut stdout).await?;
            return Ok(());
        }
        Commands::Menu { action } => match action {
            MenuAction::List { category } => menu::list(&session.state, category.as_deref()),
            MenuAction::Add {
                name,
                price,
                category,
                color,
            } => menu::add(&mut session.state, &name, price, &category, color)?,
            MenuAction::Edit {
                id,
                name,
                price,
                category,
                color,
            } => menu::edit(&mut session.state, &id, ProductEdit { name, price, category, color })?,
            MenuAction::Delete { id } => menu::delete(&mut session.state, &id)?,
        },
        Commands::Category { action } => match action {
            CategoryAction::List => menu::categories(&session.state),
            CategoryAction::Add { label } => menu::add_category(&mut session.state, &label)?,
            CategoryAction::Remove { label } => menu::remove_category(&mut session.state, &label)?,
        },
        Commands::Report { json, today: only_today, date } => {
            let day = if only_today { Some(today) } else { date };
            reports::report(&session.state, day, json)?
        }
        Commands::History { limit } => reports::history(&session.state, limit),
        Commands::ExportCsv { out } => {
            let path = reports::export_csv(&session.state, out, today).context("writing CSV")?;
            format!(
                "Exported {} bills to {}",
                session.state.ledger().len(),
                path.display()
            )
        }
        Commands::Receipt { bill } => reports::receipt(&session.state, bill)?,
        Commands::Reprint { bill } => printer::reprint(&session, bill).await?,
        Commands::ResetLedger { yes } => reports::reset_ledger(&mut session.state, yes)?,
        Commands::Printer { action } => match action {
            PrinterAction::Ports => printer::ports()?,
            PrinterAction::Connect => {
                let connected = printer::connect(&session).await?;
                let chunks = printer::test_page(&session).await?;
                printer::disconnect(&session)?;
                format!("{connected}; test page sent in {chunks} chunks")
            }
            PrinterAction::Config { kind, paper } => printer::config(&mut session.state, kind, paper)?,
        },
    };

    println!("{}", output.trim_end());
    Ok(())
}
