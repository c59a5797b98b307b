use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use larder_core::{time::local_now, PredictionConfig};

mod catalog_cmd;
mod config;
mod ledger_cmd;
mod output;
mod pantry_cmd;
mod predict_cmd;
mod state;

use catalog_cmd::{CategoryCommand, HolidaysCommand, SeasonalCommand};
use ledger_cmd::{CartCommand, MigrateCommand, OrderCommand, StatsCommand};
use pantry_cmd::PantryCommand;
use predict_cmd::PredictCommand;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("LARDER_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "larder", version = VERSION, about = "Grocery repurchase predictions from your order history")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the data directory, database and preferences file
    Init,

    /// Record items added to the cart
    Cart {
        #[command(subcommand)]
        command: CartCommand,
    },

    /// Record placed orders
    Order {
        #[command(subcommand)]
        command: OrderCommand,
    },

    /// Purchase statistics per product
    Stats {
        #[command(subcommand)]
        command: StatsCommand,
    },

    /// Repurchase predictions and shopping lists
    Predict {
        #[command(subcommand)]
        command: PredictCommand,
    },

    /// Trend analysis of one product's purchase history
    Insight { product_id: String },

    /// Product categories (routine, regular, treat)
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },

    /// Holiday dates and holiday shopping
    Holidays {
        #[command(subcommand)]
        command: HolidaysCommand,
    },

    /// Monthly purchase patterns
    Seasonal {
        #[command(subcommand)]
        command: SeasonalCommand,
    },

    /// Pantry inventory levels
    Pantry {
        #[command(subcommand)]
        command: PantryCommand,
    },

    /// Prediction parameters and profile settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Import legacy order history and cart documents
    Migrate {
        #[command(subcommand)]
        command: MigrateCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show every setting
    Show,
    /// Change one setting (a prediction parameter or `timezone`)
    Set { key: String, value: String },
    /// Restore the default prediction parameters
    Reset,
}

/// What every data command needs.
pub struct Ctx {
    pub conn: Connection,
    pub config: PredictionConfig,
    /// Local wall-clock time in the configured timezone.
    pub now: NaiveDateTime,
    pub json: bool,
}

impl Ctx {
    fn open(json: bool) -> Result<Self> {
        let prefs = state::preferences_path()?;
        let config = config::load_prediction_config(&prefs)?;
        let tz = config::load_timezone(&prefs)?;
        let now = local_now(&tz)?;
        debug!(%now, %tz, prefs = %prefs.display(), "context opened");
        let conn = state::open_db()?;
        if let Some(summary) = ledger_cmd::backfill_if_needed(
            &conn,
            &state::legacy_order_history_path()?,
            &state::legacy_cart_path()?,
            now,
            &config,
        )? {
            for w in &summary.warnings {
                warn!("import: {w}");
            }
        }
        Ok(Self {
            conn,
            config,
            now,
            json,
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let json = cli.json;

    match cli.command {
        Command::Init => init(json),
        Command::Config { command } => run_config(command, json),
        Command::Cart { command } => ledger_cmd::run_cart(&Ctx::open(json)?, command),
        Command::Order { command } => ledger_cmd::run_order(&Ctx::open(json)?, command),
        Command::Stats { command } => ledger_cmd::run_stats(&Ctx::open(json)?, command),
        Command::Migrate { command } => ledger_cmd::run_migrate(&Ctx::open(json)?, command),
        Command::Predict { command } => predict_cmd::run(&Ctx::open(json)?, command),
        Command::Insight { product_id } => predict_cmd::run_insight(&Ctx::open(json)?, &product_id),
        Command::Category { command } => catalog_cmd::run_category(&Ctx::open(json)?, command),
        Command::Holidays { command } => catalog_cmd::run_holidays(&Ctx::open(json)?, command),
        Command::Seasonal { command } => catalog_cmd::run_seasonal(&Ctx::open(json)?, command),
        Command::Pantry { command } => pantry_cmd::run(&Ctx::open(json)?, command),
    }
}

fn init(json: bool) -> Result<()> {
    let home = state::ensure_larder_home()?;
    let prefs = state::preferences_path()?;
    if !prefs.exists() {
        config::save_prediction_config(&prefs, &PredictionConfig::default())?;
        config::save_timezone(&prefs, &config::load_timezone(&prefs)?)?;
    }
    let db = state::db_path()?;
    state::open_db().with_context(|| format!("initialize {}", db.display()))?;

    if json {
        return output::print_json(&serde_json::json!({
            "home": home,
            "database": db,
            "preferences": prefs,
            "version": VERSION,
        }));
    }
    println!("larder {VERSION}");
    println!("Data directory: {}", home.display());
    println!("Database:       {}", db.display());
    println!("Preferences:    {}", prefs.display());
    Ok(())
}

fn run_config(command: ConfigCommand, json: bool) -> Result<()> {
    let prefs = state::preferences_path()?;
    match command {
        ConfigCommand::Show => {
            let rows = config::describe(&prefs)?;
            if json {
                let map: serde_json::Map<String, serde_json::Value> = rows
                    .into_iter()
                    .map(|(k, v)| {
                        let value = serde_json::from_str(&v).unwrap_or(serde_json::Value::String(v));
                        (k, value)
                    })
                    .collect();
                return output::print_json(&map);
            }
            for (key, value) in rows {
                println!("{key:<30} {value}");
            }
        }
        ConfigCommand::Set { key, value } => {
            config::set_value(&prefs, &key, &value)
                .with_context(|| format!("set {key}"))?;
            println!("{key} = {value}");
        }
        ConfigCommand::Reset => {
            config::reset_prediction_config(&prefs)?;
            println!("Prediction parameters reset to defaults");
        }
    }
    Ok(())
}
