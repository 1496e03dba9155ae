//! wxmon daemon
//!
//! Polls the remote weather API on a fixed interval and stores converted
//! observations, or answers one-off questions about what is stored.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use wxmon_config::AppConfig;
use wxmon_db::DbClient;
use wxmon_fetch::FetchClient;
use wxmon_monitor::{MonitorScheduler, StatsQuery, DEFAULT_WINDOW_DAYS};

#[derive(Parser)]
#[command(name = "wxmond", about = "Weather station polling daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the remote API until Ctrl+C
    Run,
    /// Fetch and store once, then exit
    Fetch,
    /// Temperature and humidity aggregates for a station
    Stats {
        station_id: String,
        /// Trailing window in days
        #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
        days: u32,
    },
    /// List known stations
    Stations,
    /// Observations and aggregates for one local day
    Daily {
        station_id: String,
        /// Local date, YYYY-MM-DD (default today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Change a station's display name
    Rename { station_id: String, name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    wxmon_obs::init("wxmond");

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = DbClient::new(&config.database_url())
        .await
        .context("Failed to connect to database")?;
    db.ping().await.context("Database ping failed")?;

    let command = match cli.command {
        Some(command) => command,
        None if config.autostart() => Commands::Run,
        None => bail!("no command given and monitor.autostart is off; try `wxmond run`"),
    };

    match command {
        Commands::Run => run(db, &config).await?,
        Commands::Fetch => {
            let settings = config.monitor_settings()?;
            let client = FetchClient::from_settings(&settings)?;
            let scheduler = MonitorScheduler::new(db);
            let report = scheduler.fetch_now(&client).await?;
            println!(
                "saved {} duplicates {} rejected {}",
                report.saved(),
                report.duplicates,
                report.rejected
            );
        }
        Commands::Stats { station_id, days } => {
            let query = StatsQuery::new(db);
            let stats = query.stats(&station_id, days).await?;
            println!(
                "{} over {} days: avg {:.1} °C, max {:.1} °C, min {:.1} °C, humidity {:.1} %",
                station_id, days, stats.avg_temp, stats.max_temp, stats.min_temp, stats.avg_humidity
            );
            if let Some(latest) = query.latest(&station_id).await? {
                let utc = latest
                    .utc_time()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "latest {} ({}) temp {}",
                    latest.obs_time_local,
                    utc,
                    fmt_reading(latest.temp_avg, "°C")
                );
            }
        }
        Commands::Stations => {
            for overview in StatsQuery::new(db).stations().await? {
                println!(
                    "{}\t{}\t{:.4},{:.4}\t{}\t{} observations\tlast {}",
                    overview.station.station_id,
                    overview.station.name,
                    overview.station.latitude,
                    overview.station.longitude,
                    overview.station.timezone,
                    overview.observation_count,
                    overview.last_observation_local.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Daily { station_id, date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let summary = StatsQuery::new(db).daily(&station_id, date).await?;
            println!(
                "{} {}: {} observations, temp avg {} max {} min {}, humidity {}, precip {}, wind max {}",
                summary.station_id,
                summary.date,
                summary.observation_count,
                fmt_reading(summary.temperature_avg, "°C"),
                fmt_reading(summary.temperature_max, "°C"),
                fmt_reading(summary.temperature_min, "°C"),
                fmt_reading(summary.humidity_avg, "%"),
                fmt_reading(summary.precipitation_total, "mm"),
                fmt_reading(summary.wind_speed_max, "km/h"),
            );
            for obs in &summary.observations {
                println!(
                    "  {}\t{}\t{}{}",
                    obs.obs_time_local,
                    fmt_reading(obs.temp_avg, "°C"),
                    fmt_reading(obs.humidity_avg, "%"),
                    if obs.qc().is_error() { "\tqc error" } else { "" }
                );
            }
        }
        Commands::Rename { station_id, name } => {
            let station = db.rename_station(&station_id, &name).await?;
            println!("{}\t{}", station.station_id, station.name);
        }
    }

    Ok(())
}

async fn run(db: DbClient, config: &AppConfig) -> Result<()> {
    let settings = config
        .monitor_settings()
        .context("Monitor settings are incomplete")?;
    let scheduler = MonitorScheduler::new(db.clone());

    scheduler.start(settings).await?;
    info!("Daemon running - press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    scheduler.shutdown().await;
    db.close().await;
    info!("wxmond stopped");
    Ok(())
}

fn fmt_reading(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1} {}", v, unit),
        None => "-".to_string(),
    }
}
