use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use peptrack_core::*;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "peptrack")]
#[command(about = "Peptide protocol schedules and dose adherence", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $XDG_CONFIG_HOME/peptrack/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Act as a member of this clinic (omit for administrator access)
    #[arg(long, global = true)]
    clinic: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and an empty catalog
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Resolve the dose schedule of a protocol
    Schedule {
        /// Protocol ID
        #[arg(long)]
        protocol: String,

        /// First day of the window (YYYY-MM-DD, default today)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day of the window (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Also export the schedule to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Show adherence statistics for a patient
    Stats {
        /// Patient ID
        #[arg(long)]
        patient: String,

        /// First day of the period (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day of the period (YYYY-MM-DD, default today)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Log a dose for a patient
    LogDose {
        #[arg(long)]
        patient: String,

        #[arg(long)]
        substance: String,

        /// Dose amount, e.g. 250 or 0.25
        #[arg(long)]
        amount: Decimal,

        /// taken, missed or skipped (omit when unrecorded)
        #[arg(long)]
        status: Option<String>,

        /// When the dose was logged (RFC 3339, default now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Log a side effect reported by a patient
    LogSideEffect {
        #[arg(long)]
        patient: String,

        #[arg(long)]
        substance: Option<String>,

        #[arg(long)]
        description: String,

        #[arg(long)]
        severity: Option<String>,

        /// When the side effect was reported (RFC 3339, default now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    peptrack_core::logging::init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let mut config = Config::load_or_default(&config_path)?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }

    let access = match cli.clinic {
        Some(clinic) => ClinicScope::clinic(clinic),
        None => ClinicScope::admin(),
    };

    match cli.command {
        Commands::Init { force } => cmd_init(&config, &config_path, force),
        Commands::Schedule {
            protocol,
            start,
            end,
            csv,
        } => cmd_schedule(&config, &access, &protocol, WindowQuery::new(start, end), csv),
        Commands::Stats {
            patient,
            start,
            end,
        } => cmd_stats(&config, &access, &patient, WindowQuery::new(start, end)),
        Commands::LogDose {
            patient,
            substance,
            amount,
            status,
            at,
            notes,
        } => {
            let status = status.as_deref().map(str::parse::<DoseStatus>).transpose()?;
            let record = DoseRecord {
                id: uuid::Uuid::new_v4(),
                patient_id: patient,
                substance_id: substance,
                dose_amount: amount,
                status,
                logged_at: at.unwrap_or_else(Utc::now),
                notes,
            };
            cmd_log_dose(&config, &access, record)
        }
        Commands::LogSideEffect {
            patient,
            substance,
            description,
            severity,
            at,
        } => {
            let record = SideEffectRecord {
                id: uuid::Uuid::new_v4(),
                patient_id: patient,
                substance_id: substance,
                description,
                severity,
                logged_at: at.unwrap_or_else(Utc::now),
            };
            cmd_log_side_effect(&config, &access, record)
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn cmd_init(config: &Config, config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )));
    }
    config.save_to(config_path)?;
    println!("✓ Wrote config to {}", config_path.display());

    let catalog = FileCatalog::new(config.data.catalog_path());
    if catalog.path().exists() {
        println!("✓ Keeping existing catalog at {}", catalog.path().display());
    } else {
        catalog.save(&Catalog::default())?;
        println!("✓ Created empty catalog at {}", catalog.path().display());
    }
    Ok(())
}

fn cmd_schedule(
    config: &Config,
    access: &ClinicScope,
    protocol_id: &str,
    query: WindowQuery,
    csv: Option<PathBuf>,
) -> Result<()> {
    let catalog = FileCatalog::new(config.data.catalog_path());
    let response = protocol_schedule(
        &catalog,
        access,
        protocol_id,
        query,
        today(),
        &config.schedule,
    )?;

    if let Some(path) = csv {
        let count = write_schedule_csv(&response.schedule, &path)?;
        eprintln!("✓ Exported {} doses to {}", count, path.display());
    }

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_stats(
    config: &Config,
    access: &ClinicScope,
    patient_id: &str,
    query: WindowQuery,
) -> Result<()> {
    let catalog = FileCatalog::new(config.data.catalog_path());
    let log = DoseLog::new(config.data.log_dir());
    let response = adherence_stats(
        &catalog,
        &log,
        access,
        patient_id,
        query,
        today(),
        &config.stats,
    )?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Check the patient exists and is visible to the caller before writing
fn authorize_patient(config: &Config, access: &ClinicScope, patient_id: &str) -> Result<()> {
    let catalog = FileCatalog::new(config.data.catalog_path());
    let patient = catalog
        .get_patient(patient_id)?
        .ok_or_else(|| Error::NotFound(format!("patient {}", patient_id)))?;
    access.authorize(&patient.clinic_id)
}

fn cmd_log_dose(config: &Config, access: &ClinicScope, record: DoseRecord) -> Result<()> {
    authorize_patient(config, access, &record.patient_id)?;

    let mut log = DoseLog::new(config.data.log_dir());
    log.record_dose(&record)?;

    println!("✓ Dose logged ({})", record.id);
    Ok(())
}

fn cmd_log_side_effect(
    config: &Config,
    access: &ClinicScope,
    record: SideEffectRecord,
) -> Result<()> {
    authorize_patient(config, access, &record.patient_id)?;

    let mut log = DoseLog::new(config.data.log_dir());
    log.record_side_effect(&record)?;

    println!("✓ Side effect logged ({})", record.id);
    Ok(())
}
