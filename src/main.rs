use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use uuid::Uuid;

use cardio_risk::classifier::RiskClassifier;
use cardio_risk::config::{self, LogLevel};
use cardio_risk::pipeline::{Diagnosis, RiskPipeline};
use cardio_risk::{batch, db, report};

#[derive(Parser)]
#[command(name = "cardio-risk")]
#[command(about = "Cardiovascular risk classification from clinical measurements", long_about = None)]
struct Cli {
    /// Trained risk model exported as JSON
    #[arg(
        long,
        global = true,
        env = "CARDIO_RISK_MODEL",
        default_value = "models/cardio_risk.json"
    )]
    model: PathBuf,

    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "CARDIO_RISK_LOG",
        value_enum,
        default_value = "info"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Register a patient
    AddPatient {
        #[arg(long)]
        name: String,
    },
    /// Assess one submission given as form fields
    Assess {
        /// Form field as key=value, e.g. --field edad=50
        #[arg(long = "field", short = 'f', value_parser = config::parse_field, required = true)]
        fields: Vec<(String, String)>,
        #[arg(long)]
        patient: Option<Uuid>,
        /// Store the diagnosis
        #[arg(long)]
        save: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assess every row of a CSV file
    AssessBatch {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        save: bool,
    },
    /// List patients with their diagnosis counts
    Patients,
    /// Write a markdown history of a patient's diagnoses
    History {
        #[arg(long)]
        patient: Uuid,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_logging(cli.log_level)?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(cli.database_url.as_deref()).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::AddPatient { name } => {
            let pool = connect(cli.database_url.as_deref()).await?;
            let id = db::add_patient(&pool, &name).await?;
            println!("Registered {name} as {id}.");
        }
        Commands::Assess {
            fields,
            patient,
            save,
            json,
        } => {
            let pipeline = load_pipeline(&cli.model)?;
            let pool = results_store(save, cli.database_url.as_deref());

            let form: HashMap<String, String> = fields.into_iter().collect();
            let diagnosis = match pipeline.diagnose(&form) {
                Ok(diagnosis) => diagnosis,
                Err(err) => {
                    tracing::error!(error = %err, "assessment failed");
                    anyhow::bail!(err.user_message());
                }
            };

            if let Some(pool) = &pool {
                persist(pool, patient, &diagnosis).await;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&diagnosis.assessment)?);
            } else {
                println!(
                    "Risk {} (class {}) with {:.2}% confidence.",
                    diagnosis.assessment.label,
                    diagnosis.assessment.risk_class.index(),
                    diagnosis.assessment.confidence
                );
            }
        }
        Commands::AssessBatch { csv, save } => {
            let pipeline = load_pipeline(&cli.model)?;
            let pool = results_store(save, cli.database_url.as_deref());

            let submissions = batch::read_submissions(&csv)?;
            let outcomes = batch::assess_all(&pipeline, submissions);
            let mut assessed = 0usize;

            for outcome in &outcomes {
                match &outcome.result {
                    Ok(diagnosis) => {
                        assessed += 1;
                        if let Some(pool) = &pool {
                            persist(pool, outcome.patient_id, diagnosis).await;
                        }
                        println!(
                            "- line {}: {} risk ({:.2}%)",
                            outcome.line,
                            diagnosis.assessment.label,
                            diagnosis.assessment.confidence
                        );
                    }
                    Err(err) => {
                        println!("- line {}: rejected, {}", outcome.line, err.user_message());
                    }
                }
            }

            println!(
                "Assessed {assessed} of {} rows from {}.",
                outcomes.len(),
                csv.display()
            );
        }
        Commands::Patients => {
            let pool = connect(cli.database_url.as_deref()).await?;
            let patients = db::fetch_patients(&pool).await?;
            print!("{}", report::render_patient_list(&patients));
        }
        Commands::History { patient, out } => {
            let pool = connect(cli.database_url.as_deref()).await?;
            let name = db::fetch_patient_name(&pool, patient)
                .await?
                .with_context(|| format!("no patient with id {patient}"))?;
            let diagnoses = db::fetch_diagnoses(&pool, patient).await?;
            let history = report::build_history_report(&name, patient, &diagnoses);

            match out {
                Some(out) => {
                    std::fs::write(&out, history)?;
                    println!("Report written to {}.", out.display());
                }
                None => print!("{history}"),
            }
        }
    }

    Ok(())
}

/// The process does not start assessing unless the model loads.
fn load_pipeline(model_path: &Path) -> anyhow::Result<RiskPipeline> {
    let classifier = RiskClassifier::from_path(model_path)
        .with_context(|| format!("cannot start without a risk model ({})", model_path.display()))?;
    Ok(RiskPipeline::new(classifier))
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL must be set to a production Postgres instance")?;
    db::connect(database_url).await
}

/// Storage for assessment results is best-effort: a missing or unusable
/// database is logged and the results are still printed.
fn results_store(save: bool, database_url: Option<&str>) -> Option<PgPool> {
    if !save {
        return None;
    }
    let pool = database_url
        .context("DATABASE_URL is not set")
        .and_then(db::connect_lazy);
    match pool {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!(error = %err, "diagnoses will not be stored");
            None
        }
    }
}

// A failed write is logged and the result is still reported.
async fn persist(pool: &PgPool, patient_id: Option<Uuid>, diagnosis: &Diagnosis) {
    match db::save_diagnosis(pool, patient_id, diagnosis).await {
        Ok(id) => tracing::debug!(diagnosis = %id, "diagnosis stored"),
        Err(err) => tracing::warn!(error = %err, "failed to store diagnosis"),
    }
}
