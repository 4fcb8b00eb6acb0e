//! Gluco CLI
//!
//! Command-line interface for the gluco-meter API:
//! - Sign in, sign up, sign out
//! - List, show, add, edit and delete readings
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use gluco::readings::model::{format_metric, format_recorded_at, wire_time, Bounds};
use gluco::readings::Pager;
use gluco::{
    ApiClient, Config, Dashboard, FileTokenStore, Reading, ReadingDraft, ReadingFilter,
    ReadingId, ReadingType, SessionStore, UserProfile,
};

#[derive(Parser)]
#[command(name = "gluco")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track glucose readings against the gluco-meter API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and remember the session
    Login {
        email: String,
        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Signup {
        full_name: String,
        email: String,
        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List readings, newest first
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show a single reading
    Show { id: ReadingId },

    /// Add a reading
    Add {
        /// Glucose value in mg/dL
        value: String,
        #[command(flatten)]
        fields: ReadingArgs,
    },

    /// Edit a reading; omitted fields keep their current value
    Edit {
        id: ReadingId,
        /// Glucose value in mg/dL
        #[arg(short, long)]
        value: Option<String>,
        #[command(flatten)]
        fields: ReadingArgs,
    },

    /// Delete a reading
    Delete {
        id: ReadingId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Optional reading fields. Metric values are passed through as typed;
/// invalid ones are reported and dropped.
#[derive(Args, Default)]
pub struct ReadingArgs {
    /// fasting, pp or random
    #[arg(short = 't', long = "type")]
    reading_type: Option<ReadingType>,
    /// When the reading was taken, e.g. 2025-03-04T08:30 (default: now)
    #[arg(long)]
    at: Option<String>,
    #[arg(short, long)]
    notes: Option<String>,
    #[arg(long)]
    steps: Option<String>,
    /// Hours slept, 0-24
    #[arg(long)]
    sleep: Option<String>,
    /// Minutes of exercise
    #[arg(long)]
    exercise: Option<String>,
    #[arg(long)]
    calories: Option<String>,
    /// Protein intake in grams
    #[arg(long)]
    protein: Option<String>,
    /// Carbohydrate intake in grams
    #[arg(long)]
    carbs: Option<String>,
}

impl ReadingArgs {
    fn apply(self, draft: &mut ReadingDraft) {
        let set = |field: &mut String, value: Option<String>| {
            if let Some(value) = value {
                *field = value;
            }
        };

        if let Some(reading_type) = self.reading_type {
            draft.reading_type = reading_type;
        }
        set(&mut draft.recorded_at, self.at);
        set(&mut draft.notes, self.notes);
        set(&mut draft.step_count, self.steps);
        set(&mut draft.sleep_hours, self.sleep);
        set(&mut draft.exercise_minutes, self.exercise);
        set(&mut draft.calorie_count, self.calories);
        set(&mut draft.protein_grams, self.protein);
        set(&mut draft.carb_grams, self.carbs);
    }
}

#[derive(Args, Default)]
pub struct FilterArgs {
    /// Only readings taken at or after this time
    #[arg(long)]
    from: Option<String>,
    /// Only readings taken at or before this time
    #[arg(long)]
    to: Option<String>,
    /// fasting, pp or random
    #[arg(short = 't', long = "type")]
    reading_type: Option<ReadingType>,
    #[arg(long)]
    min_steps: Option<u32>,
    #[arg(long)]
    max_steps: Option<u32>,
    #[arg(long)]
    min_sleep: Option<f64>,
    #[arg(long)]
    max_sleep: Option<f64>,
    #[arg(long)]
    min_exercise: Option<u32>,
    #[arg(long)]
    max_exercise: Option<u32>,
    #[arg(long)]
    min_calories: Option<u32>,
    #[arg(long)]
    max_calories: Option<u32>,
    #[arg(long)]
    min_protein: Option<f64>,
    #[arg(long)]
    max_protein: Option<f64>,
    #[arg(long)]
    min_carbs: Option<f64>,
    #[arg(long)]
    max_carbs: Option<f64>,
}

impl FilterArgs {
    fn into_filter(self) -> anyhow::Result<ReadingFilter> {
        let time = |raw: Option<String>| -> anyhow::Result<_> {
            raw.map(|raw| {
                wire_time::parse(&raw).with_context(|| format!("Invalid date/time: {}", raw))
            })
            .transpose()
        };

        Ok(ReadingFilter {
            start: time(self.from)?,
            end: time(self.to)?,
            reading_type: self.reading_type,
            step_count: Bounds::new(self.min_steps, self.max_steps),
            sleep_hours: Bounds::new(self.min_sleep, self.max_sleep),
            exercise_minutes: Bounds::new(self.min_exercise, self.max_exercise),
            calorie_count: Bounds::new(self.min_calories, self.max_calories),
            protein_grams: Bounds::new(self.min_protein, self.max_protein),
            carb_grams: Bounds::new(self.min_carbs, self.max_carbs),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logging is configured by this file, so load problems go to stderr
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => {
            let (config, failures) = Config::load_first(&Config::search_paths());
            for e in failures {
                eprintln!("Warning: {}", e);
            }
            config
        }
    };
    if let Some(url) = &cli.api_url {
        config.api.base_url = Some(url.clone());
    }

    if let Err(e) = gluco::logging::init(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    let client = ApiClient::new(&config.api)?;
    let token_path = config.session.resolved_token_path();
    tracing::debug!(base_url = client.base_url(), token_path = ?token_path, "Starting");

    let session = Arc::new(SessionStore::new(
        client,
        Arc::new(FileTokenStore::new(token_path)),
    ));
    let dashboard = Dashboard::new(session.clone(), config.api.page_size);

    match cli.command {
        Commands::Login { email, password } => {
            let password = read_password(password)?;
            if session.login(&email, &password).await {
                println!("{}", session.message().await.unwrap_or_default());
            } else {
                bail!("{}", session.error().await.unwrap_or_default());
            }
        }

        Commands::Signup {
            full_name,
            email,
            password,
        } => {
            let password = read_password(password)?;
            if session.signup(&full_name, &email, &password).await {
                println!("{}", session.message().await.unwrap_or_default());
            } else {
                bail!("{}", session.error().await.unwrap_or_default());
            }
        }

        Commands::Logout => {
            session.logout().await;
            println!("{}", session.message().await.unwrap_or_default());
        }

        Commands::Whoami => {
            let user = require_user(&session).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&user)?),
                OutputFormat::Table => {
                    println!("{} ({})", user.display_name(), user.email);
                    if let Some(role) = &user.role {
                        println!("Role: {}", role);
                    }
                }
            }
        }

        Commands::List { page, filter } => {
            require_user(&session).await?;
            let list = dashboard.list();
            list.set_filter(filter.into_filter()?).await?;
            list.load(page).await?;

            let state = list.snapshot().await;
            let pager = list.pager().await;
            match cli.format {
                OutputFormat::Json => {
                    let body = serde_json::json!({
                        "total": state.total,
                        "page": state.page,
                        "size": list.page_size(),
                        "readings": state.readings,
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                OutputFormat::Table => print_table(&state.readings, &pager),
            }
        }

        Commands::Show { id } => {
            require_user(&session).await?;
            let reading = dashboard.list().get(id).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reading)?),
                OutputFormat::Table => print_reading(&reading),
            }
        }

        Commands::Add { value, fields } => {
            require_user(&session).await?;
            dashboard
                .form()
                .update_draft(|draft| {
                    draft.value = value;
                    fields.apply(draft);
                })
                .await;
            dashboard.submit().await;
            report(&dashboard).await?;
        }

        Commands::Edit { id, value, fields } => {
            require_user(&session).await?;
            let reading = dashboard.list().get(id).await?;
            dashboard.edit(&reading).await;
            dashboard
                .form()
                .update_draft(|draft| {
                    if let Some(value) = value {
                        draft.value = value;
                    }
                    fields.apply(draft);
                })
                .await;
            dashboard.submit().await;
            report(&dashboard).await?;
        }

        Commands::Delete { id, yes } => {
            require_user(&session).await?;
            let confirm = |prompt: &str| yes || prompt_confirm(prompt);
            let deleted = dashboard.delete(id, &confirm).await;
            if !deleted && dashboard.feedback().await.error.is_none() {
                println!("Cancelled.");
            } else {
                report(&dashboard).await?;
            }
        }

        Commands::Config { output } => {
            let config = gluco::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Restore the stored session and return its user
async fn require_user(session: &SessionStore) -> anyhow::Result<UserProfile> {
    session.restore().await;
    match session.user().await {
        Some(user) => Ok(user),
        None => bail!("Not signed in. Run `gluco login <email>` first."),
    }
}

/// Print the dashboard feedback; an error becomes the command's failure
async fn report(dashboard: &Dashboard) -> anyhow::Result<()> {
    let feedback = dashboard.feedback().await;
    if let Some(warning) = &feedback.warning {
        eprintln!("Warning: {}", warning);
    }
    if let Some(error) = feedback.error {
        bail!(error);
    }
    if let Some(success) = feedback.success {
        println!("{}", success);
    }
    Ok(())
}

fn read_password(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn prompt_confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    io::stdin().read_line(&mut answer).is_ok()
        && matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_table(readings: &[Reading], pager: &Pager) {
    if readings.is_empty() {
        println!("No readings yet.");
        println!();
        println!("Add your first one with:");
        println!("  gluco add 95 --type fasting");
        return;
    }

    println!(
        "{:<6} {:<19} {:<13} {:>6} {:>7} {:>6} {:>9} {:>9} {:>8} {:>6}  {}",
        "ID", "Recorded", "Type", "mg/dL", "Steps", "Sleep", "Exercise", "Calories", "Protein",
        "Carbs", "Notes"
    );
    println!("{}", "-".repeat(110));

    for r in readings {
        let m = &r.metrics;
        println!(
            "{:<6} {:<19} {:<13} {:>6} {:>7} {:>6} {:>9} {:>9} {:>8} {:>6}  {}",
            r.id,
            format_recorded_at(&r.recorded_at),
            r.reading_type.label(),
            r.value,
            format_metric(m.step_count.map(f64::from)),
            format_metric(m.sleep_hours),
            format_metric(m.exercise_minutes.map(f64::from)),
            format_metric(m.calorie_count.map(f64::from)),
            format_metric(m.protein_grams),
            format_metric(m.carb_grams),
            r.notes.as_deref().unwrap_or(""),
        );
    }

    println!();
    println!(
        "Page {} of {} ({} readings)",
        pager.page,
        pager.page_count(),
        pager.total
    );
    if let Some(next) = pager.next_page() {
        println!("Next: gluco list --page {}", next);
    }
}

fn print_reading(r: &Reading) {
    let m = &r.metrics;
    println!("Reading {}", r.id);
    println!("  Recorded:  {}", format_recorded_at(&r.recorded_at));
    println!("  Type:      {}", r.reading_type);
    println!("  Value:     {} mg/dL", r.value);
    println!("  Steps:     {}", format_metric(m.step_count.map(f64::from)));
    println!("  Sleep:     {} h", format_metric(m.sleep_hours));
    println!("  Exercise:  {} min", format_metric(m.exercise_minutes.map(f64::from)));
    println!("  Calories:  {}", format_metric(m.calorie_count.map(f64::from)));
    println!("  Protein:   {} g", format_metric(m.protein_grams));
    println!("  Carbs:     {} g", format_metric(m.carb_grams));
    if let Some(notes) = &r.notes {
        println!("  Notes:     {}", notes);
    }
}
