use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use medtrack_core::adherence::{trailing_window_start, week_start_monday, WINDOW_DAYS};
use medtrack_core::config::WindowAnchor;
use medtrack_core::forecast::expiring_within;
use medtrack_core::*;
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "medtrack")]
#[command(about = "Personal medication schedule and adherence tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage medicines
    Medicine {
        #[command(subcommand)]
        action: MedicineCommand,
    },

    /// Manage recurring schedule rules
    Rule {
        #[command(subcommand)]
        action: RuleCommand,
    },

    /// Record a dose as taken
    Take {
        /// Medicine name or id
        medicine: String,

        /// Amount taken
        #[arg(long, default_value_t = 1.0)]
        amount: f64,

        /// When it was taken (YYYY-MM-DDTHH:MM), defaults to now
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<NaiveDateTime>,
    },

    /// Show the schedule for one day (default)
    Schedule {
        /// Date to show (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show adherence over a 7-day window
    Adherence {
        /// First day of the window (YYYY-MM-DD)
        #[arg(long, conflicts_with = "trailing")]
        start: Option<NaiveDate>,

        /// Use the seven days ending today instead of the current Monday-start week
        #[arg(long)]
        trailing: bool,
    },

    /// Forecast when medicines run out, soonest first
    Forecast {
        /// Date to forecast from (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Days of history used to estimate consumption
        #[arg(long)]
        window: Option<u32>,

        /// Only forecast this medicine (name or id)
        #[arg(long)]
        medicine: Option<String>,
    },

    /// List medicines that expire soon
    Expiring {
        /// Look this many days ahead
        #[arg(long)]
        within: Option<u32>,

        /// Date to look ahead from (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Roll up the dose log into the CSV archive
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },

    /// Check stored medicines and rules for problems
    Check,
}

#[derive(Subcommand)]
enum MedicineCommand {
    /// Add a medicine
    Add {
        #[arg(long)]
        name: String,

        /// Amount per dose
        #[arg(long)]
        dose: f64,

        /// Unit of dose and stock (tablet, ml, ...)
        #[arg(long)]
        unit: String,

        /// Quantity currently in stock
        #[arg(long)]
        stock: f64,

        #[arg(long)]
        description: Option<String>,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<NaiveDate>,
    },

    /// List medicines
    List,

    /// Add to a medicine's stock
    Restock {
        /// Medicine name or id
        medicine: String,
        quantity: f64,
    },

    /// Remove a medicine
    Remove {
        /// Medicine name or id
        medicine: String,
    },
}

#[derive(Subcommand)]
enum RuleCommand {
    /// Add a recurring rule
    Add {
        /// Medicine name or id
        #[arg(long)]
        medicine: String,

        /// Time of day (HH:MM, 24-hour)
        #[arg(long)]
        time: TimeOfDay,

        /// Amount per dose
        #[arg(long, default_value_t = 1.0)]
        amount: f64,

        /// Comma-separated weekday codes (MON,TUE,...); omit for every day
        #[arg(long, value_parser = WeekdaySet::parse_strict, default_value = "")]
        days: WeekdaySet,
    },

    /// List rules
    List,

    /// Pause a rule without deleting it
    Pause { id: Uuid },

    /// Resume a paused rule
    Resume { id: Uuid },

    /// Delete a rule
    Remove { id: Uuid },
}

fn parse_timestamp(s: &str) -> std::result::Result<NaiveDateTime, String> {
    let s = s.trim();
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .ok_or_else(|| format!("invalid timestamp {:?} (expected YYYY-MM-DDTHH:MM)", s))
}

fn main() -> Result<()> {
    medtrack_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    let store = JsonStore::open(data_dir)?;
    let out = Output { json: cli.json };

    match cli.command {
        Some(Commands::Medicine { action }) => cmd_medicine(&store, action, &out),
        Some(Commands::Rule { action }) => cmd_rule(&store, action, &out),
        Some(Commands::Take { medicine, amount, at }) => cmd_take(&store, &medicine, amount, at, &out),
        Some(Commands::Schedule { date }) => cmd_schedule(&store, date, &out),
        Some(Commands::Adherence { start, trailing }) => {
            cmd_adherence(&store, start, trailing, &config, &out)
        }
        Some(Commands::Forecast {
            today,
            window,
            medicine,
        }) => cmd_forecast(&store, today, window, medicine, &config, &out),
        Some(Commands::Expiring { within, today }) => {
            cmd_expiring(&store, within, today, &config, &out)
        }
        Some(Commands::Rollup { cleanup }) => cmd_rollup(&store, cleanup, &out),
        Some(Commands::Check) => cmd_check(&store, &out),
        None => cmd_schedule(&store, None, &out),
    }
}

/// Text or JSON rendering of command results
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text();
        }
        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn resolve(catalog: &MedicineCatalog, key: &str) -> Result<Medicine> {
    catalog
        .resolve(key)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("medicine {:?}", key)))
}

fn cmd_medicine(store: &JsonStore, action: MedicineCommand, out: &Output) -> Result<()> {
    match action {
        MedicineCommand::Add {
            name,
            dose,
            unit,
            stock,
            description,
            expires,
        } => {
            if name.trim().is_empty() {
                return Err(Error::Validation("medicine name cannot be empty".into()));
            }
            if store.catalog()?.resolve(&name).is_some() {
                return Err(Error::Validation(format!("medicine {:?} already exists", name)));
            }

            let mut medicine = Medicine::new(name.trim(), dose, unit, stock);
            medicine.description = description;
            medicine.expires_on = expires;
            store.upsert_medicine(&medicine)?;

            out.emit(&medicine, || {
                println!("✓ Added {} ({})", medicine.name, medicine.id);
            })
        }

        MedicineCommand::List => {
            let catalog = store.catalog()?;
            let medicines = catalog.sorted_by_name();
            out.emit(&medicines, || {
                if medicines.is_empty() {
                    println!("No medicines yet. Add one with `medtrack medicine add`.");
                }
                for m in &medicines {
                    let expiry = m
                        .expires_on
                        .map(|d| format!(", expires {}", d))
                        .unwrap_or_default();
                    println!(
                        "  {:<24} {} {} in stock, {} {} per dose{}",
                        m.name, m.stock, m.unit, m.dose_amount, m.unit, expiry
                    );
                    println!("  {:<24} {}", "", m.id);
                }
            })
        }

        MedicineCommand::Restock { medicine, quantity } => {
            let medicine = resolve(&store.catalog()?, &medicine)?;
            let updated = store.adjust_stock(medicine.id, quantity)?;
            out.emit(&updated, || {
                println!("✓ {} now has {} {} in stock", updated.name, updated.stock, updated.unit);
            })
        }

        MedicineCommand::Remove { medicine } => {
            let medicine = resolve(&store.catalog()?, &medicine)?;
            store.remove_medicine(medicine.id)?;
            out.emit(&medicine, || println!("✓ Removed {}", medicine.name))
        }
    }
}

fn cmd_rule(store: &JsonStore, action: RuleCommand, out: &Output) -> Result<()> {
    match action {
        RuleCommand::Add {
            medicine,
            time,
            amount,
            days,
        } => {
            if amount <= 0.0 {
                return Err(Error::Validation("amount must be positive".into()));
            }
            let medicine = resolve(&store.catalog()?, &medicine)?;
            let rule = ScheduleRule::new(medicine.id, time, amount, days);
            store.upsert_rule(&rule)?;

            out.emit(&rule, || {
                println!(
                    "✓ {} {} of {} at {} ({})",
                    rule.amount, medicine.unit, medicine.name, rule.time, rule.days
                );
                println!("  Rule id: {}", rule.id);
            })
        }

        RuleCommand::List => {
            let catalog = store.catalog()?;
            let mut rules = store.rules()?;
            rules.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));

            out.emit(&rules, || {
                if rules.is_empty() {
                    println!("No schedule rules yet. Add one with `medtrack rule add`.");
                }
                for rule in &rules {
                    let name = catalog
                        .get(&rule.medicine_id)
                        .map(|m| m.name.as_str())
                        .unwrap_or("<missing medicine>");
                    let paused = if rule.paused { "  [paused]" } else { "" };
                    println!(
                        "  {}  {} x{}  {}{}",
                        rule.time, name, rule.amount, rule.days, paused
                    );
                    println!("         {}", rule.id);
                }
            })
        }

        RuleCommand::Pause { id } => cmd_set_paused(store, id, true, out),
        RuleCommand::Resume { id } => cmd_set_paused(store, id, false, out),

        RuleCommand::Remove { id } => {
            if !store.remove_rule(id)? {
                return Err(Error::NotFound(format!("schedule rule {}", id)));
            }
            out.emit(&id, || println!("✓ Removed rule {}", id))
        }
    }
}

fn cmd_set_paused(store: &JsonStore, id: Uuid, paused: bool, out: &Output) -> Result<()> {
    let rule = store.set_rule_paused(id, paused)?;
    out.emit(&rule, || {
        let state = if paused { "Paused" } else { "Resumed" };
        println!("✓ {} rule {} at {}", state, rule.id, rule.time);
    })
}

fn cmd_take(
    store: &JsonStore,
    medicine: &str,
    amount: f64,
    at: Option<NaiveDateTime>,
    out: &Output,
) -> Result<()> {
    if amount <= 0.0 {
        return Err(Error::Validation("amount must be positive".into()));
    }
    let medicine = resolve(&store.catalog()?, medicine)?;
    let taken_at = at.unwrap_or_else(|| Local::now().naive_local());

    let entry = DosageHistoryEntry::new(medicine.id, taken_at, amount);
    let updated = store.record_dose(&entry)?;

    #[derive(Serialize)]
    struct Taken<'a> {
        entry: &'a DosageHistoryEntry,
        stock: f64,
    }

    out.emit(
        &Taken {
            entry: &entry,
            stock: updated.stock,
        },
        || {
            println!(
                "✓ Took {} {} of {} at {}",
                amount,
                updated.unit,
                updated.name,
                taken_at.format("%Y-%m-%d %H:%M")
            );
            println!("  {} {} left", updated.stock, updated.unit);
        },
    )
}

fn cmd_schedule(store: &JsonStore, date: Option<NaiveDate>, out: &Output) -> Result<()> {
    let date = date.unwrap_or_else(today);
    let rules = store.list_active(None)?;
    let catalog = store.catalog()?;

    let schedule = build_daily_schedule(&rules, &catalog, date);
    for warning in &schedule.warnings {
        tracing::warn!("Skipped: {}", warning);
    }

    out.emit(&schedule, || {
        if schedule.is_empty() {
            println!("Nothing scheduled for {} {}", DayOfWeek::of(date), date);
            return;
        }

        println!("Schedule for {} {}", DayOfWeek::of(date), date);
        for slot in &schedule.slots {
            for (i, dose) in slot.doses.iter().enumerate() {
                let time = if i == 0 { slot.time.to_string() } else { String::new() };
                println!(
                    "  {:<5}  {} x{} {}",
                    time, dose.medicine.name, dose.amount, dose.medicine.unit
                );
            }
        }
        if !schedule.warnings.is_empty() {
            println!();
            println!("  {} rule(s) skipped: medicine missing", schedule.warnings.len());
        }
    })
}

fn cmd_adherence(
    store: &JsonStore,
    start: Option<NaiveDate>,
    trailing: bool,
    config: &Config,
    out: &Output,
) -> Result<()> {
    let window_start = match start {
        Some(start) => start,
        None if trailing || config.adherence.window == WindowAnchor::Trailing => {
            trailing_window_start(today())
        }
        None => week_start_monday(today()),
    };
    let window_end = window_start
        .checked_add_days(Days::new(WINDOW_DAYS as u64))
        .ok_or_else(|| Error::Validation(format!("no 7-day window starts at {}", window_start)))?;

    let rules = store.list_active(None)?;
    let history = store.list_between(window_start, window_end)?;

    let week = compute_weekly_adherence(&rules, &history, window_start);

    out.emit(&week, || {
        println!(
            "Adherence {} to {}",
            window_start,
            window_end.pred_opt().unwrap_or(window_end)
        );
        for day in &week.days {
            let status = match day.status {
                AdherenceStatus::Complete => "✓ complete",
                AdherenceStatus::Partial => "~ partial",
                AdherenceStatus::None => "· none",
            };
            println!(
                "  {:<9} {:02}/{:02}  {:<11} {}/{}",
                day.weekday.name(),
                day.day_number,
                day.month,
                status,
                day.taken_count,
                day.expected_count
            );
        }
    })
}

fn cmd_forecast(
    store: &JsonStore,
    today_arg: Option<NaiveDate>,
    window: Option<u32>,
    medicine: Option<String>,
    config: &Config,
    out: &Output,
) -> Result<()> {
    let today = today_arg.unwrap_or_else(today);
    let window = window.unwrap_or(config.forecast.observation_window_days);
    if window == 0 {
        return Err(Error::Validation("window must be at least 1 day".into()));
    }

    let catalog = store.catalog()?;
    let medicines: Vec<Medicine> = match medicine {
        Some(key) => vec![resolve(&catalog, &key)?],
        None => catalog.sorted_by_name().into_iter().cloned().collect(),
    };

    let window_start = today
        .checked_sub_days(Days::new(window as u64))
        .unwrap_or(NaiveDate::MIN);
    let history = store.list_between(window_start, today)?;
    let forecasts = forecast_all(&medicines, &history, window, today);

    out.emit(&forecasts, || {
        if forecasts.is_empty() {
            println!("No medicines to forecast.");
        }
        for f in &forecasts {
            let outlook = match (f.depletion_date, f.days_remaining) {
                (Some(date), Some(0)) => format!("out of stock ({})", date),
                (Some(date), Some(days)) => format!("runs out {} (in {} days)", date, days),
                _ => "not being used".to_string(),
            };
            println!(
                "  {:<24} {:>8.1} left  {:>6.2}/day  {}",
                f.medicine_name, f.stock, f.daily_rate, outlook
            );
        }
    })
}

fn cmd_expiring(
    store: &JsonStore,
    within: Option<u32>,
    today_arg: Option<NaiveDate>,
    config: &Config,
    out: &Output,
) -> Result<()> {
    let today = today_arg.unwrap_or_else(today);
    let within = within.unwrap_or(config.forecast.expiry_warning_days);

    let medicines = store.medicines()?;
    let expiring = expiring_within(&medicines, today, within);

    out.emit(&expiring, || {
        if expiring.is_empty() {
            println!("Nothing expires in the next {} days.", within);
        }
        for m in &expiring {
            if let Some(date) = m.expires_on {
                let note = if date < today { "  (expired)" } else { "" };
                println!("  {:<24} {}{}", m.name, date, note);
            }
        }
    })
}

fn cmd_rollup(store: &JsonStore, cleanup: bool, out: &Output) -> Result<()> {
    let count = store.rollup(cleanup)?;
    out.emit(&serde_json::json!({ "rolled_up": count }), || {
        if count == 0 {
            println!("No doses in the log - nothing to roll up.");
        } else {
            println!("✓ Rolled up {} doses to CSV", count);
            println!("  CSV: {}", store.dose_csv_path().display());
        }
    })
}

fn cmd_check(store: &JsonStore, out: &Output) -> Result<()> {
    let catalog = store.catalog()?;
    let rules = store.rules()?;
    let problems = catalog.validate(&rules);

    out.emit(&problems, || {
        if problems.is_empty() {
            println!(
                "✓ {} medicines and {} rules look consistent",
                catalog.len(),
                rules.len()
            );
        } else {
            println!("Found {} problem(s):", problems.len());
            for problem in &problems {
                println!("  - {}", problem);
            }
        }
    })?;

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(format!("{} problem(s) found", problems.len())))
    }
}
