#![forbid(unsafe_code)]

//! Core domain model and business logic for medtrack.
//!
//! This crate provides:
//! - Domain types (medicines, schedule rules, dosage history)
//! - The schedule & adherence engine: recurrence expansion, daily
//!   schedules, weekly adherence and stock depletion forecasts
//! - Read-only source traits the engine's caller fetches snapshots through
//! - Persistence (JSON record store, dose WAL, CSV archive)
//!
//! The engine functions are pure: they never touch the store or read the
//! clock, so "today" is always passed in.

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod recurrence;
pub mod catalog;
pub mod schedule;
pub mod adherence;
pub mod forecast;
pub mod sources;
pub mod wal;
pub mod csv_rollup;
pub mod history;
pub mod store;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use recurrence::{is_active, DayOfWeek, WeekdaySet};
pub use catalog::{MedicineCatalog, MedicineLookup};
pub use schedule::{build_daily_schedule, DailySchedule, MissingReferenceWarning, TimeSlot};
pub use adherence::{compute_weekly_adherence, AdherenceStatus, DayAdherence, WeeklyAdherence};
pub use forecast::{forecast_all, forecast_depletion, DepletionForecast};
pub use sources::{DosageHistorySource, MedicineSource, ScheduleSource};
pub use store::JsonStore;
