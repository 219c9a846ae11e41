//! Stock depletion forecasting.
//!
//! The daily consumption rate is the total amount taken over the
//! observation window divided by the window length. Stock divided by that
//! rate, rounded down, gives the days left.

use crate::{DosageHistoryEntry, Medicine};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

/// Projected depletion of one medicine
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DepletionForecast {
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub stock: f64,
    pub daily_rate: f64,
    /// `None` when nothing is being consumed
    pub days_remaining: Option<i64>,
    /// `None` means the stock never runs out at the observed rate
    pub depletion_date: Option<NaiveDate>,
}

impl DepletionForecast {
    pub fn never_depletes(&self) -> bool {
        self.depletion_date.is_none()
    }
}

/// Average amount of `medicine_id` taken per day over `[today - window_days, today)`
pub fn daily_consumption(
    medicine_id: Uuid,
    history: &[DosageHistoryEntry],
    window_days: u32,
    today: NaiveDate,
) -> f64 {
    if window_days == 0 {
        return 0.0;
    }

    let window_start = today
        .checked_sub_days(Days::new(window_days as u64))
        .unwrap_or(NaiveDate::MIN);
    let consumed: f64 = history
        .iter()
        .filter(|e| e.medicine_id == medicine_id)
        .filter(|e| {
            let date = e.date();
            date >= window_start && date < today
        })
        .map(|e| e.amount)
        .sum();

    consumed / window_days as f64
}

/// Forecast when `medicine` will run out
///
/// A depletion date past `NaiveDate::MAX` is reported as never running out.
pub fn forecast_depletion(
    medicine: &Medicine,
    history: &[DosageHistoryEntry],
    observation_window_days: u32,
    today: NaiveDate,
) -> DepletionForecast {
    let daily_rate = daily_consumption(medicine.id, history, observation_window_days, today);

    let days_remaining = if medicine.stock <= 0.0 {
        Some(0)
    } else if daily_rate <= 0.0 {
        None
    } else {
        Some((medicine.stock / daily_rate).floor() as i64)
    };

    let depletion_date = days_remaining
        .and_then(|days| u64::try_from(days).ok())
        .and_then(|days| today.checked_add_days(Days::new(days)));
    let days_remaining = days_remaining.filter(|_| depletion_date.is_some());

    tracing::debug!(
        "Forecast for {}: stock {}, rate {:.3}/day, depletes {:?}",
        medicine.name,
        medicine.stock,
        daily_rate,
        depletion_date
    );

    DepletionForecast {
        medicine_id: medicine.id,
        medicine_name: medicine.name.clone(),
        stock: medicine.stock,
        daily_rate,
        days_remaining,
        depletion_date,
    }
}

/// Forecast every medicine, soonest depletion first
///
/// Medicines that never run out come last; ties are broken by name.
pub fn forecast_all<'a, I>(
    medicines: I,
    history: &[DosageHistoryEntry],
    observation_window_days: u32,
    today: NaiveDate,
) -> Vec<DepletionForecast>
where
    I: IntoIterator<Item = &'a Medicine>,
{
    let mut forecasts: Vec<_> = medicines
        .into_iter()
        .map(|m| forecast_depletion(m, history, observation_window_days, today))
        .collect();

    forecasts.sort_by(|a, b| {
        let by_date = match (a.depletion_date, b.depletion_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| a.medicine_name.cmp(&b.medicine_name))
    });

    forecasts
}

/// Medicines expiring on or before `today + within_days`, soonest first
pub fn expiring_within<'a, I>(medicines: I, today: NaiveDate, within_days: u32) -> Vec<&'a Medicine>
where
    I: IntoIterator<Item = &'a Medicine>,
{
    let horizon = today
        .checked_add_days(Days::new(within_days as u64))
        .unwrap_or(NaiveDate::MAX);
    let mut expiring: Vec<_> = medicines
        .into_iter()
        .filter(|m| m.expires_on.is_some_and(|d| d <= horizon))
        .collect();
    expiring.sort_by_key(|m| m.expires_on);
    expiring
}
