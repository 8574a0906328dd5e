use std::collections::BTreeMap;

use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::ReportingConfig;
use crate::snapshot::{StatusCategory, StatusSnapshot};

/// Minutes accumulated per status category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryDurations {
    pub running: f64,
    pub energy_saving: f64,
    pub alarm: f64,
    pub idle: f64,
    pub disconnect: f64,
    pub servo_off: f64,
}

impl CategoryDurations {
    pub fn add(&mut self, category: StatusCategory, minutes: f64) {
        *self.slot(category) += minutes;
    }

    pub fn get(&self, category: StatusCategory) -> f64 {
        match category {
            StatusCategory::Running => self.running,
            StatusCategory::EnergySaving => self.energy_saving,
            StatusCategory::Alarm => self.alarm,
            StatusCategory::Idle => self.idle,
            StatusCategory::Disconnect => self.disconnect,
            StatusCategory::ServoOff => self.servo_off,
        }
    }

    pub fn total(&self) -> f64 {
        StatusCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Share of observed time spent running, in percent. Zero when nothing was observed.
    pub fn operating_rate(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        (self.running / total * 100.0).clamp(0.0, 100.0)
    }

    fn slot(&mut self, category: StatusCategory) -> &mut f64 {
        match category {
            StatusCategory::Running => &mut self.running,
            StatusCategory::EnergySaving => &mut self.energy_saving,
            StatusCategory::Alarm => &mut self.alarm,
            StatusCategory::Idle => &mut self.idle,
            StatusCategory::Disconnect => &mut self.disconnect,
            StatusCategory::ServoOff => &mut self.servo_off,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyBreakdown {
    pub hour: String,
    #[serde(flatten)]
    pub durations: CategoryDurations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBreakdown {
    pub date: String,
    #[serde(flatten)]
    pub durations: CategoryDurations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistory {
    pub status_durations: CategoryDurations,
    pub operating_rate: f64,
    pub hourly_data: Vec<HourlyBreakdown>,
    pub daily_data: Vec<DailyBreakdown>,
    pub total_records: usize,
}

pub struct StatusAggregator {
    config: ReportingConfig,
}

impl StatusAggregator {
    pub fn new(config: ReportingConfig) -> Self {
        Self { config }
    }

    /// Attributes the gap to the next sample to each sample's category.
    /// The final sample has no following boundary and contributes nothing.
    pub fn aggregate(&self, snapshots: &[StatusSnapshot]) -> StatusHistory {
        let mut ordered: Vec<&StatusSnapshot> = snapshots.iter().collect();
        ordered.sort_by_key(|s| s.recorded_at);

        let mut totals = CategoryDurations::default();
        let mut hourly = [CategoryDurations::default(); 24];
        let mut daily: BTreeMap<NaiveDate, CategoryDurations> = BTreeMap::new();

        for pair in ordered.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let minutes = (next.recorded_at - current.recorded_at).num_milliseconds() as f64 / 60_000.0;
            let category = current.category();
            let local = self.config.to_local(current.recorded_at);

            totals.add(category, minutes);
            hourly[local.hour() as usize].add(category, minutes);
            daily.entry(local.date()).or_default().add(category, minutes);
        }

        StatusHistory {
            status_durations: totals,
            operating_rate: totals.operating_rate(),
            hourly_data: hourly
                .iter()
                .enumerate()
                .map(|(hour, durations)| HourlyBreakdown {
                    hour: format!("{hour:02}:00"),
                    durations: *durations,
                })
                .collect(),
            daily_data: daily
                .into_iter()
                .map(|(date, durations)| DailyBreakdown {
                    date: date.format("%Y-%m-%d").to_string(),
                    durations,
                })
                .collect(),
            total_records: snapshots.len(),
        }
    }
}
