use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete controller state captured by the collector at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusFlags {
    pub connected: bool,
    pub servo_on: bool,
    pub operating: bool,
    pub alarm: bool,
    pub error: bool,
    /// Controller parked in its energy-saving stop.
    pub stopped: bool,
    pub hold: bool,
    pub door_open: bool,
    pub cmos_backup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub controller_id: i64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub flags: StatusFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Running,
    EnergySaving,
    Alarm,
    Idle,
    Disconnect,
    ServoOff,
}

type Rule = (fn(&StatusFlags) -> bool, StatusCategory);

/// Evaluated top-down, first match wins. Anything left over is idle.
pub const CLASSIFICATION_RULES: [Rule; 5] = [
    (|f| !f.connected, StatusCategory::Disconnect),
    (|f| !f.servo_on, StatusCategory::ServoOff),
    (|f| f.alarm || f.error, StatusCategory::Alarm),
    (|f| f.operating, StatusCategory::Running),
    (|f| f.stopped, StatusCategory::EnergySaving),
];

impl StatusCategory {
    pub const ALL: [StatusCategory; 6] = [
        StatusCategory::Running,
        StatusCategory::EnergySaving,
        StatusCategory::Alarm,
        StatusCategory::Idle,
        StatusCategory::Disconnect,
        StatusCategory::ServoOff,
    ];

    pub fn classify(flags: &StatusFlags) -> Self {
        CLASSIFICATION_RULES
            .iter()
            .find(|(matches, _)| matches(flags))
            .map(|(_, category)| *category)
            .unwrap_or(StatusCategory::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Running => "running",
            StatusCategory::EnergySaving => "energy_saving",
            StatusCategory::Alarm => "alarm",
            StatusCategory::Idle => "idle",
            StatusCategory::Disconnect => "disconnect",
            StatusCategory::ServoOff => "servo_off",
        }
    }
}

impl StatusSnapshot {
    pub fn category(&self) -> StatusCategory {
        StatusCategory::classify(&self.flags)
    }
}
