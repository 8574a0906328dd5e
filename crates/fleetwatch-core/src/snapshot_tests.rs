use crate::snapshot::{StatusCategory, StatusFlags, CLASSIFICATION_RULES};

fn healthy() -> StatusFlags {
    StatusFlags {
        connected: true,
        servo_on: true,
        ..StatusFlags::default()
    }
}

#[test]
fn disconnect_outranks_alarm() {
    let flags = StatusFlags {
        connected: false,
        alarm: true,
        ..healthy()
    };

    assert_eq!(StatusCategory::classify(&flags), StatusCategory::Disconnect);
}

#[test]
fn servo_off_outranks_alarm_and_operating() {
    let flags = StatusFlags {
        servo_on: false,
        alarm: true,
        operating: true,
        ..healthy()
    };

    assert_eq!(StatusCategory::classify(&flags), StatusCategory::ServoOff);
}

#[test]
fn error_counts_as_alarm_and_outranks_operating() {
    let flags = StatusFlags {
        error: true,
        operating: true,
        ..healthy()
    };

    assert_eq!(StatusCategory::classify(&flags), StatusCategory::Alarm);
}

#[test]
fn operating_outranks_stopped() {
    let flags = StatusFlags {
        operating: true,
        stopped: true,
        ..healthy()
    };

    assert_eq!(StatusCategory::classify(&flags), StatusCategory::Running);
}

#[test]
fn stopped_is_energy_saving_and_otherwise_idle() {
    let stopped = StatusFlags {
        stopped: true,
        ..healthy()
    };
    let held = StatusFlags {
        hold: true,
        door_open: true,
        ..healthy()
    };

    assert_eq!(StatusCategory::classify(&stopped), StatusCategory::EnergySaving);
    assert_eq!(StatusCategory::classify(&held), StatusCategory::Idle);
}

#[test]
fn rule_order_is_fixed() {
    let order: Vec<StatusCategory> = CLASSIFICATION_RULES.iter().map(|(_, c)| *c).collect();

    assert_eq!(
        order,
        vec![
            StatusCategory::Disconnect,
            StatusCategory::ServoOff,
            StatusCategory::Alarm,
            StatusCategory::Running,
            StatusCategory::EnergySaving,
        ]
    );
}
