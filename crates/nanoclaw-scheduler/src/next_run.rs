//! Computes a task's next fire time after a completed run.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use nanoclaw_types::{ScheduleKind, ScheduleValue};

use crate::error::{Result, SchedulerError};

/// The next time a task should fire after `after`, given its schedule.
/// `once` tasks never fire again once consumed, so this returns `None`
/// for that kind unconditionally.
pub fn compute_next_run(
    kind: ScheduleKind,
    value: &ScheduleValue,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    match (kind, value) {
        (ScheduleKind::Cron, ScheduleValue::Cron(expr)) => {
            let schedule = Schedule::from_str(expr)
                .map_err(|e| SchedulerError::InvalidCronExpression(e.to_string()))?;
            Ok(schedule.after(&after).next())
        }
        (ScheduleKind::Interval, ScheduleValue::IntervalMs(ms)) => {
            Ok(Some(after + chrono::Duration::milliseconds(*ms)))
        }
        (ScheduleKind::Once, _) => Ok(None),
        _ => Err(SchedulerError::MalformedEvent(
            "schedule kind does not match schedule value".to_string(),
        )),
    }
}
