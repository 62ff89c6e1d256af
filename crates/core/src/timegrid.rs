use serde::{Deserialize, Serialize};

/// Calendar grid of a run: how virtual minutes map onto working days.
///
/// Day numbering starts at 1; the hour is the fraction of the working
/// day already elapsed, so minute 150 of an 8-hour day is `D1 2.5h`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeMapping {
    pub minutes_per_day: f64,
    pub total_days: u32,
    pub total_minutes: f64,
    pub work_hours_per_day: u32,
}

impl TimeMapping {
    pub fn from_schedule(work_hours_per_day: u32, work_days_per_month: u32) -> Self {
        let minutes_per_day = f64::from(work_hours_per_day) * 60.0;
        Self {
            minutes_per_day,
            total_days: work_days_per_month,
            total_minutes: minutes_per_day * f64::from(work_days_per_month),
            work_hours_per_day,
        }
    }

    /// Splits a virtual-minute timestamp into (day, hour-of-day).
    pub fn day_hour(&self, minutes: f64) -> (u32, f64) {
        let day = (minutes / self.minutes_per_day).floor() as u32 + 1;
        let hour = (minutes % self.minutes_per_day) / 60.0;
        (day, hour)
    }

    /// `D{day} {hour:.1}h` rendering used by the report.
    pub fn format(&self, minutes: f64) -> String {
        let (day, hour) = self.day_hour(minutes);
        format!("D{day} {hour:.1}h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_hour_split() {
        let grid = TimeMapping::from_schedule(8, 22);
        assert_eq!(grid.day_hour(0.0), (1, 0.0));
        assert_eq!(grid.day_hour(150.0), (1, 2.5));
        assert_eq!(grid.day_hour(600.0), (2, 2.0));
    }

    #[test]
    fn formatting() {
        let grid = TimeMapping::from_schedule(8, 22);
        assert_eq!(grid.format(150.0), "D1 2.5h");
        assert_eq!(grid.format(600.0), "D2 2.0h");
    }

    #[test]
    fn totals() {
        let grid = TimeMapping::from_schedule(1, 2);
        assert_eq!(grid.total_minutes, 120.0);
        assert_eq!(grid.minutes_per_day, 60.0);
    }
}
