//! Auto-refresh scheduling policy (§4.3).
//!
//! `{enabled, time, timezone, interval}`: on startup, if enabled and the
//! current wall-clock time in the configured timezone is past today's
//! scheduled time and the previous `LastUpdated` predates the window, an
//! incremental update is triggered silently.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::parse_hh_mm;
use crate::error::ShowVaultError;
use crate::types::RefreshIntervalSer;
use crate::Res;

pub struct AutoRefreshConfig {
    pub enabled: bool,
    pub time: String,
    pub timezone: String,
    pub interval: RefreshIntervalSer,
}

/// Returns whether a refresh should trigger right now, given the previous
/// `LastUpdated` instant (`None` means "never updated" -> always due once
/// past today's scheduled time).
pub fn is_due(cfg: &AutoRefreshConfig, last_updated: Option<DateTime<Utc>>) -> Res<bool> {
    is_due_at(Utc::now(), cfg, last_updated)
}

fn is_due_at(
    now: DateTime<Utc>,
    cfg: &AutoRefreshConfig,
    last_updated: Option<DateTime<Utc>>,
) -> Res<bool> {
    if !cfg.enabled {
        return Ok(false);
    }

    let tz: Tz = cfg
        .timezone
        .parse()
        .map_err(|_| ShowVaultError::ConfigInvalid(format!("unknown timezone {}", cfg.timezone)))?;
    let (hour, minute) = parse_hh_mm(&cfg.time)?;

    let now_local = now.with_timezone(&tz);
    let scheduled_today = tz
        .with_ymd_and_hms(now_local.year(), now_local.month(), now_local.day(), hour, minute, 0)
        .single()
        .ok_or_else(|| ShowVaultError::ConfigInvalid("ambiguous local scheduled time".into()))?;

    if now_local < scheduled_today {
        return Ok(false);
    }

    let Some(last_updated) = last_updated else {
        return Ok(true);
    };

    let due = match cfg.interval {
        RefreshIntervalSer::Daily => last_updated.with_timezone(&tz) < scheduled_today,
        RefreshIntervalSer::Weekly => now - last_updated > chrono::Duration::days(7),
    };
    Ok(due)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AutoRefreshConfig {
        AutoRefreshConfig {
            enabled: true,
            time: "05:00".into(),
            timezone: "America/New_York".into(),
            interval: RefreshIntervalSer::Daily,
        }
    }

    fn et(s: &str) -> DateTime<Utc> {
        let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let tz: Tz = "America/New_York".parse().unwrap();
        tz.from_local_datetime(&naive).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn disabled_policy_never_triggers() {
        let mut c = cfg();
        c.enabled = false;
        assert!(!is_due_at(et("2026-02-05T05:30:00"), &c, None).unwrap());
    }

    #[test]
    fn spec_scenario_triggers_after_scheduled_time() {
        let c = cfg();
        let last_updated = et("2026-02-04T04:00:00");
        let now = et("2026-02-05T05:30:00");
        assert!(is_due_at(now, &c, Some(last_updated)).unwrap());
    }

    #[test]
    fn spec_scenario_does_not_trigger_before_scheduled_time() {
        let c = cfg();
        let last_updated = et("2026-02-04T04:00:00");
        let now = et("2026-02-05T04:30:00");
        assert!(!is_due_at(now, &c, Some(last_updated)).unwrap());
    }

    #[test]
    fn weekly_interval_gates_on_seven_days() {
        let mut c = cfg();
        c.interval = RefreshIntervalSer::Weekly;
        let now = et("2026-02-05T06:00:00");
        let recent = now - chrono::Duration::days(2);
        let old = now - chrono::Duration::days(8);
        assert!(!is_due_at(now, &c, Some(recent)).unwrap());
        assert!(is_due_at(now, &c, Some(old)).unwrap());
    }
}
