// =============================================================================
// Daily Scan Scheduler
// =============================================================================
//
// A once-a-minute tick loop that fires each market's scan at its configured
// UTC hour:minute, at most once per day. Scans go through the same
// orchestrator entry point as API-triggered scans, so a manual scan already
// in flight makes the scheduled one a logged skip, not an error.
//
// Schedule times and the enable flag live in the runtime config and are
// re-read every tick, so edits take effect without a restart.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Timelike, Utc};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::scan::ScanError;
use crate::types::Market;

/// Run the scheduler loop forever. Spawn this once at startup.
pub async fn run_scheduler(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
    // Last UTC date each market's scheduled scan fired, so a minute-long tick
    // window cannot double-fire.
    let mut last_fired: HashMap<Market, NaiveDate> = HashMap::new();

    info!("scan scheduler running");

    loop {
        interval.tick().await;

        let (enabled, schedule) = {
            let cfg = state.runtime_config.read();
            (cfg.enable_scheduled_scans, cfg.schedule)
        };
        if !enabled {
            continue;
        }

        let now = Utc::now();
        for market in Market::ALL {
            let at = schedule.get(market);
            if now.hour() != at.hour || now.minute() != at.minute {
                continue;
            }
            if last_fired.get(&market) == Some(&now.date_naive()) {
                continue;
            }
            last_fired.insert(market, now.date_naive());

            match state.orchestrator.try_begin(market) {
                Ok(ticket) => {
                    info!(%market, "scheduled scan starting");
                    let task_state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = task_state.orchestrator.execute(ticket).await {
                            task_state.push_error(format!("scheduled scan {market} failed: {e}"));
                        }
                        task_state.increment_version();
                    });
                }
                Err(ScanError::AlreadyRunning(m)) => {
                    info!(market = %m, "scheduled scan skipped — scan already in flight");
                }
                Err(e) => {
                    warn!(%market, error = %e, "scheduled scan could not start");
                    state.push_error(format!("scheduled scan {market} rejected: {e}"));
                }
            }
        }
    }
}
