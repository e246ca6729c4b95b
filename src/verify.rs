//! # Verification loop
//! Drives one [`VerificationTask`] from POLLING to exactly one outcome.
//!
//! Probes happen immediately and then on every interval boundary measured
//! from the publish moment; the SLA deadline (publish + threshold) is armed
//! once. A probe and a tick landing on the deadline instant still get their
//! probe before the deadline is honoured.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::checks::EndpointCheck;
use crate::model::{Interval, PublishMetric, VerificationTask};

/// `[(n-1) * interval, n * interval]`; a first-probe success reports the first window.
pub fn observed_interval(probe_nr: u64, interval: Duration) -> Interval {
    let n = probe_nr.max(1);
    let secs = interval.as_secs();
    Interval {
        lower: (n - 1) * secs,
        upper: n * secs,
    }
}

/// Run `task` against `check` until success or deadline, then send the
/// outcome on `results`.
pub async fn run_verification(
    task: VerificationTask,
    check: Arc<dyn EndpointCheck>,
    results: UnboundedSender<PublishMetric>,
) {
    let outcome = verify(task, check.as_ref()).await;
    counter!(
        "verification_outcomes_total",
        "alias" => outcome.metric_alias.clone(),
        "platform" => outcome.platform.clone(),
        "result" => outcome.result_label()
    )
    .increment(1);
    if results.send(outcome).is_err() {
        tracing::warn!("result stream closed; outcome dropped");
    }
}

/// The state machine itself; returns the single terminal outcome.
pub async fn verify(task: VerificationTask, check: &dyn EndpointCheck) -> PublishMetric {
    let interval = task.check_interval();
    let interval_secs = interval.as_secs();

    // Re-anchor the wall-clock publish moment and deadline onto the monotonic clock.
    let wall = Utc::now();
    let elapsed = (wall - task.publish_timestamp)
        .to_std()
        .unwrap_or(Duration::ZERO);
    let until_sla = (task.deadline() - wall).to_std().unwrap_or(Duration::ZERO);
    let now = Instant::now();
    let anchor = now.checked_sub(elapsed).unwrap_or(now);
    let deadline = now + until_sla;

    let mut probe_nr = elapsed.as_secs() / interval_secs;
    let first_tick = anchor + Duration::from_secs(interval_secs.saturating_mul(probe_nr + 1));
    let mut ticker = time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let sla = time::sleep_until(deadline);
    tokio::pin!(sla);

    tracing::debug!(
        uuid = %task.content_id,
        tid = %task.transaction_id,
        platform = %task.platform,
        alias = %task.metric().alias,
        check = check.name(),
        elapsed_intervals = probe_nr,
        "verification started"
    );

    loop {
        let result = check.is_finished(&task).await;
        if result.finished {
            let window = observed_interval(probe_nr, interval);
            tracing::debug!(uuid = %task.content_id, platform = %task.platform, ?window, "visible");
            return task.into_outcome(true, window, false);
        }
        if result.skip {
            tracing::debug!(
                uuid = %task.content_id,
                tid = %task.transaction_id,
                "newer publish observed; probe inconclusive"
            );
        }
        let superseded = result.skip;

        tokio::select! {
            biased;
            _ = ticker.tick() => probe_nr += 1,
            _ = &mut sla => {
                tracing::debug!(uuid = %task.content_id, platform = %task.platform, superseded, "SLA exhausted");
                return task.into_outcome(false, Interval::default(), superseded);
            }
        }
    }
}
