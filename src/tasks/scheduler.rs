use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::tasks::reconciliation;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let period = Duration::from_secs(state.settings().evaluation().reconcile_interval_seconds);

    tracing::info!(
        interval_seconds = period.as_secs(),
        grace_seconds = state.settings().evaluation().orphan_grace_seconds,
        purge_enabled = state.settings().evaluation().orphan_purge_enabled,
        "Reconciliation worker started"
    );

    let handle = tokio::spawn(reconcile_loop(state, period, shutdown_rx));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    if let Err(err) = handle.await {
        tracing::error!(error = %err, "Background task join failed");
    }

    Ok(())
}

async fn reconcile_loop(state: AppState, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = reconciliation::reconcile_orphans(&state).await {
                    tracing::error!(error = %err, "reconcile_orphans failed");
                }
            }
        }
    }
}
