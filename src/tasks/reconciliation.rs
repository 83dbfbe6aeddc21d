use anyhow::{Context, Result};
use time::{Duration, PrimitiveDateTime};

use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::repositories;

const ORPHAN_BATCH_LIMIT: i64 = 500;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ReconcileReport {
    pub(crate) orphaned: Vec<String>,
    pub(crate) purged: u64,
}

/// Finds evaluations left without answer evaluations by a failed second
/// write. Rows younger than the grace period are skipped so a submission
/// still in flight is never reported. Deletes them only when purging is on.
pub(crate) async fn reconcile_orphans(state: &AppState) -> Result<ReconcileReport> {
    let settings = state.settings().evaluation();
    let cutoff = orphan_cutoff(primitive_now_utc(), settings.orphan_grace_seconds);

    let orphans =
        repositories::evaluations::list_orphaned(state.db(), cutoff, ORPHAN_BATCH_LIMIT)
            .await
            .context("Failed to list orphaned evaluations")?;

    metrics::gauge!("orphaned_evaluations").set(orphans.len() as f64);

    if orphans.is_empty() {
        tracing::debug!("No orphaned evaluations found");
        return Ok(ReconcileReport::default());
    }

    for orphan in &orphans {
        tracing::warn!(
            evaluation_id = %orphan.id,
            application_id = %orphan.application_id,
            evaluator_id = %orphan.evaluator_id,
            created_at = %format_primitive(orphan.created_at),
            "Evaluation has no answer evaluations"
        );
    }

    let ids: Vec<String> = orphans.into_iter().map(|orphan| orphan.id).collect();

    let purged = if settings.orphan_purge_enabled {
        let deleted = repositories::evaluations::delete_orphaned(state.db(), &ids)
            .await
            .context("Failed to delete orphaned evaluations")?;
        metrics::counter!("orphaned_evaluations_purged_total").increment(deleted);
        tracing::info!(deleted, "Purged orphaned evaluations");
        deleted
    } else {
        0
    };

    Ok(ReconcileReport { orphaned: ids, purged })
}

fn orphan_cutoff(now: PrimitiveDateTime, grace_seconds: u64) -> PrimitiveDateTime {
    i64::try_from(grace_seconds)
        .ok()
        .and_then(|seconds| now.checked_sub(Duration::seconds(seconds)))
        .unwrap_or(PrimitiveDateTime::MIN)
}
