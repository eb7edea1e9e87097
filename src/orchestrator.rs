//! Conversion orchestrator: the selection-to-delivery sequence for one job.
//!
//! ## Sequence
//!
//! ```text
//! selection payload
//!  │
//!  ├─ 1. Decode     defensive parse of the callback payload
//!  ├─ 2. Claim      try_begin_conversion — the only race-sensitive step
//!  ├─ 3. Fetch      read the source artifact from the store
//!  ├─ 4. Convert    codec dispatch (CPU-bound, spawn_blocking)
//!  ├─ 5. Deliver    converted document (+ downgrade notice if any)
//!  └─ 6. Finish     terminal state + release_all + chat reset — ALWAYS
//! ```
//!
//! Steps 3–5 all funnel into [`finish_job`], whatever happens: success,
//! corrupt input, encoder gap, or a delivery failure. Guaranteed release is
//! structural — there is exactly one exit — not a convention each branch must
//! remember.

use crate::error::Img2AnyError;
use crate::payload::{self, FormatSelection};
use crate::registry::{JobId, JobOutcome};
use crate::router::Router;
use crate::store::Role;
use crate::transport::ChatRef;
use tracing::{debug, info, warn};

/// Handle one selection event to completion.
///
/// Replies go to the chat the event came from until a job is claimed; after
/// that, to the job's own delivery handle (they are the same chat in any
/// well-behaved transport, but the job's handle is authoritative).
pub(crate) async fn handle_selection(router: &Router, chat: &ChatRef, raw_payload: &str) {
    // ── Step 1: Decode the payload ───────────────────────────────────────
    let selection = match payload::decode(raw_payload) {
        Ok(sel) => sel,
        Err(err) => {
            warn!(%chat, error = %err, "rejected selection payload");
            router
                .reply(chat, "That button doesn't look right. Send the image again to restart.")
                .await;
            return;
        }
    };
    let FormatSelection { job_id, target } = selection;

    // ── Step 2: Claim the job ────────────────────────────────────────────
    // Atomic AwaitingSelection → Converting. Losing here is normal traffic:
    // double-taps, transport retries, or selections for expired jobs.
    if !router.registry.try_begin_conversion(job_id) {
        debug!(%chat, %job_id, "selection refused: job unknown, claimed, or expired");
        router
            .reply(chat, &Img2AnyError::UnknownOrExpiredJob.to_string())
            .await;
        return;
    }

    let Some(job) = router.registry.get(job_id) else {
        // Claimed a job that vanished before we could read it back — only
        // possible if complete() raced us, which try_begin should prevent.
        warn!(%job_id, "claimed job missing from registry");
        return;
    };
    info!(%job_id, chat = %job.chat, source = %job.source_format, %target, "conversion started");

    // ── Step 3: Fetch the source artifact ────────────────────────────────
    let source_bytes = match router.store.read(job_id, Role::Source).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%job_id, error = %err, "source artifact unavailable");
            router
                .reply(&job.chat, "Your upload is no longer available. Please send it again.")
                .await;
            finish_job(router, &job.chat, job_id, JobOutcome::Failed).await;
            return;
        }
    };

    // ── Step 4: Convert (CPU-bound) ──────────────────────────────────────
    let source_format = job.source_format;
    let jpeg_quality = router.config.jpeg_quality;
    let converted = tokio::task::spawn_blocking(move || {
        crate::codec::convert(&source_bytes, source_format, target, jpeg_quality)
    })
    .await
    .unwrap_or_else(|e| Err(Img2AnyError::Internal(format!("codec task panicked: {e}"))));

    let converted = match converted {
        Ok(c) => c,
        Err(err) => {
            warn!(%job_id, error = %err, "conversion failed");
            let msg = if err.is_user_facing() {
                err.to_string()
            } else {
                "Something went wrong during the conversion. Please try again.".to_string()
            };
            router.reply(&job.chat, &msg).await;
            finish_job(router, &job.chat, job_id, JobOutcome::Failed).await;
            return;
        }
    };

    // Persist the output alongside the source; both live under the job key
    // and are released together.
    if let Err(err) = router
        .store
        .put(job_id, Role::Output, &converted.bytes)
        .await
    {
        warn!(%job_id, error = %err, "failed to persist converted output");
    }

    // ── Step 5: Deliver ──────────────────────────────────────────────────
    // The substitution is surfaced before the document so the user knows
    // what they are about to receive.
    if converted.downgraded {
        router
            .reply(
                &job.chat,
                &format!(
                    "No {} encoder is available — delivering {} instead.",
                    target.token().to_uppercase(),
                    converted.produced.extension().to_uppercase()
                ),
            )
            .await;
    }

    let filename = format!("converted.{}", converted.produced.extension());
    let outcome = match router
        .sink
        .send_document(&job.chat, converted.bytes, &filename)
        .await
    {
        Ok(()) => {
            router
                .reply(&job.chat, "Conversion successful! Send another image any time.")
                .await;
            info!(%job_id, produced = %converted.produced, "delivered");
            JobOutcome::Delivered
        }
        Err(err) => {
            // Logged and finished as failed; never retried indefinitely —
            // an unbounded retry would hold the artifacts hostage.
            warn!(%job_id, error = %err, "delivery failed");
            JobOutcome::Failed
        }
    };

    // ── Step 6: Finish — the single exit ─────────────────────────────────
    finish_job(router, &job.chat, job_id, outcome).await;
}

/// The single terminal path: registry removal, artifact release, chat reset.
///
/// Safe to reach from any branch; every operation in here is idempotent.
async fn finish_job(router: &Router, chat: &ChatRef, job_id: JobId, outcome: JobOutcome) {
    router.registry.complete(job_id, outcome);
    router.store.release_all(job_id).await;
    router.chats.clear_if(chat, job_id);
    debug!(%job_id, ?outcome, "job finished and cleaned up");
}
