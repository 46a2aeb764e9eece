//! Capability normalization.
//!
//! In comparative experiments, a policy on faster hardware or a cheaper
//! model would win ties purely on latency or verbosity. Normalization
//! levels the field: every decide call waits out a per-policy latency
//! floor, and emitted responses are capped to a per-policy token budget.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Wait until at least `floor` has elapsed since `started`.
///
/// A call that already took longer than the floor continues immediately.
pub async fn enforce_latency_floor(started: Instant, floor: Duration) {
    let elapsed = started.elapsed();
    if elapsed < floor {
        let remaining = floor - elapsed;
        trace!(?remaining, "Latency floor wait");
        tokio::time::sleep(remaining).await;
    }
}

/// Cap a response at `max_tokens` whitespace-delimited tokens.
///
/// The API-side `max_tokens` parameter already bounds generation; this is
/// the belt to that suspender for backends that ignore it.
pub fn cap_tokens(text: &str, max_tokens: u32) -> String {
    let max = max_tokens as usize;
    let mut end = 0;
    let mut count = 0;
    let mut in_token = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_token = false;
        } else {
            if !in_token {
                count += 1;
                if count > max {
                    break;
                }
            }
            in_token = true;
            end = i + c.len_utf8();
        }
    }
    if count > max {
        text[..end].to_owned()
    } else {
        text.to_owned()
    }
}
