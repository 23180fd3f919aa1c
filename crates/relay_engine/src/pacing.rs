//! Named waits used by the processing loop and the bridge.
//!
//! Every suspension goes through `tokio::time`, so tests running with a paused
//! clock advance through them instantly.

use std::time::Duration;

use engine_logging::engine_debug;
use rand::Rng;
use relay_core::Settings;

/// Randomized gap between two items, wider in drip-feed mode.
pub fn inter_item_delay<R: Rng + ?Sized>(settings: &Settings, rng: &mut R) -> Duration {
    let (lo, hi) = settings.pacing.window(settings.drip_feed);
    if lo == hi {
        return lo;
    }
    let ms = rng.gen_range(lo.as_millis() as u64..=hi.as_millis() as u64);
    Duration::from_millis(ms)
}

pub async fn pace_between_items(delay: Duration) {
    engine_debug!("Pacing {:?} before next item", delay);
    tokio::time::sleep(delay).await;
}

pub async fn wait_for_retry(delay: Duration) {
    engine_debug!("Backing off {:?} before retry", delay);
    tokio::time::sleep(delay).await;
}

/// Gives a freshly injected agent time to register its listeners.
pub async fn handshake_grace(grace: Duration) {
    tokio::time::sleep(grace).await;
}
