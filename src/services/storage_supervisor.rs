use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{event_store::EventStore, models::ContentBundle, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, seed the quiz content, then keep polling
/// its health. The shared state stays degraded while storage is unreachable.
pub async fn run<F, Fut>(state: SharedState, content: ContentBundle, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn EventStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let connected = match connect().await {
            Ok(store) => match store.seed(content.clone()).await {
                Ok(()) => Some(store),
                Err(err) => {
                    warn!(error = %err, "failed to seed quiz content");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                None
            }
        };

        let Some(store) = connected else {
            sleep(delay).await;
            delay = (delay * 2).min(MAX_DELAY);
            continue;
        };

        state.set_event_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        loop {
            sleep(HEALTH_POLL_INTERVAL).await;
            if store.health_check().await.is_ok() {
                continue;
            }

            let mut reconnect_delay = INITIAL_DELAY;
            let mut reconnected = false;

            for attempt in 0..MAX_RECONNECT_ATTEMPTS {
                match store.try_reconnect().await {
                    Ok(()) => {
                        info!(attempt, "storage reconnection succeeded after health check failure");
                        reconnected = true;
                        break;
                    }
                    Err(reconnect_err) => {
                        if attempt == 0 {
                            warn!(
                                attempt, error = %reconnect_err,
                                "storage reconnect first attempt failed; entering degraded mode"
                            );
                            state.clear_event_store().await;
                        } else {
                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                        }
                        sleep(reconnect_delay).await;
                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                    }
                }
            }

            if reconnected {
                state.set_event_store(store.clone()).await;
            } else {
                warn!("exhausted storage reconnect attempts; staying in degraded mode");
                state.clear_event_store().await;
                break;
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}
