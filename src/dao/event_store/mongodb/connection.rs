use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::{debug, info};

use super::error::{MongoDaoError, MongoResult};

const PING_ATTEMPTS: u32 = 5;
const FIRST_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Delays slept between failed pings: doubling from [`FIRST_DELAY`], capped at [`MAX_DELAY`].
fn ping_delays() -> impl Iterator<Item = Duration> {
    std::iter::successors(Some(FIRST_DELAY), |delay| Some((*delay * 2).min(MAX_DELAY)))
}

pub(super) async fn ping(database: &Database) -> Result<(), mongodb::error::Error> {
    database.run_command(doc! { "ping": 1 }).await.map(drop)
}

/// Build a client for `database_name` and hold until the server answers a ping.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::Client { source })?;
    let database = client.database(database_name);

    let mut delays = ping_delays();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match ping(&database).await {
            Ok(()) => break,
            Err(source) if attempts >= PING_ATTEMPTS => {
                return Err(MongoDaoError::Unreachable { attempts, source });
            }
            Err(err) => {
                let delay = delays.next().unwrap_or(MAX_DELAY);
                debug!(attempts, ?delay, error = %err, "MongoDB ping failed");
                sleep(delay).await;
            }
        }
    }

    info!(database = database_name, attempts, "MongoDB reachable");
    Ok((client, database))
}
