use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Pings tried before giving up. The storage supervisor retries whole
/// connections with its own backoff, so this stays short.
const PING_ATTEMPTS: u32 = 3;
const PING_RETRY_DELAY: Duration = Duration::from_millis(500);
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a client for the trivia database and wait until the server answers a ping.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let mut options = config.options.clone();
    if options.server_selection_timeout.is_none() {
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
    }

    let client = Client::with_options(options)
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempt = 1;
    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                info!(database = %config.database_name, attempt, "connected to MongoDB");
                return Ok((client, database));
            }
            Err(source) if attempt >= PING_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                warn!(
                    database = %config.database_name,
                    attempt,
                    error = %err,
                    "MongoDB ping failed; retrying"
                );
                sleep(PING_RETRY_DELAY * attempt).await;
                attempt += 1;
            }
        }
    }
}
