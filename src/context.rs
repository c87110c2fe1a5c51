//! Application context opened before a worker is built.
//!
//! Names the application and environment (they end up in the log file
//! name) and holds the database connection, if one is configured for the
//! requested connection name.

use crate::config::Config;
use crate::db::Db;
use crate::error::Result;
use secrecy::ExposeSecret;
use tracing::info;

pub struct AppContext {
    pub application: String,
    pub environment: String,
    pub connection: String,
    db: Option<Db>,
}

impl AppContext {
    /// A context without a database.
    pub fn new(application: &str, environment: &str) -> Self {
        Self {
            application: application.to_string(),
            environment: environment.to_string(),
            connection: String::new(),
            db: None,
        }
    }

    /// Open the context, connecting and health-checking the database when
    /// `connection` has a URL configured.
    pub async fn open(
        config: &Config,
        application: &str,
        environment: &str,
        connection: &str,
    ) -> Result<Self> {
        let db = match config.database_url_for(connection) {
            Some(url) => {
                let db = Db::connect(url.expose_secret()).await?;
                db.health_check().await?;
                info!(connection, "database connection opened");
                Some(db)
            }
            None => {
                info!(connection, "no database configured for connection");
                None
            }
        };

        Ok(Self {
            application: application.to_string(),
            environment: environment.to_string(),
            connection: connection.to_string(),
            db,
        })
    }

    pub fn db(&self) -> Option<&Db> {
        self.db.as_ref()
    }
}
