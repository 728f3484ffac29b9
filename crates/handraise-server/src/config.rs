use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

use handraise_db::{Credentials, Database, ServiceAccount};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SQLITE_PATH: &str = "handraise.db";

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub debug: bool,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Backend {
    Firebase {
        db_url: String,
        service_account_file: Option<PathBuf>,
        /// Legacy database secret.
        db_secret: Option<String>,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HANDRAISE_HOST").unwrap_or_else(|| DEFAULT_HOST.into());

        // Hosting platforms inject PORT; it wins over our own variable.
        let port = match var("PORT").or_else(|| var("HANDRAISE_PORT")) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid port {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        let backend = match var("HANDRAISE_BACKEND").as_deref().unwrap_or("firebase") {
            "firebase" => Backend::Firebase {
                db_url: var("DB_URL").context("DB_URL is required for the firebase backend")?,
                service_account_file: var("SERVICE_ACCOUNT_FILE").map(PathBuf::from),
                db_secret: var("HANDRAISE_DB_SECRET"),
            },
            "sqlite" => Backend::Sqlite {
                path: var("HANDRAISE_SQLITE_PATH")
                    .unwrap_or_else(|| DEFAULT_SQLITE_PATH.into())
                    .into(),
            },
            other => bail!("Unknown HANDRAISE_BACKEND {other:?} (expected firebase or sqlite)"),
        };

        let debug = match var("HANDRAISE_DEBUG").as_deref() {
            None | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => bail!("Invalid HANDRAISE_DEBUG {other:?}"),
        };

        Ok(Self {
            host,
            port,
            backend,
            debug,
            jwt_secret: var("HANDRAISE_JWT_SECRET"),
        })
    }

    pub fn open_database(&self) -> Result<Database> {
        match &self.backend {
            Backend::Firebase {
                db_url,
                service_account_file,
                db_secret,
            } => {
                let credentials = match (service_account_file, db_secret) {
                    (Some(file), _) => Credentials::ServiceAccount(ServiceAccount::from_file(file)?),
                    (None, Some(secret)) => Credentials::DatabaseSecret(secret.clone()),
                    (None, None) => {
                        warn!("No Firebase credentials configured; requests are unauthenticated");
                        Credentials::Anonymous
                    }
                };
                Database::firebase(db_url, credentials)
            }
            Backend::Sqlite { path } => Database::open_sqlite(path),
        }
    }
}
