use std::env;

/// Database configuration.
///
/// Reads from the `PLANWISE_DATABASE_URL` environment variable, falling back
/// to `postgresql://localhost:5432/planwise` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/planwise";

    /// Default pool size, matching the connection limit the service was
    /// sized for.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    /// Build a config from the environment.
    ///
    /// Priority: `PLANWISE_DATABASE_URL` env var, then the compile-time default.
    pub fn from_env() -> Self {
        let database_url = env::var("PLANWISE_DATABASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self::new(database_url)
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Override the pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Extract the database name from the URL.
    ///
    /// Returns `None` if the URL has no path component. Query parameters
    /// (`?sslmode=...`) are not part of the name.
    pub fn database_name(&self) -> Option<&str> {
        self.database_url
            .rsplit('/')
            .next()
            .map(|s| s.split('?').next().unwrap_or(s))
            .filter(|s| !s.is_empty() && !s.contains(':') && !s.contains('@'))
    }

    /// Return a URL pointing at the `postgres` maintenance database on the
    /// same host. Used to issue `CREATE DATABASE` when the target DB does not
    /// yet exist.
    pub fn maintenance_url(&self) -> String {
        match self.database_url.rfind('/') {
            Some(pos) => {
                let mut url = self.database_url[..pos].to_owned();
                url.push_str("/postgres");
                url
            }
            None => self.database_url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
