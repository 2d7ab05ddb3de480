use sqlx::postgres::PgConnectOptions;
use std::env;

const DEV_SECRET: &str = "film-catalog-local-development-secret";

/// AppConfig
///
/// The application's configuration, read once from the environment at startup and
/// immutable afterwards. Pulled into handlers and extractors via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Runtime environment marker. Controls log format and verbosity only.
    pub env: Env,
    /// HS256 secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    pub database: DatabaseConfig,
    /// Address the HTTP listener binds to.
    pub server_addr: String,
    pub bcrypt_cost: u32,
    /// Apply `migrations/` before serving.
    pub run_migrations: bool,
}

/// Env
///
/// The runtime context: `local` (pretty logs), `dev` and `prod` (JSON logs).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Dev,
    Production,
}

impl Env {
    fn parse(raw: &str) -> Self {
        match raw {
            "prod" | "production" => Env::Production,
            "dev" => Env::Dev,
            _ => Env::Local,
        }
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Env::Local | Env::Dev => "film_catalog=debug,tower_http=debug,axum=info",
            Env::Production => "film_catalog=info,tower_http=info",
        }
    }
}

/// DatabaseConfig
///
/// Connection parameters for PostgreSQL, read from the `DB_*` variables.
#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "film_library".to_string(),
        }
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration for tests. Uses the lowest bcrypt cost so hashing
    /// does not dominate test time.
    fn default() -> Self {
        Self {
            env: Env::Local,
            jwt_secret: DEV_SECRET.to_string(),
            database: DatabaseConfig::default(),
            server_addr: "127.0.0.1:0".to_string(),
            bcrypt_cost: 4,
            run_migrations: false,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables, failing fast.
    ///
    /// # Panics
    /// Panics when `SECRET_KEY` is missing in `prod`, or when `DB_PORT` or `BCRYPT_COST`
    /// are set but not numbers.
    pub fn load() -> Self {
        let env = Env::parse(&var_or("ENV", "local"));

        // The production secret is mandatory and must be explicitly set.
        let jwt_secret = match env {
            Env::Production => {
                env::var("SECRET_KEY").expect("FATAL: SECRET_KEY must be set in prod.")
            }
            Env::Local | Env::Dev => var_or("SECRET_KEY", DEV_SECRET),
        };

        let defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            host: var_or("DB_HOST", &defaults.host),
            port: env::var("DB_PORT")
                .map(|p| p.parse().expect("FATAL: DB_PORT must be a port number."))
                .unwrap_or(defaults.port),
            user: var_or("DB_USER", &defaults.user),
            password: var_or("DB_PASSWORD", &defaults.password),
            name: var_or("DB_NAME", &defaults.name),
        };

        let bcrypt_cost = env::var("BCRYPT_COST")
            .map(|c| c.parse().expect("FATAL: BCRYPT_COST must be a number."))
            .unwrap_or(bcrypt::DEFAULT_COST);

        Self {
            env,
            jwt_secret,
            database,
            server_addr: var_or("SERVER_ADDR", "0.0.0.0:8080"),
            bcrypt_cost,
            run_migrations: var_or("RUN_MIGRATIONS", "false") == "true",
        }
    }
}
