use serde::Deserialize;
use std::env;

const DEV_JWT_SECRET: &str = "dev-secret-only-for-local-testing";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: String,
    pub jwt_secret: String,
    pub jwt_expires_in_seconds: i64,
    /// Key required to self-register with the admin role. Admin registration is
    /// disabled when unset.
    pub admin_registration_key: Option<String>,
    pub upload_dir: String,
    pub public_url: String,
    pub port: u16,
    /// `username:password` for Basic auth on /metrics
    pub metrics_auth: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "coursemaster".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                DEV_JWT_SECRET.to_string()
            }
        };

        let jwt_expires_in_seconds = settings
            .get_int("auth.jwt_expires_in_seconds")
            .ok()
            .or_else(|| {
                env::var("JWT_EXPIRE_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
            })
            .unwrap_or(7 * 24 * 3600);

        let admin_registration_key = settings
            .get_string("auth.admin_registration_key")
            .or_else(|_| env::var("ADMIN_REGISTRATION_KEY"))
            .ok()
            .filter(|key| !key.is_empty());

        let upload_dir = settings
            .get_string("uploads.dir")
            .or_else(|_| env::var("UPLOAD_DIR"))
            .unwrap_or_else(|_| "./uploads".to_string());

        let public_url = settings
            .get_string("server.public_url")
            .or_else(|_| env::var("PUBLIC_URL"))
            .unwrap_or_else(|_| "http://localhost:5000".to_string());

        let port = settings
            .get_int("server.port")
            .ok()
            .or_else(|| env::var("PORT").ok().and_then(|v| v.parse::<i64>().ok()))
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(5000);

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| "admin:changeme".to_string());

        Ok(Config {
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            jwt_expires_in_seconds,
            admin_registration_key,
            upload_dir,
            public_url: public_url.trim_end_matches('/').to_string(),
            port,
            metrics_auth,
        })
    }
}
