use crate::config::Config;
use crate::middlewares::auth::JwtService;
use mongodb::{Client as MongoClient, Database};
use redis::aio::MultiplexedConnection;
use std::time::Duration;

use self::upload_service::UploadStorage;

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    /// Connections are opened on demand; the API keeps serving when Redis is down.
    pub redis: redis::Client,
    pub jwt: JwtService,
    pub uploads: UploadStorage,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        let jwt = JwtService::new(&config.jwt_secret, config.jwt_expires_in_seconds);

        let uploads = UploadStorage::new(&config.upload_dir, &config.public_url);
        uploads.ensure_folders().await?;
        tracing::info!("Upload storage ready at {}", config.upload_dir);

        Ok(Self {
            config,
            mongo,
            redis: redis_client,
            jwt,
            uploads,
        })
    }

    pub async fn redis_connection(&self) -> anyhow::Result<MultiplexedConnection> {
        let conn = tokio::time::timeout(
            REDIS_CONNECT_TIMEOUT,
            self.redis.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 2s"))??;
        Ok(conn)
    }
}

pub mod admin_service;
pub mod assignment_service;
pub mod auth_service;
pub mod course_service;
pub mod enrollment_service;
pub mod indexes;
pub mod lookup;
pub mod quiz_service;
pub mod student_service;
pub mod upload_service;
