use crate::item::RepositoryError;
use crate::item::repo::DbPool;
use diesel::r2d2::ConnectionManager;
use diesel::PgConnection;
use r2d2::Pool;
use serde::Deserialize;
use std::env;
use tracing_appender::non_blocking::WorkerGuard;

pub mod logging;

/// 서버 초기화 중 발생 하는 에러
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("logging setup error: {0}")]
    Logging(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 사용할 저장소 종류
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,

    /// 프로세스 메모리. 서버 종료시 모든 데이터가 삭제 된다.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    bind: String,
    port: u16,
    database_url: Option<String>,
    pool_size: u32,
    store: StoreKind,
}

impl AppConfig {
    pub fn bind(&self) -> &str {
        &self.bind
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    pub fn store(&self) -> StoreKind {
        self.store
    }

    /// 커맨드 라인 인자로 전달된 값으로 설정을 덮어 쓴다.
    pub fn overridden(mut self, bind: Option<String>, port: Option<u16>, store: Option<StoreKind>) -> Self {
        if let Some(bind) = bind {
            self.bind = bind;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(store) = store {
            self.store = store;
        }
        self
    }
}

/// 실행 환경에 따라 .env 파일을 로드한다.
pub fn load_dotenv() {
    let env_filename = env::var("RUN_MODE")
        .map(|env| format!(".env.{}", env))
        .unwrap_or_else(|_| ".env".into());

    dotenvy::from_filename(env_filename).ok();
}

/// 설정을 로드한다.
///
/// `config/{RUN_MODE}` 파일(없어도 됨) 위에 `LIBRARY_` 접두어의 환경 변수를 덮어 쓴다.
pub fn load_config() -> Result<AppConfig, config::ConfigError> {
    let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
    let config = config::Config::builder()
        .set_default("bind", "0.0.0.0")?
        .set_default("port", 8000)?
        .set_default("pool_size", 10)?
        .set_default("store", "postgres")?
        .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
        .add_source(config::Environment::with_prefix("LIBRARY").try_parsing(true))
        .build()?;

    config.try_deserialize()
}

/// 데이터베이스 연결 풀을 생성한다.
pub fn connect_to_postgres(c: &AppConfig) -> Result<DbPool, SetupError> {
    let database_url = c.database_url()
        .ok_or_else(|| config::ConfigError::NotFound("database_url".to_owned()))?;
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    let pool = Pool::builder()
        .test_on_check_out(true)
        .max_size(c.pool_size())
        .build(manager)
        .map_err(RepositoryError::from)?;
    Ok(pool)
}

/// 프로그램에서 사용할 로깅 옵션을 설정한다.
///
/// `LOGGER_DIR`이 설정 되지 않았다면 stdout 으로만 로그를 출력하며 `None`을 반환한다.
/// 반환된 [`WorkerGuard`]가 삭제 되면 파일 로그는 더 이상 기록 되지 않는다.
pub fn set_global_logging_config() -> Result<Option<WorkerGuard>, SetupError> {
    let Ok(dir) = env::var("LOGGER_DIR") else {
        logging::set_stdout_logging_config()?;
        return Ok(None);
    };
    let name = env::var("LOGGER_FILE_NAME").unwrap_or_else(|_| "library-catalog".into());

    let keep = match env::var("LOGGER_KEEP") {
        Ok(v) => Some(v.parse::<usize>()
            .map_err(|e| SetupError::Logging(format!("LOGGER_KEEP: {}", e)))?),
        Err(_) => None,
    };
    let level = env::var("LOGGER_LEVEL").ok();
    let rotation = env::var("LOGGER_ROTATION").ok();

    let options = logging::Config {
        dir,
        name,
        keep,
        level,
        rotation,
    };

    logging::set_global_logging_config(&options).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_values_override_config() {
        let config = AppConfig {
            bind: "0.0.0.0".to_owned(),
            port: 8000,
            database_url: None,
            pool_size: 10,
            store: StoreKind::Postgres,
        };

        let config = config.overridden(None, Some(9000), Some(StoreKind::Memory));
        assert_eq!(config.bind(), "0.0.0.0");
        assert_eq!(config.port(), 9000);
        assert_eq!(config.store(), StoreKind::Memory);
        assert!(matches!(connect_to_postgres(&config), Err(SetupError::Config(_))));
    }
}
