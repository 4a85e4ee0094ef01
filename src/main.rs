use clap::Parser;
use library_catalog::configs::{self, AppConfig, SetupError, StoreKind};
use library_catalog::item::repo::{DieselRepository, MemoryRepository, Store};
use library_catalog::web::{self, AppState};
use library_catalog::LocalClock;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "library-server", version, about = "Library catalog REST server")]
struct Args {
    /// 바인딩 할 주소
    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// 사용할 저장소
    #[arg(long, value_enum)]
    store: Option<StoreKind>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    configs::load_dotenv();

    let _guard = match configs::set_global_logging_config() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args).await {
        error!("서버를 실행 할 수 없습니다. {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), SetupError> {
    let config = configs::load_config()?.overridden(args.bind, args.port, args.store);

    match config.store() {
        StoreKind::Postgres => {
            let pool = configs::connect_to_postgres(&config)?;
            serve(&config, DieselRepository::new(pool)).await
        }
        StoreKind::Memory => serve(&config, MemoryRepository::new()).await,
    }
}

async fn serve<S: Store>(config: &AppConfig, store: S) -> Result<(), SetupError> {
    let app = web::router(AppState::new(store, Arc::new(LocalClock)));
    let addr = format!("{}:{}", config.bind(), config.port());

    let listener = TcpListener::bind(&addr).await?;
    info!(store = ?config.store(), "도서 관리 서버가 시작 되었습니다. ({})", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
