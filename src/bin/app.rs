use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use adapter::database::connect_database_with;
use anyhow::{Context, Result};
use api::route::v1;
use axum::Router;
use registry::AppRegistry;
use shared::config::AppConfig;
use shared::env::{which, Environment};
use tokio::net::TcpListener;
use tokio::time::sleep;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;
    bootstrap().await
}

fn init_logger() -> Result<()> {
    let log_level = match which() {
        Environment::Development => "debug",
        Environment::Production => "info",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into());

    let subscriber = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(subscriber)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

async fn bootstrap() -> Result<()> {
    let app_config = AppConfig::new()?;
    let tick_interval_secs = app_config.scheduler.tick_interval_secs;
    let pool = connect_database_with(&app_config.database);

    let registry = AppRegistry::new(pool, app_config);

    // 自動完了と送金解放はユーザー操作に紐づかないため、
    // バックグラウンドの定期実行で進める
    {
        let registry = registry.clone();
        tokio::spawn(async move {
            lifecycle_loop(registry, tick_interval_secs).await;
        });
    }

    let app = Router::new()
        .merge(v1::routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .with_state(registry);

    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 8080);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("Unexpected error happened in server")
        .inspect_err(|e| {
            tracing::error!(
                error.cause_chain = ?e,error.message = %e, "Unexpected error"
            )
        })
}

// 期限を迎えたレンタルの自動完了と送金解放を定期的に実行する。
// 1 回のパスの失敗は記録するだけで、ループ自体は止めない
async fn lifecycle_loop(registry: AppRegistry, tick_interval_secs: u64) {
    loop {
        let service = registry.rental_lifecycle_service();

        match service.run_auto_complete_pass().await {
            Ok(fired) if fired > 0 => {
                tracing::info!(fired, "返却未確認のレンタルを自動完了しました");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error.message = %e, "自動完了パスでエラーが発生しました");
            }
        }

        match service.run_payout_pass().await {
            Ok(settled) if settled > 0 => {
                tracing::info!(settled, "保留期間を過ぎたレンタルの送金を実行しました");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error.message = %e, "送金パスでエラーが発生しました");
            }
        }

        sleep(Duration::from_secs(tick_interval_secs)).await;
    }
}
