//! 码校验服务
//!
//! 提供码校验、兑换与兑换记录查询的 REST API。

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, http::HeaderValue, routing::get};
use code_validation::{
    CheckDigitRegistry, CustomCheckRunner, LedgerRepository, LockConfig, PipelineOrchestrator,
    ProjectRepository, ProjectRuleCache, RedemptionLedger, RedemptionQueryService,
    RedisLockManager,
    api::{AppState, build_router},
};
use codeguard_shared::{cache::Cache, config::AppConfig, database::Database, observability};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("code-validation-service")?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting code-validation-service on {}", config.server_addr());

    // 基础设施
    let db = Database::connect(&config.database).await?;
    sqlx::migrate!("./migrations").run(db.pool()).await?;
    let cache = Arc::new(Cache::new(&config.redis)?);

    let validation = &config.validation;

    // 存储与缓存
    let project_repo = Arc::new(ProjectRepository::new(db.pool().clone()));
    let ledger_repo = Arc::new(LedgerRepository::new(db.pool().clone()));
    let project_cache = Arc::new(ProjectRuleCache::new(
        cache.clone(),
        project_repo,
        validation.project_cache_ttl(),
    ));

    // Redis 锁，Redis 不可用时降级到数据库
    let lock_config = LockConfig::from(validation);
    let locks = Arc::new(
        RedisLockManager::new(cache.client().clone(), lock_config.clone())
            .with_database_fallback(db.pool().clone()),
    );

    let ledger = Arc::new(
        RedemptionLedger::new(ledger_repo.clone(), locks, lock_config.lease)
            .with_plain_codes(validation.store_plain_codes),
    );
    if validation.store_plain_codes {
        warn!("store_plain_codes is enabled, plaintext codes will be persisted");
    }

    let check_digits = CheckDigitRegistry::new(CustomCheckRunner::new(
        validation.custom_function_timeout(),
        validation.custom_function_max_steps,
    ));

    let pipeline = Arc::new(PipelineOrchestrator::new(
        project_cache.clone(),
        ledger,
        check_digits,
    ));
    let queries = Arc::new(RedemptionQueryService::new(ledger_repo));
    let state = AppState::new(pipeline, queries, project_cache);

    // CORS：CODEGUARD_CORS_ORIGINS 逗号分隔，"*" 表示全部放行
    let allowed_origins = std::env::var("CODEGUARD_CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
    let cors = if allowed_origins == "*" {
        if config.is_production() {
            warn!("CODEGUARD_CORS_ORIGINS=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        info!("CORS allowed_origins: {}", allowed_origins);
        let origins: Vec<_> = allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = build_router(state)
        .route(
            "/ready",
            get({
                let db = db.clone();
                let cache = cache.clone();
                move || readiness_check(db.clone(), cache.clone())
            }),
        )
        .layer(cors);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 就绪探针：检查数据库和 Redis 连接
async fn readiness_check(db: Database, cache: Arc<Cache>) -> Json<serde_json::Value> {
    let db_ok = db.health_check().await.is_ok();
    let cache_ok = cache.health_check().await.is_ok();

    Json(serde_json::json!({
        "status": if db_ok && cache_ok { "ok" } else { "degraded" },
        "service": "code-validation-service",
        "checks": {
            "database": if db_ok { "ok" } else { "fail" },
            "redis": if cache_ok { "ok" } else { "fail" }
        }
    }))
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
