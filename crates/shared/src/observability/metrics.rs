//! Prometheus 指标模块
//!
//! 基于 metrics facade 与 metrics-exporter-prometheus，指标通过独立端口的 `/metrics` 暴露。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 安装 Prometheus recorder 并启动指标 HTTP 服务器
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    describe_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册指标描述（出现在 /metrics 的 HELP 注释中）
fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "codeguard_validations_total",
        "Validation pipeline invocations by status, error code and mode"
    );
    metrics::describe_histogram!(
        "codeguard_validation_duration_seconds",
        "Validation pipeline duration in seconds"
    );
    metrics::describe_counter!(
        "codeguard_lock_acquire_failures_total",
        "Redemption lock acquisitions that failed after retries"
    );
    metrics::describe_counter!(
        "codeguard_project_cache_requests_total",
        "Project rule cache lookups by result"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    }))
}

/// 全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一次校验管线调用
///
/// `status` 为 ok / ko，`error_code` 在成功时为 "none"，`mode` 为 live / dry_run / sandbox。
#[inline]
pub fn record_validation(status: &str, error_code: &str, mode: &str, duration_secs: f64) {
    metrics::counter!(
        "codeguard_validations_total",
        "status" => status.to_string(),
        "error_code" => error_code.to_string(),
        "mode" => mode.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "codeguard_validation_duration_seconds",
        "status" => status.to_string(),
        "mode" => mode.to_string()
    )
    .record(duration_secs);
}

/// 记录兑换锁获取失败
#[inline]
pub fn record_lock_failure() {
    metrics::counter!("codeguard_lock_acquire_failures_total").increment(1);
}

/// 记录项目缓存查询结果（hit / miss / error）
#[inline]
pub fn record_project_cache(result: &str) {
    metrics::counter!(
        "codeguard_project_cache_requests_total",
        "result" => result.to_string()
    )
    .increment(1);
}
