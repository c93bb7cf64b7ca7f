use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryIssueReporter};
use crate::routes::with_eligibility_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use scheme_eligibility::config::AppConfig;
use scheme_eligibility::eligibility::{
    apply_drafts, EligibilityService, InMemoryRuleRepository, RuleCsvImporter,
};
use scheme_eligibility::error::AppError;
use scheme_eligibility::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(path) = args.rules_csv.take() {
        config.rules.seed_csv = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let issues = Arc::new(InMemoryIssueReporter::default());
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        issues: issues.clone(),
    };

    let repository = Arc::new(InMemoryRuleRepository::default());
    let service = Arc::new(EligibilityService::new(
        repository,
        issues,
        config.rules.cache_capacity,
    ));

    if let Some(path) = &config.rules.seed_csv {
        let drafts = RuleCsvImporter::from_path(path)?;
        let summary = apply_drafts(&service, drafts);
        for rejected in &summary.rejected {
            warn!(%rejected, "seed rule skipped");
        }
        info!(
            path = %path.display(),
            created = summary.created,
            revised = summary.revised,
            "rule sheet seeded"
        );
    }

    let app = with_eligibility_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        cache_capacity = config.rules.cache_capacity,
        "scheme eligibility service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
