//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use crate::api::handlers::{admin, alerts, history, notifications, rates, system};

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "apr-gateway",
        description = "Aggregated APR/APY rates, history, trends and threshold alerts."
    ),
    paths(
        system::health_handler,
        system::sources_handler,
        rates::list_rates,
        rates::top_rates,
        rates::rates_by_symbol,
        rates::latest_rates,
        rates::latest_top,
        history::get_history,
        history::get_trend,
        alerts::list_alerts,
        alerts::create_alert,
        alerts::update_alert,
        alerts::delete_alert,
        notifications::list_notifications,
        notifications::update_notification,
        notifications::delete_notification,
        notifications::mark_all_read,
        admin::run_sync,
        admin::evaluate_alerts,
        admin::scheduler_status,
        admin::start_scheduler,
        admin::stop_scheduler,
    ),
    tags(
        (name = "System", description = "Health and configuration"),
        (name = "Rates", description = "Live and stored yield rates"),
        (name = "History", description = "Hourly APR history and trends"),
        (name = "Alerts", description = "Per-user APR threshold alerts"),
        (name = "Notifications", description = "Per-user alert inbox"),
        (name = "Admin", description = "Sync and scheduler control, cron secret required"),
    )
)]
pub struct ApiDoc;
