//! Application startup and lifecycle management.
//!
//! Builds the store and collaborators from configuration, serves the HTTP API
//! and runs the reminder scheduler next to it until shutdown.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::{InvoicingConfig, StoreKind};
use crate::handlers;
use crate::scheduler::ReminderScheduler;
use crate::services::{
    ActivityPublisher, CustomerDirectory, HttpCustomerDirectory, HttpNotificationSender,
    InMemoryInvoiceStore, InvoiceService, InvoiceStore, LoggingNotificationSender,
    NotificationDispatcher, NotificationSender, PgInvoiceStore, StaticCustomerDirectory,
    TracingActivityPublisher,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InvoiceStore>,
    pub invoices: Arc<InvoiceService>,
    pub scheduler: Arc<ReminderScheduler>,
}

/// HTTP routes of the service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/invoices", post(handlers::create_invoice))
        .route(
            "/invoices/:id",
            get(handlers::get_invoice).put(handlers::update_invoice),
        )
        .route("/invoices/:id/send", post(handlers::send_invoice))
        .route("/invoices/:id/reminders", post(handlers::schedule_reminder))
        .route("/users/:user_id/invoices", get(handlers::list_invoices))
        .route("/users/:user_id/invoices/stats", get(handlers::invoice_stats))
        .route("/reminders", get(handlers::list_reminders))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    scheduler_enabled: bool,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        let store: Arc<dyn InvoiceStore> = match config.store {
            StoreKind::Postgres => {
                let url = config.database.url.as_deref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required for postgres"))
                })?;
                let store = PgInvoiceStore::connect(
                    url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    AppError::from(e)
                })?;
                store.run_migrations().await.map_err(|e| {
                    tracing::error!("Failed to run database migrations: {}", e);
                    AppError::from(e)
                })?;
                Arc::new(store)
            }
            StoreKind::Memory => {
                tracing::warn!("Using in-memory invoice store - data is not persisted");
                Arc::new(InMemoryInvoiceStore::new())
            }
        };

        let sender: Arc<dyn NotificationSender> = match &config.notification.service_url {
            Some(url) => {
                tracing::info!(url = %url, "Notification sender initialized");
                Arc::new(HttpNotificationSender::new(url, config.notification.timeout)?)
            }
            None => {
                tracing::warn!("NOTIFICATION_SERVICE_URL not set - e-mails will only be logged");
                Arc::new(LoggingNotificationSender)
            }
        };

        let customers: Arc<dyn CustomerDirectory> = match &config.customer_service_url {
            Some(url) => Arc::new(HttpCustomerDirectory::new(
                url,
                config.customer_service_timeout,
            )?),
            None => {
                tracing::warn!("CUSTOMER_SERVICE_URL not set - customer lookups will fail");
                Arc::new(StaticCustomerDirectory::new())
            }
        };

        let dispatcher = Arc::new(NotificationDispatcher::new(
            sender,
            config.notification.retry_policy(),
        ));
        let activity: Arc<dyn ActivityPublisher> = Arc::new(TracingActivityPublisher);

        let invoices = Arc::new(
            InvoiceService::new(
                Arc::clone(&store),
                Arc::clone(&dispatcher),
                Arc::clone(&customers),
                Arc::clone(&activity),
            )
            .with_strict_page_tokens(config.strict_page_tokens),
        );

        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            customers,
            dispatcher,
            activity,
            config.reminders.settings.clone(),
        ));

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, store = ?config.store, "Invoicing service listening");

        Ok(Self {
            port,
            listener,
            state: AppState {
                store,
                invoices,
                scheduler,
            },
            scheduler_enabled: config.reminders.enabled,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until `shutdown` resolves.
    ///
    /// The reminder scheduler runs as its own task. On shutdown it starts no
    /// new cycle, and a cycle in progress is awaited before this returns.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();

        let scheduler_task = if self.scheduler_enabled {
            Some(Arc::clone(&self.state.scheduler).spawn(token.clone()))
        } else {
            tracing::info!("Reminder scheduler disabled");
            None
        };

        let router = build_router(self.state);
        let serve_token = token.clone();
        let result = axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                serve_token.cancel();
            })
            .await;

        token.cancel();
        if let Some(task) = scheduler_task {
            if let Err(e) = task.await {
                tracing::error!("Reminder scheduler task failed: {}", e);
            }
        }

        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }
        result
    }
}
