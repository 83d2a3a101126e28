// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Wires the full pipeline: SQLite storage with migrations, the durable
//! broker, provider adapters per configuration, one worker per channel,
//! the scheduler, and the HTTP gateway. Everything runs as independent
//! tokio tasks coordinated by one cancellation token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use courier_adapters::{
    AdapterSet, MockSender, SendGridConfig, SendGridSender, TwilioConfig, TwilioSender,
};
use courier_broker::{Broker, BrokerSettings};
use courier_config::CourierConfig;
use courier_core::{CourierError, Platform, Sender};
use courier_dispatch::{DispatchService, Scheduler, Worker};
use courier_gateway::{
    start_server, GatewayState, HealthState, MemoryCounterStore, RateLimitState,
};
use courier_metrics::PrometheusMetrics;
use courier_storage::{Database, MessageRepository, RecipientRepository, UserRepository};

use crate::shutdown;

/// Runs the `courier serve` command. Blocks until SIGINT/SIGTERM.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.logging.level);

    info!("starting courier serve");

    // Storage; migrations run on open.
    let db = Database::open(&config.storage.database_path).await?;
    info!(path = config.storage.database_path.as_str(), "database ready");

    // Broker topology: one durable queue per channel, bound by its routing key.
    let broker = Broker::new(
        db.clone(),
        BrokerSettings {
            lock_timeout: Duration::from_secs(config.broker.lock_timeout_secs),
            max_attempts: config.broker.max_attempts,
            poll_interval: Duration::from_millis(config.broker.poll_interval_ms),
        },
    );
    for platform in Platform::ALL {
        broker.declare_queue(platform.routing_key(), platform.routing_key());
    }

    let users = UserRepository::new(db.clone());
    let messages = MessageRepository::new(db.clone());
    let recipients = RecipientRepository::new(db.clone());
    let service = Arc::new(DispatchService::new(db.clone(), broker.clone()));

    let adapters = build_adapters(&config)?;

    // Metrics recorder; a failure here degrades, it does not abort.
    let prometheus = match PrometheusMetrics::new() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };
    let prometheus_render = prometheus.as_ref().map(|metrics| {
        let handle = metrics.handle();
        Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
    });

    let cancel = shutdown::install_signal_handler();

    // One worker per channel queue.
    let worker = Arc::new(Worker::new(recipients.clone(), adapters));
    for platform in Platform::ALL {
        tokio::spawn(worker.clone().run(
            broker.clone(),
            platform,
            config.broker.prefetch,
            cancel.clone(),
        ));
    }
    info!(
        queues = Platform::ALL.len(),
        prefetch = config.broker.prefetch,
        "workers started"
    );

    // Scheduled-message release loop.
    let scheduler = Scheduler::new(
        messages.clone(),
        service.clone(),
        Duration::from_secs(config.scheduler.interval_secs),
        config.scheduler.batch_size,
    );
    tokio::spawn(scheduler.run(cancel.clone()));

    // HTTP gateway; blocks until shutdown, then drains in-flight requests.
    let state = GatewayState {
        service,
        users,
        messages,
        recipients,
        rate_limit: RateLimitState {
            store: Arc::new(MemoryCounterStore::new()),
            config: config.rate_limit.clone(),
        },
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render,
        },
    };
    start_server(&config.server, state, cancel.clone()).await?;

    info!("courier serve shutdown complete");
    Ok(())
}

/// Build the sealed adapter set from configuration. Channels configured for
/// a real provider fall back to the mock adapter when credentials are
/// absent from the environment.
fn build_adapters(config: &CourierConfig) -> Result<AdapterSet, CourierError> {
    let sms: Arc<dyn Sender> = if config.platforms.sms.provider == "twilio" {
        match TwilioConfig::from_env() {
            Some(cfg) => {
                info!("using Twilio adapter for sms");
                Arc::new(TwilioSender::new(cfg)?)
            }
            None => {
                warn!("twilio credentials not set, using mock adapter for sms");
                Arc::new(MockSender::new(Platform::Sms))
            }
        }
    } else {
        info!("using mock adapter for sms");
        Arc::new(MockSender::new(Platform::Sms))
    };

    let email: Arc<dyn Sender> = if config.platforms.email.provider == "sendgrid" {
        match SendGridConfig::from_env() {
            Some(cfg) => {
                info!("using SendGrid adapter for email");
                Arc::new(SendGridSender::new(cfg)?)
            }
            None => {
                warn!("sendgrid credentials not set, using mock adapter for email");
                Arc::new(MockSender::new(Platform::Email))
            }
        }
    } else {
        info!("using mock adapter for email");
        Arc::new(MockSender::new(Platform::Email))
    };

    // No real providers are wired for these channels yet.
    info!("using mock adapters for whatsapp and telegram");
    let whatsapp: Arc<dyn Sender> = Arc::new(MockSender::new(Platform::Whatsapp));
    let telegram: Arc<dyn Sender> = Arc::new(MockSender::new(Platform::Telegram));

    Ok(AdapterSet::new(sms, email, whatsapp, telegram))
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
