use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::core::{
    config::{ConfigManager, Settings},
    consumer::{AlertHandler, AlertJournal, ConsumedAlert, DeliveryPath, PendingAlertListener, SignalSubscription},
    emitter::SignalBus,
    error::Result,
    feed::AlertFeed,
    mailbox::StateStore,
    pipeline::AlertPipeline,
    scheduler::TokioScheduler,
    sources::notification::PostedNotification,
};

const JOURNAL_CAPACITY: usize = 50;

/// Startup options collected by the binary.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub feed_url: Option<String>,
    pub test_alert: bool,
}

/// One host callback, as a line of JSON on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    Notification(PostedNotification),
    Push { payload: String },
    ClientId { id: String },
}

/// Feed one host event into the pipeline.
pub fn dispatch(pipeline: &AlertPipeline, event: &HostEvent) {
    match event {
        HostEvent::Notification(posted) => {
            pipeline.on_notification_posted(posted);
        }
        HostEvent::Push { payload } => {
            pipeline.on_push_message(payload.as_bytes());
        }
        HostEvent::ClientId { id } => pipeline.on_client_id(id),
    }
}

/// Read newline-delimited host events until EOF or Ctrl-C. Returns how many lines were dispatched.
pub async fn pump_host_events<R>(reader: R, pipeline: &AlertPipeline) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut dispatched = 0;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, shutting down");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => {
                dispatch(pipeline, &event);
                dispatched += 1;
            }
            Err(e) => log::warn!("Skipping unrecognised host event: {}", e),
        }
    }
    Ok(dispatched)
}

fn test_alert() -> ConsumedAlert {
    ConsumedAlert {
        subject: "测试提醒".to_string(),
        origin: "这是一条测试邮件".to_string(),
        timestamp: Utc::now().timestamp_millis(),
        path: DeliveryPath::Test,
    }
}

fn load_settings(options: &RunOptions) -> Result<Settings> {
    let config_manager = ConfigManager::new(options.config_dir.clone());
    let mut settings = config_manager.load();
    if !config_manager.path().exists() {
        match config_manager.save(&settings) {
            Ok(()) => log::info!("Wrote default settings to {}", config_manager.path().display()),
            Err(e) => log::warn!("Could not write default settings: {}", e),
        }
    }
    if let Some(data_dir) = &options.data_dir {
        settings.data_dir = data_dir.clone();
    }
    if options.feed_url.is_some() {
        settings.feed_url = options.feed_url.clone();
    }
    settings.validate()?;
    Ok(settings)
}

pub async fn run(options: RunOptions) -> Result<()> {
    let settings = load_settings(&options)?;
    let store = StateStore::open(&settings.data_dir)?;
    let bus = Arc::new(SignalBus::new(&settings.app_namespace));
    let journal = Arc::new(AlertJournal::new(JOURNAL_CAPACITY));
    let handler: Arc<dyn AlertHandler> = journal.clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Consumer runtime: mailbox poll + signals
    let listener = PendingAlertListener::new(
        store.mailbox().clone(),
        settings.poll_interval(),
        settings.error_backoff(),
    );
    let subscription = SignalSubscription::subscribe(&bus)?;
    let listener_task = tokio::spawn(listener.run(
        Arc::clone(&handler),
        Some(subscription),
        shutdown_rx.clone(),
    ));

    if options.test_alert {
        handler.on_alert(&test_alert());
    }

    let feed_task = match &settings.feed_url {
        Some(url) => {
            let feed = AlertFeed::new(
                url,
                &settings.filters.default_subject,
                &settings.filters.default_from,
            )?;
            log::info!("Alert feed enabled: {}", feed.url());
            let handler = Arc::clone(&handler);
            let shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = feed.run(handler, shutdown).await {
                    log::error!("Alert feed stopped: {}", e);
                }
            }))
        }
        None => None,
    };

    let scheduler = Arc::new(TokioScheduler::current());
    let pipeline = AlertPipeline::new(
        &settings.filters,
        &store,
        bus.clone(),
        scheduler.clone(),
    );
    if let Some(client_id) = pipeline.client_id() {
        log::info!("Stored client ID: {}", client_id);
    }

    let dispatched = pump_host_events(BufReader::new(tokio::io::stdin()), &pipeline).await?;
    log::info!("Host event stream ended after {} event(s)", dispatched);

    // Hand-offs still queued must land before the listener's last sweep
    drop(pipeline);
    scheduler.drain().await;
    let _ = shutdown_tx.send(true);
    if let Err(e) = listener_task.await {
        log::error!("Push listener task failed: {}", e);
    }
    if let Some(task) = feed_task {
        if let Err(e) = task.await {
            log::error!("Alert feed task failed: {}", e);
        }
    }

    log::info!("Alerts delivered: {}", journal.count());
    for entry in journal.entries() {
        log::info!("{}", entry);
    }

    store.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::model::FilterConfig;
    use crate::core::scheduler::InlineScheduler;
    use tempfile::tempdir;

    #[test]
    fn test_host_event_json() {
        let event: HostEvent = serde_json::from_str(
            r#"{"kind":"notification","package":"com.tradingview.app","title":"Price Alert"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            HostEvent::Notification(PostedNotification::new("com.tradingview.app").with_title("Price Alert"))
        );

        let event: HostEvent = serde_json::from_str(r#"{"kind":"push","payload":"not-json"}"#).unwrap();
        assert!(matches!(event, HostEvent::Push { .. }));

        let event: HostEvent = serde_json::from_str(r#"{"kind":"client_id","id":"cid"}"#).unwrap();
        assert_eq!(event, HostEvent::ClientId { id: "cid".to_string() });
    }

    #[tokio::test]
    async fn test_pump_dispatches_valid_lines() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let bus = Arc::new(SignalBus::new("test.ns"));
        let pipeline = AlertPipeline::new(
            &FilterConfig::default(),
            &store,
            bus,
            Arc::new(InlineScheduler),
        );

        let input = concat!(
            "{\"kind\":\"client_id\",\"id\":\"cid-7\"}\n",
            "\n",
            "garbage\n",
            "{\"kind\":\"push\",\"payload\":\"not-json\"}\n",
            "{\"kind\":\"push\",\"payload\":\"{\\\"subject\\\":\\\"Server Down\\\",\\\"from\\\":\\\"ops@x.com\\\"}\"}\n",
        );

        let dispatched = pump_host_events(BufReader::new(input.as_bytes()), &pipeline)
            .await
            .unwrap();
        assert_eq!(dispatched, 3);

        let pending = store.mailbox().read().unwrap().unwrap();
        assert_eq!(pending.subject, "Server Down");
        assert_eq!(pending.origin, "ops@x.com");
        assert_eq!(pipeline.client_id().as_deref(), Some("cid-7"));
    }

    #[test]
    fn test_load_settings_applies_overrides() {
        let dir = tempdir().unwrap();
        let options = RunOptions {
            config_dir: dir.path().to_path_buf(),
            data_dir: Some(dir.path().join("state")),
            feed_url: Some("http://localhost:8080".to_string()),
            test_alert: false,
        };

        let settings = load_settings(&options).unwrap();
        assert_eq!(settings.data_dir, dir.path().join("state"));
        assert_eq!(settings.feed_url.as_deref(), Some("http://localhost:8080"));

        // Defaults are written on first run, without the command-line overrides
        let written = ConfigManager::new(dir.path().to_path_buf()).load();
        assert_eq!(written, Settings::default());
    }
}
