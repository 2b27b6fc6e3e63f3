use std::time::Duration;

use anyhow::Result;

use ps_cache::{HotReader, HotSnapshotBuilder, ViewAccountant};
use ps_core::blob::HttpBlobStore;
use ps_core::config::AppConfig;
use ps_core::{db, http, kv, logging, server};
use ps_mq::audit::{ApprovedHandler, RejectedHandler};
use ps_mq::{run_consumer, stream_consumer, EventProducer};
use ps_tasks::Scheduler;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("ps-server");
    let config = AppConfig::from_env()?;

    let db = db::Db::connect(&config.database).await?;
    ps_store::migrations::run(db.write()).await?;
    let kv = kv::connect(&config.redis_url).await?;

    let producer = EventProducer::new(&config.kafka)?;
    let accountant = ViewAccountant::new(
        kv.clone(),
        config.dedup.clone(),
        config.writeback.scan_batch_size,
    );
    let reader = HotReader::new(kv.clone(), accountant.clone());
    let builder = HotSnapshotBuilder::new(
        kv.clone(),
        db.clone(),
        config.snapshot.hot_list_size,
        config.writeback.scan_batch_size,
    );
    let blob = HttpBlobStore::new(config.blob.clone());

    let mut scheduler = Scheduler::new();
    ps_tasks::spawn_standard_jobs(
        &mut scheduler,
        accountant.clone(),
        builder,
        db.clone(),
        config.writeback.clone(),
        config.snapshot.interval,
        config.snapshot.deadline,
    );

    // One consumer worker per moderation-result topic, sharing the group.
    let approved_consumer = stream_consumer(
        &config.kafka.brokers,
        &config.kafka.consumer_group,
        &config.kafka.topic_approved,
    )?;
    let rejected_consumer = stream_consumer(
        &config.kafka.brokers,
        &config.kafka.consumer_group,
        &config.kafka.topic_rejected,
    )?;
    let approved_topic = config.kafka.topic_approved.clone();
    let rejected_topic = config.kafka.topic_rejected.clone();
    let approved_shutdown = scheduler.shutdown_signal();
    let rejected_shutdown = scheduler.shutdown_signal();
    let approved_db = db.clone();
    let rejected_db = db.clone();
    let approved_worker = tokio::spawn(async move {
        run_consumer(
            approved_consumer,
            &approved_topic,
            ApprovedHandler::new(approved_db),
            approved_shutdown,
        )
        .await;
    });
    let rejected_worker = tokio::spawn(async move {
        run_consumer(
            rejected_consumer,
            &rejected_topic,
            RejectedHandler::new(rejected_db),
            rejected_shutdown,
        )
        .await;
    });

    let api_state = ps_api::AppState {
        db: db.clone(),
        kv: kv.clone(),
        reader,
        accountant,
        producer: producer.clone(),
        blob,
    };
    let api_router = http::apply_standard_layers(ps_api::router(api_state), ps_api::SERVICE_NAME);

    let admin_state = ps_admin_api::AppState {
        db: db.clone(),
        kv: kv.clone(),
        producer,
    };
    let admin_router = http::apply_standard_layers(
        ps_admin_api::router(admin_state),
        ps_admin_api::SERVICE_NAME,
    );

    tokio::try_join!(
        server::serve(ps_api::SERVICE_NAME, config.listen_addr, api_router),
        server::serve(
            ps_admin_api::SERVICE_NAME,
            config.admin_listen_addr,
            admin_router
        ),
    )?;

    // Servers have drained; stop periodic jobs and consumer loops.
    if let Err(err) = scheduler.shutdown(SHUTDOWN_GRACE).await {
        tracing::warn!(error = %err, "scheduler did not drain in time");
    }
    for (name, worker) in [("approved", approved_worker), ("rejected", rejected_worker)] {
        match tokio::time::timeout(SHUTDOWN_GRACE, worker).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(consumer = name, error = %err, "consumer join failed"),
            Err(_) => tracing::warn!(consumer = name, "consumer did not stop in time"),
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
