//! The change subscriber: one NATS JetStream consumer task per declared
//! resource type, translating lifecycle events into relationship writes.

pub mod message;

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{self, consumer::pull::Config as PullConfig, AckKind};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::config::Settings;
use crate::engine::relationship::Relationship;
use crate::engine::{AuthEngine, EngineError};
use crate::pid::Pid;

use message::{ChangeAction, ChangeMessage};

pub struct Subscriber {
    engine: Arc<AuthEngine>,
    jetstream: jetstream::Context,
    subject_prefix: String,
    drain_timeout: Duration,
}

impl Subscriber {
    pub async fn connect(settings: &Settings, engine: Arc<AuthEngine>) -> anyhow::Result<Self> {
        let client = async_nats::connect(&settings.message_bus_url).await?;
        let jetstream = jetstream::new(client);
        Ok(Self {
            engine,
            jetstream,
            subject_prefix: settings.message_bus_subject_prefix.clone(),
            drain_timeout: settings.subscriber_drain_timeout(),
        })
    }

    /// Runs one consumer task per declared resource type until `shutdown`
    /// fires, then allows in-flight messages up to `drain_timeout` to finish.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let stream_name = format!("{}-relationship-changes", self.subject_prefix);
        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: stream_name.clone(),
                subjects: vec!["*.*".to_string()],
                ..Default::default()
            })
            .await?;

        let resource_types: Vec<String> = self
            .engine
            .policy()
            .resource_types
            .keys()
            .cloned()
            .collect();

        let mut tasks = Vec::with_capacity(resource_types.len());
        for resource_type in resource_types {
            let engine = self.engine.clone();
            let consumer_name = format!("permissions-{resource_type}");
            let filter_subject = format!("*.{resource_type}");
            let consumer = stream
                .get_or_create_consumer(
                    &consumer_name,
                    PullConfig {
                        durable_name: Some(consumer_name.clone()),
                        filter_subject,
                        ..Default::default()
                    },
                )
                .await?;
            let mut shutdown_rx = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                consume(engine, consumer, &mut shutdown_rx).await;
            }));
        }

        shutdown.changed().await.ok();
        info!(drain_timeout = ?self.drain_timeout, "subscriber shutting down, draining in-flight messages");
        let drain = tokio::time::timeout(self.drain_timeout, futures::future::join_all(tasks));
        if drain.await.is_err() {
            warn!("subscriber drain timed out; aborting remaining consumer tasks");
        }
        Ok(())
    }
}

async fn consume(
    engine: Arc<AuthEngine>,
    consumer: jetstream::consumer::PullConsumer,
    shutdown: &mut watch::Receiver<bool>,
) {
    let mut messages = match consumer.messages().await {
        Ok(messages) => messages,
        Err(err) => {
            error!(%err, "failed to open consumer message stream");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                return;
            }
            next = messages.next() => {
                let Some(next) = next else { return };
                match next {
                    Ok(message) => handle_message(&engine, message).await,
                    Err(err) => error!(%err, "consumer stream error"),
                }
            }
        }
    }
}

#[instrument(skip(engine, message), fields(subject = %message.subject))]
async fn handle_message(engine: &Arc<AuthEngine>, message: jetstream::Message) {
    let parsed: ChangeMessage = match serde_json::from_slice(&message.payload) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(%err, "malformed change message, nacking without retry");
            let _ = message.ack_with(AckKind::Term).await;
            return;
        }
    };

    let object_id = match Pid::parse(&parsed.object_id) {
        Ok(id) => id,
        Err(err) => {
            warn!(%err, "unparseable object id, nacking without retry");
            let _ = message.ack_with(AckKind::Term).await;
            return;
        }
    };

    let resource_type = match engine.policy().type_for_prefix(object_id.prefix()) {
        Some(rt) => rt.name.clone(),
        None => {
            warn!(prefix = object_id.prefix(), "undeclared resource prefix, nacking without retry");
            let _ = message.ack_with(AckKind::Term).await;
            return;
        }
    };

    let outcome = match parsed.action {
        ChangeAction::Write => apply_write(engine, &resource_type, &object_id, &parsed).await,
        ChangeAction::Delete => apply_delete(engine, &resource_type, &object_id, &parsed).await,
    };

    match outcome {
        Ok(()) => {
            let _ = message.ack().await;
        }
        Err(EngineError::InvalidArgument(_) | EngineError::InvalidType(_)) => {
            warn!("change message failed validation, nacking without retry");
            let _ = message.ack_with(AckKind::Term).await;
        }
        Err(err) => {
            error!(%err, "transient failure applying change message, requesting redelivery");
            let _ = message.ack_with(AckKind::Nak(None)).await;
        }
    }
}

async fn apply_write(
    engine: &Arc<AuthEngine>,
    resource_type: &str,
    object_id: &Pid,
    parsed: &ChangeMessage,
) -> Result<(), EngineError> {
    let mut rels = Vec::with_capacity(parsed.relations.len());
    for change in &parsed.relations {
        let subject_id = Pid::parse(&change.subject_id)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        let subject_type = engine
            .policy()
            .type_for_prefix(subject_id.prefix())
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown subject prefix {:?}", subject_id.prefix())))?
            .name
            .clone();
        rels.push(Relationship {
            resource_type: resource_type.to_string(),
            resource_id: object_id.clone(),
            relation: change.relation.clone(),
            subject_type,
            subject_id,
        });
    }
    engine.create_relationships(&rels).await
}

async fn apply_delete(
    engine: &Arc<AuthEngine>,
    resource_type: &str,
    object_id: &Pid,
    parsed: &ChangeMessage,
) -> Result<(), EngineError> {
    if parsed.relations.is_empty() {
        return engine
            .delete_relationships_for_resource(resource_type, object_id)
            .await;
    }

    let mut rels = Vec::with_capacity(parsed.relations.len());
    for change in &parsed.relations {
        let subject_id = Pid::parse(&change.subject_id)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        let subject_type = engine
            .policy()
            .type_for_prefix(subject_id.prefix())
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown subject prefix {:?}", subject_id.prefix())))?
            .name
            .clone();
        rels.push(Relationship {
            resource_type: resource_type.to_string(),
            resource_id: object_id.clone(),
            relation: change.relation.clone(),
            subject_type,
            subject_id,
        });
    }
    engine.delete_relationships_by_tuple(&rels).await
}

