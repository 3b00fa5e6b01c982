//! Record fan-out: producers, consumers, and the built-in consumer chain
//!
//! A [`RecordProducer`] holds an explicit list of consumers, wired at
//! startup, and delivers each record (or batch) to every consumer
//! synchronously in registration order. Delivery is fail-fast: the first
//! consumer error aborts the remaining deliveries for that record and
//! propagates to the crawler, which treats the crawl step as failed.
//! Consistency is preferred over best-effort delivery here; a best-effort
//! mode would have to be documented as a deviation.

pub mod orchestrator;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::index::IndexClient;
use crate::models::Record;

/// Consumer of published records.
///
/// Records are never mutated after delivery; a consumer may keep a deep
/// copy without ever observing later changes.
#[async_trait]
pub trait RecordConsumer: Send + Sync {
    /// Stable name used in logs and error context
    fn name(&self) -> &str;

    /// Consume a single record
    async fn consume(&self, record: &Record) -> anyhow::Result<()>;

    /// Consume a batch. The default delivers record by record; consumers
    /// with an atomicity boundary of their own (the index writer) override
    /// this to hand the whole batch downstream in one command.
    async fn consume_batch(&self, records: &[Record]) -> anyhow::Result<()> {
        for record in records {
            self.consume(record).await?;
        }
        Ok(())
    }
}

/// Fan-out producer with an explicit, ordered consumer list
#[derive(Default)]
pub struct RecordProducer {
    consumers: Vec<Arc<dyn RecordConsumer>>,
}

impl RecordProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a consumer; delivery follows registration order
    pub fn subscribe(&mut self, consumer: Arc<dyn RecordConsumer>) {
        debug!(consumer = consumer.name(), "Consumer subscribed");
        self.consumers.push(consumer);
    }

    /// Remove a previously subscribed consumer
    pub fn unsubscribe(&mut self, consumer: &Arc<dyn RecordConsumer>) {
        self.consumers.retain(|c| !Arc::ptr_eq(c, consumer));
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Deliver one record to every consumer, fail-fast
    pub async fn notify(&self, record: &Record) -> anyhow::Result<()> {
        for consumer in &self.consumers {
            consumer
                .consume(record)
                .await
                .map_err(|e| e.context(format!("consumer '{}' failed", consumer.name())))?;
        }
        Ok(())
    }

    /// Deliver a batch to every consumer, fail-fast.
    ///
    /// The batch is the atomicity boundary the crawler offers: demoted
    /// editions and the new latest edition travel together so no consumer
    /// observes an intermediate state with zero or two latest records for
    /// one master id.
    pub async fn notify_batch(&self, records: &[Record]) -> anyhow::Result<()> {
        for consumer in &self.consumers {
            consumer
                .consume_batch(records)
                .await
                .map_err(|e| e.context(format!("consumer '{}' failed", consumer.name())))?;
        }
        Ok(())
    }
}

/// Consumer that writes records into the search index
pub struct IndexWriterConsumer {
    client: IndexClient,
}

impl IndexWriterConsumer {
    pub fn new(client: IndexClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordConsumer for IndexWriterConsumer {
    fn name(&self) -> &str {
        "index-writer"
    }

    async fn consume(&self, record: &Record) -> anyhow::Result<()> {
        self.client.push_batch(std::slice::from_ref(record)).await?;
        Ok(())
    }

    async fn consume_batch(&self, records: &[Record]) -> anyhow::Result<()> {
        self.client.push_batch(records).await?;
        Ok(())
    }
}

/// Consumer that removes records (and, by engine cascade, their children)
pub struct DeletionConsumer {
    client: IndexClient,
}

impl DeletionConsumer {
    pub fn new(client: IndexClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordConsumer for DeletionConsumer {
    fn name(&self) -> &str {
        "delete-propagator"
    }

    async fn consume(&self, record: &Record) -> anyhow::Result<()> {
        self.client
            .delete(record.record_type, std::slice::from_ref(&record.id))
            .await?;
        Ok(())
    }
}

/// Consumer that emits a structured audit event per record
#[derive(Default)]
pub struct AuditConsumer;

#[async_trait]
impl RecordConsumer for AuditConsumer {
    fn name(&self) -> &str {
        "audit-logger"
    }

    async fn consume(&self, record: &Record) -> anyhow::Result<()> {
        let title = record
            .first_value("title")
            .map(|t| crate::utils::truncate_text(t, 80))
            .unwrap_or_default();
        info!(
            id = %record.id,
            master_id = %record.master_id,
            version = record.version,
            latest = record.latest,
            replica = record.replica,
            record_type = %record.record_type,
            title = %title,
            "Record published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordType;
    use std::sync::Mutex;

    /// Test consumer recording delivery order
    struct Recording {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl RecordConsumer for Recording {
        fn name(&self) -> &str {
            self.label
        }

        async fn consume(&self, record: &Record) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("intentional failure");
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, record.id));
            Ok(())
        }
    }

    fn recording(
        label: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        fail: bool,
    ) -> Arc<dyn RecordConsumer> {
        Arc::new(Recording {
            label,
            log: Arc::clone(log),
            fail,
        })
    }

    #[tokio::test]
    async fn test_delivery_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut producer = RecordProducer::new();
        producer.subscribe(recording("first", &log, false));
        producer.subscribe(recording("second", &log, false));

        let record = Record::new("ds.v1", RecordType::Dataset);
        producer.notify(&record).await.unwrap();

        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, ["first:ds.v1", "second:ds.v1"]);
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_remaining() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut producer = RecordProducer::new();
        producer.subscribe(recording("first", &log, false));
        producer.subscribe(recording("broken", &log, true));
        producer.subscribe(recording("third", &log, false));

        let record = Record::new("ds.v1", RecordType::Dataset);
        let err = producer.notify(&record).await.unwrap_err();

        assert!(err.to_string().contains("broken"));
        // third consumer never saw the record
        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, ["first:ds.v1"]);
    }

    #[tokio::test]
    async fn test_batch_delivery_per_consumer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut producer = RecordProducer::new();
        producer.subscribe(recording("only", &log, false));

        let batch = vec![
            Record::new("ds.v1", RecordType::Dataset),
            Record::new("ds.v2", RecordType::Dataset),
        ];
        producer.notify_batch(&batch).await.unwrap();

        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, ["only:ds.v1", "only:ds.v2"]);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut producer = RecordProducer::new();
        let first = recording("first", &log, false);
        producer.subscribe(Arc::clone(&first));
        producer.subscribe(recording("second", &log, false));
        assert_eq!(producer.consumer_count(), 2);

        producer.unsubscribe(&first);
        assert_eq!(producer.consumer_count(), 1);

        let record = Record::new("ds.v1", RecordType::Dataset);
        producer.notify(&record).await.unwrap();

        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, ["second:ds.v1"]);
    }
}
