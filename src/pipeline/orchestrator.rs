//! Publishing orchestration
//!
//! The [`PublishingService`] is the single entry point for publish,
//! unpublish, and retract operations. It owns the crawler registry, the
//! consumer chains, and the index handle, and dispatches each request to
//! the crawler registered for the repository type.

use std::sync::Arc;
use tracing::info;

use crate::catalog::source::HttpCatalogSource;
use crate::config::Config;
use crate::crawler::thredds::ThreddsCrawler;
use crate::crawler::{CrawlOptions, CrawlerRegistry, RepositoryType, TracingListener};
use crate::error::{Error, Result};
use crate::index::IndexClient;
use crate::models::{CrawlStats, Record, RecordType};
use crate::pipeline::{
    AuditConsumer, DeletionConsumer, IndexWriterConsumer, RecordProducer,
};
use crate::validation::RecordValidator;

/// Orchestrates publish, unpublish, and retract operations
pub struct PublishingService {
    crawlers: CrawlerRegistry,
    index: IndexClient,
    publisher: Arc<RecordProducer>,
    remover: Arc<RecordProducer>,
}

impl PublishingService {
    /// Wire the full pipeline from configuration: catalog source, index
    /// client, validator, consumer chains, and one crawler per supported
    /// repository type.
    pub fn from_config(config: &Config) -> Result<Self> {
        let index = IndexClient::new(&config.index)?;
        let source = Arc::new(HttpCatalogSource::new(&config.harvester)?);
        let validator = Arc::new(RecordValidator::new(
            &config.validation,
            config.index.publishing_host.as_str(),
        ));

        let mut publisher = RecordProducer::new();
        publisher.subscribe(Arc::new(IndexWriterConsumer::new(index.clone())));
        publisher.subscribe(Arc::new(AuditConsumer));
        let publisher = Arc::new(publisher);

        let mut remover = RecordProducer::new();
        remover.subscribe(Arc::new(DeletionConsumer::new(index.clone())));
        let remover = Arc::new(remover);

        let mut thredds = ThreddsCrawler::new(
            source,
            index.clone(),
            Arc::clone(&publisher),
            Arc::clone(&remover),
            validator,
            config.index.publishing_host.as_str(),
        );
        thredds.add_listener(Arc::new(TracingListener));

        let mut crawlers = CrawlerRegistry::new();
        crawlers.register(RepositoryType::Thredds, Arc::new(thredds));

        Ok(Self {
            crawlers,
            index,
            publisher,
            remover,
        })
    }

    /// Service from pre-wired components (tests, embedded use)
    pub fn new(
        crawlers: CrawlerRegistry,
        index: IndexClient,
        publisher: Arc<RecordProducer>,
        remover: Arc<RecordProducer>,
    ) -> Self {
        Self {
            crawlers,
            index,
            publisher,
            remover,
        }
    }

    /// Crawl a catalog tree and publish every harvestable dataset
    pub async fn publish(
        &self,
        location: &str,
        repository_type: RepositoryType,
        mut options: CrawlOptions,
    ) -> Result<CrawlStats> {
        options.publish = true;
        self.dispatch(location, repository_type, options).await
    }

    /// Crawl a catalog tree and remove every dataset it names
    pub async fn unpublish(
        &self,
        location: &str,
        repository_type: RepositoryType,
        mut options: CrawlOptions,
    ) -> Result<CrawlStats> {
        options.publish = false;
        self.dispatch(location, repository_type, options).await
    }

    /// Remove records by exact id, without crawling
    pub async fn unpublish_ids(&self, record_type: RecordType, ids: &[String]) -> Result<()> {
        let records: Vec<Record> = ids
            .iter()
            .map(|id| Record::new(id.as_str(), record_type))
            .collect();
        self.remover
            .notify_batch(&records)
            .await
            .map_err(Error::from)?;
        info!(count = ids.len(), "Unpublished records by id");
        Ok(())
    }

    /// Flag records as retracted while keeping them searchable.
    ///
    /// Each record is fetched from the index, marked, and republished
    /// through the regular consumer chain in place of being deleted.
    pub async fn retract(&self, record_type: RecordType, ids: &[String]) -> Result<u32> {
        let mut records = self.index.records_by_ids(record_type, ids).await?;
        for record in &mut records {
            record.set_field("retracted", "true");
        }

        self.publisher
            .notify_batch(&records)
            .await
            .map_err(Error::from)?;
        info!(
            requested = ids.len(),
            retracted = records.len(),
            "Retracted records"
        );
        Ok(records.len() as u32)
    }

    async fn dispatch(
        &self,
        location: &str,
        repository_type: RepositoryType,
        options: CrawlOptions,
    ) -> Result<CrawlStats> {
        let crawler = self.crawlers.get(repository_type).ok_or_else(|| {
            Error::Config(format!(
                "no crawler registered for repository type: {repository_type}"
            ))
        })?;

        let stats = crawler.crawl(location, &options).await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use std::collections::HashMap;

    fn index_client() -> IndexClient {
        let mut cores = HashMap::new();
        cores.insert("Dataset".to_string(), "datasets".to_string());
        IndexClient::new(&IndexConfig {
            url: "http://localhost:8983/solr".to_string(),
            cores,
            publishing_host: "localhost".to_string(),
            connect_timeout_secs: 1,
            read_timeout_secs: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_repository_type() {
        let service = PublishingService::new(
            CrawlerRegistry::new(),
            index_client(),
            Arc::new(RecordProducer::new()),
            Arc::new(RecordProducer::new()),
        );

        let err = service
            .publish("http://example.org/catalog.xml", RepositoryType::Thredds, CrawlOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_config_wires_pipeline() {
        let service = PublishingService::from_config(&Config::default()).unwrap();
        assert!(service.crawlers.get(RepositoryType::Thredds).is_some());
        assert_eq!(service.publisher.consumer_count(), 2);
        assert_eq!(service.remover.consumer_count(), 1);
    }
}
