use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use qbit_exporter_client::UpstreamClient;
use qbit_exporter_common::{ExporterConfig, FetchError};
use tracing::{Instrument, Span, debug, error, info_span, warn};

use crate::builder::ObservationBuilder;
use crate::types::{MetricFamily, Observation, Sample};

/// Runs one upstream round-trip per scrape and groups the result into
/// metric families. Nothing is cached between scrapes.
pub struct Collector {
    client: Arc<dyn UpstreamClient>,
    builder: ObservationBuilder,
    fetch_timeout: Duration,
    span: Span,
}

impl Collector {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        builder: ObservationBuilder,
        fetch_timeout: Duration,
    ) -> Self {
        let span = info_span!("collector", server = %builder.server());
        Self {
            client,
            builder,
            fetch_timeout,
            span,
        }
    }

    pub fn from_config(client: Arc<dyn UpstreamClient>, config: &ExporterConfig) -> Self {
        Self::new(
            client,
            ObservationBuilder::from_config(config),
            config.fetch_timeout,
        )
    }

    pub async fn collect(&self) -> Vec<MetricFamily> {
        let observations = self.collect_observations().await;
        let families = group_into_families(observations);
        debug!(parent: &self.span, families = families.len(), "collection finished");
        families
    }

    /// The three fetches run concurrently and fail independently. A failed
    /// category or item fetch is treated as an empty result.
    pub async fn collect_observations(&self) -> Vec<Observation> {
        let client = self.client.as_ref();

        let (status, categories, torrents) = async {
            tokio::join!(
                self.bounded("status", client.fetch_status()),
                self.bounded("categories", client.fetch_categories()),
                self.bounded("items", client.fetch_items()),
            )
        }
        .instrument(self.span.clone())
        .await;

        let categories = categories.unwrap_or_default();
        let torrents = torrents.unwrap_or_default();
        self.builder.build(status.as_ref(), &categories, &torrents)
    }

    async fn bounded<T, F>(&self, slice: &'static str, fetch: F) -> Option<T>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let outcome = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Connection(format!(
                "no response within {}s",
                self.fetch_timeout.as_secs_f64()
            ))),
        };

        match outcome {
            Ok(value) => Some(value),
            Err(err) => {
                error!(slice, reason = err.reason(), error = %err, "upstream fetch failed");
                None
            }
        }
    }
}

/// Groups observations by name, keeping first-seen order for families and
/// samples. An observation whose kind or label keys disagree with the first
/// one seen under its name is dropped.
pub fn group_into_families(observations: Vec<Observation>) -> Vec<MetricFamily> {
    let mut families: Vec<MetricFamily> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for observation in observations {
        let Observation {
            name,
            value,
            kind,
            labels,
            help_text,
        } = observation;

        match index.get(&name) {
            Some(&position) => {
                let family = &mut families[position];
                let same_keys = family
                    .samples
                    .first()
                    .is_none_or(|first| first.labels.keys().eq(labels.keys()));
                if family.kind != kind || !same_keys {
                    warn!(metric = %name, "dropping sample with inconsistent kind or labels");
                    continue;
                }
                family.samples.push(Sample { labels, value });
            }
            None => {
                index.insert(name.clone(), families.len());
                families.push(MetricFamily {
                    name,
                    help: help_text,
                    kind,
                    samples: vec![Sample { labels, value }],
                });
            }
        }
    }

    families
}
