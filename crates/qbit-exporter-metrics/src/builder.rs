use std::collections::{BTreeMap, BTreeSet, HashMap};

use qbit_exporter_client::types::{CategoryInfo, ServerState, StatusPayload, Torrent, TorrentState};
use qbit_exporter_common::ExporterConfig;

use crate::types::{Labels, MetricKind, Observation};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Turns upstream payloads into observations. Holds no I/O handles and no
/// mutable state.
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    prefix: String,
    server: String,
    export_metrics_by_torrent: bool,
}

impl ObservationBuilder {
    pub fn new(
        prefix: impl Into<String>,
        server: impl Into<String>,
        export_metrics_by_torrent: bool,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            server: server.into(),
            export_metrics_by_torrent,
        }
    }

    pub fn from_config(config: &ExporterConfig) -> Self {
        Self::new(
            config.metrics_prefix.clone(),
            config.server_identity(),
            config.export_metrics_by_torrent,
        )
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn build(
        &self,
        status: Option<&StatusPayload>,
        categories: &BTreeMap<String, CategoryInfo>,
        torrents: &[Torrent],
    ) -> Vec<Observation> {
        let mut observations = self.status_observations(status);
        observations.extend(self.torrent_detail_observations(torrents));
        observations.extend(self.torrent_count_observations(categories, torrents));
        observations
    }

    /// `None` means the status fetch failed: `up` reports 0 and every other
    /// value falls back to its default.
    pub fn status_observations(&self, status: Option<&StatusPayload>) -> Vec<Observation> {
        let fallback = ServerState::default();
        let (state, version) = match status {
            Some(payload) => (&payload.server_state, payload.version.as_str()),
            None => (&fallback, ""),
        };
        let server = self.server_labels();

        vec![
            Observation::new(self.metric_name("up"), status.is_some())
                .with_labels(&server)
                .with_label("version", version)
                .with_help(
                    "Whether the qBittorrent server is answering requests from this exporter. \
                     A `version` label with the server version is added.",
                ),
            Observation::new(
                self.metric_name("connected"),
                state.connection_status == "connected",
            )
            .with_labels(&server)
            .with_help("Whether the qBittorrent server is connected to the Bittorrent network."),
            Observation::new(
                self.metric_name("firewalled"),
                state.connection_status == "firewalled",
            )
            .with_labels(&server)
            .with_help(
                "Whether the qBittorrent server is connected to the Bittorrent network \
                 but is behind a firewall.",
            ),
            Observation::new(self.metric_name("dht_nodes"), state.dht_nodes)
                .with_labels(&server)
                .with_help("Number of DHT nodes connected to."),
            Observation::new(
                self.metric_name("total_peer_connections"),
                state.total_peer_connections,
            )
            .with_labels(&server)
            .with_help("Total number of peer connections."),
            Observation::new(self.metric_name("dl_info_data"), state.dl_info_data)
                .with_kind(MetricKind::Counter)
                .with_labels(&server)
                .with_help("Data downloaded since the server started, in bytes."),
            Observation::new(self.metric_name("up_info_data"), state.up_info_data)
                .with_kind(MetricKind::Counter)
                .with_labels(&server)
                .with_help("Data uploaded since the server started, in bytes."),
            Observation::new(self.metric_name("alltime_dl"), state.alltime_dl)
                .with_kind(MetricKind::Counter)
                .with_labels(&server)
                .with_help("Total historical data downloaded, in bytes."),
            Observation::new(self.metric_name("alltime_ul"), state.alltime_ul)
                .with_kind(MetricKind::Counter)
                .with_labels(&server)
                .with_help("Total historical data uploaded, in bytes."),
        ]
    }

    pub fn torrent_count_observations(
        &self,
        categories: &BTreeMap<String, CategoryInfo>,
        torrents: &[Torrent],
    ) -> Vec<Observation> {
        let buckets: BTreeSet<&str> = categories
            .keys()
            .map(|name| category_bucket(name))
            .chain(std::iter::once(UNCATEGORIZED))
            .collect();

        let mut counts: HashMap<(&str, TorrentState), usize> = HashMap::new();
        for torrent in torrents {
            let bucket = category_bucket(&torrent.category);
            if buckets.contains(bucket) {
                *counts.entry((bucket, torrent.state)).or_default() += 1;
            }
        }

        let name = self.metric_name("torrents_count");
        let mut observations = Vec::with_capacity(buckets.len() * TorrentState::ALL.len());
        for bucket in &buckets {
            for state in TorrentState::ALL {
                let count = counts.get(&(*bucket, state)).copied().unwrap_or(0);
                observations.push(
                    Observation::new(name.clone(), count)
                        .with_label("status", state.as_str())
                        .with_label("category", *bucket)
                        .with_label("server", self.server.as_str())
                        .with_help("Number of torrents"),
                );
            }
        }

        observations
    }

    pub fn torrent_detail_observations(&self, torrents: &[Torrent]) -> Vec<Observation> {
        if !self.export_metrics_by_torrent {
            return Vec::new();
        }

        let details: [(&str, &str, fn(&Torrent) -> u64); 3] = [
            ("torrent_size", "Size of the torrent", |torrent| torrent.size),
            (
                "torrent_downloaded",
                "Downloaded data for the torrent",
                |torrent| torrent.downloaded,
            ),
            (
                "torrent_uploaded",
                "Uploaded data for the torrent",
                |torrent| torrent.uploaded,
            ),
        ];

        let mut observations = Vec::with_capacity(torrents.len() * details.len());
        for (suffix, help, value) in details {
            let name = self.metric_name(suffix);
            observations.extend(torrents.iter().map(|torrent| {
                Observation::new(name.clone(), value(torrent))
                    .with_label("name", torrent.name.as_str())
                    .with_label("category", torrent.category.as_str())
                    .with_label("server", self.server.as_str())
                    .with_help(help)
            }));
        }

        observations
    }

    fn metric_name(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.prefix)
    }

    fn server_labels(&self) -> Labels {
        Labels::from([("server".to_string(), self.server.clone())])
    }
}

/// Empty categories and the literal `Uncategorized` share one bucket.
fn category_bucket(category: &str) -> &str {
    if category.is_empty() {
        UNCATEGORIZED
    } else {
        category
    }
}
