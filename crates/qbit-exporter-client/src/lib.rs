pub mod client;
pub mod qbittorrent;
pub mod types;

pub use client::UpstreamClient;
pub use qbittorrent::QbittorrentClient;
pub use types::{CategoryInfo, ServerState, StatusPayload, Torrent, TorrentState};
