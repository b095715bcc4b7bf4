// Certstream ingestion - WebSocket client and frame parsing

pub mod client;
pub mod message;

pub use client::IngestClient;
pub use message::parse_domains;
