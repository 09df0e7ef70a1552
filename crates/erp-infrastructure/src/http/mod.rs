//! Outbound HTTP adapters

pub mod webhook_sender;
pub mod zkbiotime;

pub use webhook_sender::HttpWebhookSender;
pub use zkbiotime::ZkBioTimeClient;
