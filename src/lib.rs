pub mod bencoding;
pub mod client;
mod codec;
pub mod core;
pub mod crypto;
mod error;
pub mod message;
pub mod peer;
pub mod storage;
pub mod torrent;
pub mod tracker;

pub use client::{Config, Coordinator, Download, Notification};
pub use error::{Error, Result};
