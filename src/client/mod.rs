mod config;
mod download;
mod notification;
mod work;
mod worker;

pub use config::Config;
pub use download::{Coordinator, Download};
pub use notification::Notification;
pub use work::{PieceResult, PieceWork, WorkQueue};
