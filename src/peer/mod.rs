mod bitfield;
mod connection;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use bitfield::Bitfield;
pub use connection::Connection;
pub use session::download_piece;
