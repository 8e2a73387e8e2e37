use std::fmt::{Debug, Display, Formatter};

use sha1::Digest;

#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct Sha1(pub [u8; 20]);

impl Sha1 {
    pub fn digest(data: &[u8]) -> Self {
        Self(sha1::Sha1::digest(data).into())
    }

    pub fn from_hex(hex: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(hex)?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| anyhow::anyhow!("expected 20 bytes, got {}", bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl Display for Sha1 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Sha1 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha1({})", self)
    }
}
