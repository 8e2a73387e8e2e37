use std::io::{Result, Write};

use crate::bencoding::Value;

impl Value {
    /// Writes the canonical encoding: dictionary keys in sorted order, integers without padding.
    pub fn encode(&self, dest: &mut impl Write) -> Result<()> {
        match self {
            Self::String(bytes) => encode_bytes(bytes, dest),
            Self::Integer(integer) => write!(dest, "i{}e", integer),
            Self::List(values) => {
                dest.write_all(b"l")?;
                for value in values {
                    value.encode(dest)?;
                }
                dest.write_all(b"e")
            }
            Self::Dictionary(entries) => {
                dest.write_all(b"d")?;
                for (key, value) in entries {
                    encode_bytes(key.as_bytes(), dest)?;
                    value.encode(dest)?;
                }
                dest.write_all(b"e")
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.encode(&mut buf);
        buf
    }
}

fn encode_bytes(bytes: &[u8], dest: &mut impl Write) -> Result<()> {
    write!(dest, "{}:", bytes.len())?;
    dest.write_all(bytes)
}
