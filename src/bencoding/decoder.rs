use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Write};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::bencoding::Value;
use crate::codec::AsyncDecoder;

const BUFFER_SIZE: usize = 1024 * 8;

impl AsyncDecoder for Value {
    async fn decode<S: AsyncRead + Unpin>(stream: &mut S) -> crate::Result<Self> {
        let mut parser = Parser::new();
        let mut buf = [0; BUFFER_SIZE];
        loop {
            let read = stream.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            parser.write_all(&buf[..read])?;
        }
        Ok(parser.result()?)
    }
}

/// Incremental bencoding parser. Input is fed one byte at a time, so a document can arrive in
/// arbitrary chunks (file reads, HTTP body frames).
#[derive(Debug)]
pub struct Parser {
    state: State,
    stack: Vec<Collection>,
    position: usize,
}

#[derive(Debug)]
enum State {
    Ready,
    Integer { negative: bool, value: Option<i64> },
    StringLength(usize),
    StringContents(Vec<u8>, usize),
    Done(Value),
}

#[derive(Debug)]
enum Collection {
    List(Vec<Value>),
    Dictionary(Option<String>, BTreeMap<String, Value>),
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Ready,
            stack: Vec::new(),
            position: 0,
        }
    }

    pub fn consume(&mut self, byte: u8) -> io::Result<()> {
        match (&mut self.state, byte) {
            // Integer
            (State::Ready, b'i') => {
                self.state = State::Integer {
                    negative: false,
                    value: None,
                };
            }
            (State::Integer { negative, value: None }, b'-') if !*negative => {
                *negative = true;
            }
            (State::Integer { value: Some(0), .. }, b'0'..=b'9') => {
                return Err(self.error("leading zeros not allowed"));
            }
            (State::Integer { negative, value }, b'0'..=b'9') => {
                let digit = (byte - b'0') as i64;
                let shifted = value.unwrap_or(0).checked_mul(10);
                let next = if *negative {
                    shifted.and_then(|v| v.checked_sub(digit))
                } else {
                    shifted.and_then(|v| v.checked_add(digit))
                };
                match next {
                    Some(next) => *value = Some(next),
                    None => return Err(self.error("integer overflow")),
                }
            }
            (
                State::Integer {
                    negative: true,
                    value: Some(0),
                },
                b'e',
            ) => {
                return Err(self.error("negative zero not allowed"));
            }
            (&mut State::Integer { value: Some(value), .. }, b'e') => {
                self.emit(Value::Integer(value))?;
            }

            // Collections
            (State::Ready, b'l') => {
                self.stack.push(Collection::List(Vec::new()));
            }
            (State::Ready, b'd') => {
                self.stack
                    .push(Collection::Dictionary(None, BTreeMap::new()));
            }
            (State::Ready, b'e') => self.close()?,

            // String
            (State::Ready, b'0'..=b'9') => {
                self.state = State::StringLength((byte - b'0') as usize);
            }
            (State::StringLength(0), b'0'..=b'9') => {
                return Err(self.error("leading zeros not allowed"));
            }
            (State::StringLength(length), b'0'..=b'9') => {
                let digit = (byte - b'0') as usize;
                match length.checked_mul(10).and_then(|l| l.checked_add(digit)) {
                    Some(next) => *length = next,
                    None => return Err(self.error("string length overflow")),
                }
            }
            (&mut State::StringLength(0), b':') => {
                self.emit(Value::String(Vec::new()))?;
            }
            (&mut State::StringLength(length), b':') => {
                let bytes = Vec::with_capacity(length.min(BUFFER_SIZE));
                self.state = State::StringContents(bytes, length);
            }
            (State::StringContents(bytes, length), _) => {
                bytes.push(byte);
                if bytes.len() == *length {
                    let bytes = std::mem::take(bytes);
                    self.emit(Value::String(bytes))?;
                }
            }

            // Ignore trailing whitespace
            (State::Done(_), b'\n' | b'\r' | b' ') => (),

            _ => {
                return Err(self.error(&format!("unexpected byte 0x{:02x}", byte)));
            }
        }
        self.position += 1;
        Ok(())
    }

    /// Returns the parsed value, or an error if the document is incomplete.
    pub fn result(self) -> io::Result<Value> {
        match self.state {
            State::Done(value) => Ok(value),
            _ => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("incomplete document after {} bytes", self.position),
            )),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stack.pop() {
            Some(Collection::List(values)) => self.emit(Value::List(values)),
            Some(Collection::Dictionary(None, entries)) => self.emit(Value::Dictionary(entries)),
            Some(Collection::Dictionary(Some(key), _)) => {
                Err(self.error(&format!("missing value for key {:?}", key)))
            }
            None => Err(self.error("nothing to close")),
        }
    }

    fn emit(&mut self, value: Value) -> io::Result<()> {
        let position = self.position;
        match (self.stack.last_mut(), value) {
            (None, value) => {
                self.state = State::Done(value);
                return Ok(());
            }
            (Some(Collection::List(values)), value) => values.push(value),
            (Some(Collection::Dictionary(key @ None, _)), Value::String(bytes)) => {
                let string = String::from_utf8(bytes)
                    .map_err(|_| invalid_data("dictionary keys must be valid utf8", position))?;
                *key = Some(string);
            }
            (Some(Collection::Dictionary(None, _)), _) => {
                return Err(invalid_data("dictionary keys must be strings", position));
            }
            (Some(Collection::Dictionary(key, entries)), value) => {
                if let Some(key) = key.take() {
                    entries.insert(key, value);
                }
            }
        }
        self.state = State::Ready;
        Ok(())
    }

    fn error(&self, message: &str) -> io::Error {
        invalid_data(message, self.position)
    }
}

fn invalid_data(message: &str, position: usize) -> io::Error {
    io::Error::new(
        ErrorKind::InvalidData,
        format!("{} at byte {}", message, position),
    )
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for Parser {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for byte in buf {
            self.consume(*byte)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
