//! Scripted remote peers for exercising the client against real sockets.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;

use crate::codec::{AsyncDecoder, AsyncEncoder};
use crate::core::PeerId;
use crate::crypto::Sha1;
use crate::message::{Block, BlockData, Handshake, Message, MessageCodec};
use crate::peer::Bitfield;

/// Deterministic content used across tests.
pub fn content(length: usize) -> Vec<u8> {
    (0..length).map(|i| (i % 251) as u8).collect()
}

pub fn piece_hashes(content: &[u8], piece_size: usize) -> Vec<Sha1> {
    content.chunks(piece_size).map(Sha1::digest).collect()
}

/// How a scripted peer behaves.
#[derive(Clone)]
pub struct Script {
    reply_info_hash: Sha1,
    content: Arc<Vec<u8>>,
    piece_size: usize,
    pieces: HashSet<usize>,
    first_message: Option<Message>,
    send_bitfield: bool,
    answer_requests: bool,
    corrupt_piece: Option<usize>,
    misdirect: bool,
    reply_delay: Duration,
    choke_after: Option<usize>,
}

impl Script {
    /// A seeder holding every piece of `content`.
    pub fn new(info_hash: Sha1, content: Vec<u8>, piece_size: usize) -> Self {
        let total_pieces = content.len().div_ceil(piece_size);
        Self {
            reply_info_hash: info_hash,
            content: Arc::new(content),
            piece_size,
            pieces: (0..total_pieces).collect(),
            first_message: None,
            send_bitfield: true,
            answer_requests: true,
            corrupt_piece: None,
            misdirect: false,
            reply_delay: Duration::ZERO,
            choke_after: None,
        }
    }

    pub fn with_pieces(mut self, pieces: impl IntoIterator<Item = usize>) -> Self {
        self.pieces = pieces.into_iter().collect();
        self
    }

    pub fn with_reply_info_hash(mut self, info_hash: Sha1) -> Self {
        self.reply_info_hash = info_hash;
        self
    }

    /// Sends `message` in place of the bitfield.
    pub fn with_first_message(mut self, message: Message) -> Self {
        self.first_message = Some(message);
        self
    }

    pub fn without_bitfield(mut self) -> Self {
        self.send_bitfield = false;
        self
    }

    /// Accepts requests but never answers them.
    pub fn unresponsive(mut self) -> Self {
        self.answer_requests = false;
        self
    }

    /// Flips the bytes of the first block served for `piece`, once.
    pub fn with_corrupt_piece(mut self, piece: usize) -> Self {
        self.corrupt_piece = Some(piece);
        self
    }

    /// Labels every served block with the next piece index.
    pub fn with_misdirected_pieces(mut self) -> Self {
        self.misdirect = true;
        self
    }

    /// Waits `delay` before answering the handshake.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Holds the first `requests` requests, then chokes, serves them, stays quiet for a moment
    /// and unchokes again.
    pub fn with_choke_after(mut self, requests: usize) -> Self {
        self.choke_after = Some(requests);
        self
    }

    fn bitfield(&self) -> Bitfield {
        let total_pieces = self.content.len().div_ceil(self.piece_size);
        let mut bitfield = Bitfield::with_pieces(total_pieces);
        for piece in &self.pieces {
            bitfield.set_piece(*piece);
        }
        bitfield
    }
}

pub struct ScriptedPeer {
    pub addr: SocketAddr,
    pub requests: Arc<AtomicUsize>,
    /// Requests received between our choke and unchoke.
    pub choked_requests: Arc<AtomicUsize>,
    pub haves: Arc<Mutex<Vec<usize>>>,
    pub handshakes: Arc<Mutex<Vec<Handshake>>>,
}

#[derive(Clone)]
struct Shared {
    script: Script,
    requests: Arc<AtomicUsize>,
    choked_requests: Arc<AtomicUsize>,
    haves: Arc<Mutex<Vec<usize>>>,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
    corrupted: Arc<AtomicBool>,
}

pub async fn spawn_peer(script: Script) -> ScriptedPeer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shared = Shared {
        script,
        requests: Arc::new(AtomicUsize::new(0)),
        choked_requests: Arc::new(AtomicUsize::new(0)),
        haves: Arc::new(Mutex::new(Vec::new())),
        handshakes: Arc::new(Mutex::new(Vec::new())),
        corrupted: Arc::new(AtomicBool::new(false)),
    };
    let peer = ScriptedPeer {
        addr,
        requests: Arc::clone(&shared.requests),
        choked_requests: Arc::clone(&shared.choked_requests),
        haves: Arc::clone(&shared.haves),
        handshakes: Arc::clone(&shared.handshakes),
    };
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let shared = shared.clone();
            tokio::spawn(async move {
                let _ = serve(socket, shared).await;
            });
        }
    });
    peer
}

type Messages = Framed<TcpStream, MessageCodec>;

async fn serve(mut socket: TcpStream, shared: Shared) -> crate::Result<()> {
    let script = &shared.script;
    let handshake = Handshake::decode(&mut socket).await?;
    shared.handshakes.lock().await.push(handshake);
    sleep(script.reply_delay).await;
    Handshake::new(script.reply_info_hash, PeerId([9; 20]))
        .encode(&mut socket)
        .await?;

    let mut messages = Framed::new(socket, MessageCodec::new(1 << 20));
    if let Some(message) = &script.first_message {
        messages.send(message.clone()).await?;
    } else if script.send_bitfield {
        messages.send(Message::Bitfield(script.bitfield())).await?;
    }

    let mut held = Vec::new();
    while let Some(message) = messages.next().await {
        match message? {
            Message::Interested => messages.send(Message::Unchoke).await?,
            Message::Have(piece) => shared.haves.lock().await.push(piece),
            Message::Request(block) => {
                shared.requests.fetch_add(1, Ordering::SeqCst);
                match script.choke_after {
                    Some(limit) if held.len() < limit => {
                        held.push(block);
                        if held.len() == limit {
                            choke_and_serve(&mut messages, &shared, &held).await?;
                        }
                    }
                    _ => serve_block(&mut messages, &shared, block).await?,
                }
            }
            _ => (),
        }
    }
    Ok(())
}

async fn choke_and_serve(
    messages: &mut Messages,
    shared: &Shared,
    held: &[Block],
) -> crate::Result<()> {
    messages.send(Message::Choke).await?;
    for block in held {
        serve_block(messages, shared, *block).await?;
    }
    let mut late = Vec::new();
    while let Ok(Some(message)) = timeout(Duration::from_millis(100), messages.next()).await {
        if let Message::Request(block) = message? {
            shared.requests.fetch_add(1, Ordering::SeqCst);
            shared.choked_requests.fetch_add(1, Ordering::SeqCst);
            late.push(block);
        }
    }
    messages.send(Message::Unchoke).await?;
    for block in late {
        serve_block(messages, shared, block).await?;
    }
    Ok(())
}

async fn serve_block(messages: &mut Messages, shared: &Shared, block: Block) -> crate::Result<()> {
    let script = &shared.script;
    if !script.answer_requests || !script.pieces.contains(&block.piece) {
        return Ok(());
    }
    let start = block.piece * script.piece_size + block.offset;
    if start + block.length > script.content.len() {
        return Ok(());
    }
    let mut data = script.content[start..start + block.length].to_vec();
    if script.corrupt_piece == Some(block.piece)
        && !shared.corrupted.swap(true, Ordering::SeqCst)
    {
        for byte in &mut data {
            *byte = !*byte;
        }
    }
    messages
        .send(Message::Piece(BlockData {
            piece: block.piece + script.misdirect as usize,
            offset: block.offset,
            data,
        }))
        .await
}
