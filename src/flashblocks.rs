//! Flashblocks feed
//!
//! Base streams ~200ms preconfirmation payloads over a raw WebSocket. We
//! only need the cadence, not the payload contents: every flashblock turns
//! into a tick that the scheduler may use to trigger a scan.

use eyre::Result;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const CHANNEL_DEPTH: usize = 64;

/// One flashblock observed on the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashblockTick {
    pub block_number: u64,
    /// Position within the block; index 0 opens a new block.
    pub index: u64,
}

#[derive(Deserialize)]
struct FlashblockFrame {
    #[serde(default)]
    index: u64,
    #[serde(default)]
    metadata: FrameMetadata,
}

#[derive(Deserialize, Default)]
struct FrameMetadata {
    #[serde(default)]
    block_number: u64,
}

fn parse_tick(text: &str) -> Option<FlashblockTick> {
    let frame: FlashblockFrame = serde_json::from_str(text).ok()?;
    if frame.metadata.block_number == 0 {
        return None;
    }
    Some(FlashblockTick {
        block_number: frame.metadata.block_number,
        index: frame.index,
    })
}

pub struct FlashblockFeed {
    url: String,
}

impl FlashblockFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Spawn the feed reader. The task reconnects forever; the receiver only
    /// closes when it is dropped by the consumer.
    pub fn spawn(self) -> mpsc::Receiver<FlashblockTick> {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

        tokio::spawn(async move {
            loop {
                if let Err(e) = self.run_connection(&tx).await {
                    tracing::warn!("flashblocks feed dropped: {}", e);
                }
                if tx.is_closed() {
                    break;
                }
                sleep(RECONNECT_DELAY).await;
            }
        });

        rx
    }

    async fn run_connection(&self, tx: &mpsc::Sender<FlashblockTick>) -> Result<()> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        tracing::info!("connected to flashblocks feed at {}", self.url);

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => {
                    if let Some(tick) = parse_tick(&text) {
                        // A full channel means the consumer is mid-scan and
                        // does not need more wakeups; drop the tick.
                        if tx.try_send(tick).is_err() && tx.is_closed() {
                            return Ok(());
                        }
                    }
                }
                Message::Binary(bytes) => {
                    // Some feed deployments send the same JSON as binary.
                    if let Ok(text) = std::str::from_utf8(&bytes) {
                        if let Some(tick) = parse_tick(text) {
                            if tx.try_send(tick).is_err() && tx.is_closed() {
                                return Ok(());
                            }
                        }
                    }
                }
                Message::Ping(data) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        Err(eyre::eyre!("websocket stream ended"))
    }
}
