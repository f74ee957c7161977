//! Simulation orchestrator: a central streaming an image over one link.

use std::path::Path;
use std::time::Duration;

use otaflash_device::{OtaDevice, RecordingBootloader, Response};
use otaflash_protocol::{TransferSummary, TransportEvent};
use otaflash_transfer::{FileSlot, SlotId, SlotStorage};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// One outstanding event at a time, like ATT write requests.
const EVENT_QUEUE_SIZE: usize = 1;

/// Connection handle used for the simulated link.
const CONNECTION: u8 = 1;

/// Link-layer reason "remote user terminated connection".
const REASON_REMOTE_USER_TERMINATED: u16 = 0x0213;

/// How a simulated transfer ended.
#[derive(Debug, Default)]
pub struct Outcome {
    pub summary: Option<TransferSummary>,
    pub installed: bool,
    pub entered_dfu: bool,
    /// Whether the slot matches the image; `None` when nothing was installed.
    pub verified: Option<bool>,
}

/// Streams `image` into the configured slot and waits for the link to close.
pub async fn run(config: Config, image: &Path) -> anyhow::Result<Outcome> {
    anyhow::ensure!(config.chunk_size > 0, "chunk_size must be at least 1");

    let image = tokio::fs::read(image).await?;
    tracing::info!(bytes = image.len(), digest = %digest(&image), "image loaded");

    let slot = config.device.slot;
    let storage = FileSlot::open(&config.slot_path, slot, config.slot_capacity)?;
    let bootloader = RecordingBootloader::new(config.bootloader_version);
    let mut device = OtaDevice::new(storage, bootloader, config.device.clone());

    let shutdown = CancellationToken::new();
    let _guard = shutdown.clone().drop_guard();
    let link = shutdown.child_token();
    let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_SIZE);

    tokio::spawn(tick(
        tx.clone(),
        Duration::from_millis(config.tick_interval_ms.max(1)),
        shutdown.clone(),
    ));
    tokio::spawn(feed(
        tx,
        image.clone(),
        config.chunk_size,
        Duration::from_millis(config.chunk_delay_ms),
        link.clone(),
    ));

    let mut outcome = Outcome::default();
    while let Some(event) = rx.recv().await {
        let closed = matches!(event, TransportEvent::LinkClosed { .. });
        match device.handle(event)? {
            Response::Ack(status) if !status.is_success() => {
                tracing::warn!(code = status.code(), ?status, "write rejected, closing link");
                link.cancel();
            }
            Response::AckAndDisconnect(_) => link.cancel(),
            Response::Finished(summary) => {
                tracing::info!(
                    total_bytes = summary.total_bytes,
                    ticks = summary.elapsed_ticks,
                    kbps = summary.throughput_kbps,
                    "transfer complete"
                );
                outcome.summary = Some(summary);
            }
            Response::Installing => outcome.installed = true,
            Response::EnteringDfu => outcome.entered_dfu = true,
            Response::Ack(_) | Response::None => {}
        }
        if closed {
            break;
        }
    }
    shutdown.cancel();

    if outcome.installed {
        let (mut storage, _bootloader) = device.into_parts();
        outcome.verified = Some(verify(&mut storage, slot, &image)?);
    }
    Ok(outcome)
}

/// Emits a tick every `period` until cancelled.
async fn tick(tx: mpsc::Sender<TransportEvent>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if tx.send(TransportEvent::Tick).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Plays the central's side: open, start, one write per chunk, finish, close.
///
/// Stops writing as soon as `link` is cancelled, then closes the link.
async fn feed(
    tx: mpsc::Sender<TransportEvent>,
    image: Vec<u8>,
    chunk_size: usize,
    delay: Duration,
    link: CancellationToken,
) {
    let opening = [
        TransportEvent::LinkOpened {
            connection: CONNECTION,
        },
        TransportEvent::Start,
    ];
    for event in opening {
        if tx.send(event).await.is_err() {
            return;
        }
    }

    for chunk in image.chunks(chunk_size) {
        if !delay.is_zero() {
            tokio::select! {
                _ = link.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if link.is_cancelled() {
            break;
        }
        if tx.send(TransportEvent::Chunk(chunk.to_vec())).await.is_err() {
            return;
        }
    }

    if !link.is_cancelled() && tx.send(TransportEvent::Finish).await.is_err() {
        return;
    }
    let _ = tx
        .send(TransportEvent::LinkClosed {
            reason: REASON_REMOTE_USER_TERMINATED,
        })
        .await;
}

/// Compares the first `image.len()` bytes of the slot against the image.
fn verify(storage: &mut FileSlot, slot: SlotId, image: &[u8]) -> anyhow::Result<bool> {
    let mut readback = vec![0u8; image.len()];
    storage.read(slot, 0, &mut readback)?;

    let expected = digest(image);
    let actual = digest(&readback);
    tracing::info!(%expected, %actual, "slot verification");
    Ok(expected == actual)
}

/// SHA-256 of `data`, hex-encoded.
fn digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
