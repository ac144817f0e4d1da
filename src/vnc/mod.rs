//! VNC console access.
//!
//! [`VncClient`] speaks just enough of the RFB protocol to authenticate and
//! inject key events; [`VncDriver`] layers the inter-key delay on top so the
//! guest's keyboard buffer is not overrun during boot command replay.

mod auth;
mod client;

pub use client::VncClient;

use crate::bootcmd::KeyEventDriver;
use crate::error::ForgeResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default pause between key events.
pub const DEFAULT_KEY_INTERVAL: Duration = Duration::from_millis(100);

/// Key event driver that types over an authenticated VNC session.
pub struct VncDriver {
    client: VncClient,
    interval: Duration,
    cancel: CancellationToken,
}

impl VncDriver {
    pub fn new(client: VncClient, interval: Option<Duration>, cancel: CancellationToken) -> Self {
        Self {
            client,
            interval: interval.unwrap_or(DEFAULT_KEY_INTERVAL),
            cancel,
        }
    }
}

#[async_trait]
impl KeyEventDriver for VncDriver {
    async fn key_event(&mut self, keysym: u32, down: bool) -> ForgeResult<()> {
        self.client.key_event(keysym, down).await?;
        // The event itself is always sent, so a shift wrap or held modifier
        // is never left half-applied; only the pacing delay is interruptible.
        // Replay observes the token at the next expression boundary.
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.interval) => {}
        }
        Ok(())
    }
}
