//! Boot command scripts and their replay.
//!
//! A boot command is textual, e.g. `root<enter><wait>setup<enter>`. It is
//! parsed once into an [`ExpressionSequence`] and then replayed against a
//! [`KeyEventDriver`] as key-down/key-up events, as if a human were typing
//! at the guest console. Replay is a one-shot, strictly-ordered side effect
//! against the guest's keyboard buffer: any transport failure mid-sequence
//! is fatal because the remote keyboard state is indeterminate afterwards.

mod keys;
mod parser;

pub use keys::{KEY_LEFT_SHIFT, SpecialKey, keysym_for_char};
pub use parser::{Expression, ExpressionSequence, KeyAction, parse};

use crate::error::ForgeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// One entry of a boot command script: the command text (still containing
/// template tokens) and an optional human-readable label surfaced while
/// typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootStep {
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Sink for raw key events.
///
/// The production implementation is [`crate::vnc::VncDriver`]; tests use a
/// recording fake.
#[async_trait]
pub trait KeyEventDriver: Send {
    async fn key_event(&mut self, keysym: u32, down: bool) -> ForgeResult<()>;
}

/// How a replay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Completed,
    Cancelled,
}

impl ExpressionSequence {
    /// Replay the sequence against a key event driver.
    ///
    /// The cancellation token is observed between expressions and during
    /// wait directives; a fired token stops replay without error.
    pub async fn replay(
        &self,
        driver: &mut dyn KeyEventDriver,
        cancel: &CancellationToken,
    ) -> ForgeResult<ReplayOutcome> {
        for expr in self.expressions() {
            if cancel.is_cancelled() {
                return Ok(ReplayOutcome::Cancelled);
            }

            match expr {
                Expression::Literal(c) => {
                    let (keysym, shifted) = keysym_for_char(*c);
                    if shifted {
                        driver.key_event(KEY_LEFT_SHIFT, true).await?;
                    }
                    driver.key_event(keysym, true).await?;
                    driver.key_event(keysym, false).await?;
                    if shifted {
                        driver.key_event(KEY_LEFT_SHIFT, false).await?;
                    }
                }
                Expression::Special { key, action } => {
                    let keysym = key.keysym();
                    match action {
                        KeyAction::Press => {
                            driver.key_event(keysym, true).await?;
                            driver.key_event(keysym, false).await?;
                        }
                        KeyAction::On => driver.key_event(keysym, true).await?,
                        KeyAction::Off => driver.key_event(keysym, false).await?,
                    }
                }
                Expression::Wait(duration) => {
                    tracing::debug!(?duration, "pausing boot command replay");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(ReplayOutcome::Cancelled),
                        _ = tokio::time::sleep(*duration) => {}
                    }
                }
            }
        }

        Ok(ReplayOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingDriver {
        events: Vec<(u32, bool)>,
    }

    #[async_trait]
    impl KeyEventDriver for RecordingDriver {
        async fn key_event(&mut self, keysym: u32, down: bool) -> ForgeResult<()> {
            self.events.push((keysym, down));
            Ok(())
        }
    }

    #[tokio::test]
    async fn literal_replay_produces_down_up_pairs() {
        let seq = parse("ab").unwrap();
        let mut driver = RecordingDriver::default();
        let outcome = seq
            .replay(&mut driver, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReplayOutcome::Completed);
        assert_eq!(
            driver.events,
            vec![(0x61, true), (0x61, false), (0x62, true), (0x62, false)]
        );
    }

    #[tokio::test]
    async fn shifted_literal_wraps_in_left_shift() {
        let seq = parse("A").unwrap();
        let mut driver = RecordingDriver::default();
        seq.replay(&mut driver, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            driver.events,
            vec![
                (KEY_LEFT_SHIFT, true),
                (0x41, true),
                (0x41, false),
                (KEY_LEFT_SHIFT, false),
            ]
        );
    }

    #[tokio::test]
    async fn empty_sequence_produces_no_traffic() {
        let seq = parse("").unwrap();
        let mut driver = RecordingDriver::default();
        seq.replay(&mut driver, &CancellationToken::new())
            .await
            .unwrap();
        assert!(driver.events.is_empty());
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_wait() {
        let seq = parse("<wait1h>a").unwrap();
        let mut driver = RecordingDriver::default();

        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });

        let outcome = seq.replay(&mut driver, &cancel).await.unwrap();
        assert_eq!(outcome, ReplayOutcome::Cancelled);
        assert!(driver.events.is_empty());
    }
}
