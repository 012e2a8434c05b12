//! Write-once completion slot turning the first terminal observer callback
//! into a value a waiting sample can pick up, with a mandatory deadline.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;

use super::event::RegistrationFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    Registered { registration_id: String },
    Failed(RegistrationFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Terminal(TerminalEvent),
    TimedOut,
    /// Every sender was dropped before anything was written.
    Abandoned,
}

#[derive(Debug)]
pub struct CompletionSender {
    slot: Mutex<Option<oneshot::Sender<TerminalEvent>>>,
}

#[derive(Debug)]
pub struct CompletionReceiver {
    rx: oneshot::Receiver<TerminalEvent>,
}

#[must_use]
pub fn completion_bridge() -> (CompletionSender, CompletionReceiver) {
    let (tx, rx) = oneshot::channel();
    (
        CompletionSender {
            slot: Mutex::new(Some(tx)),
        },
        CompletionReceiver { rx },
    )
}

impl CompletionSender {
    /// Delivers `event` if nothing was delivered before.
    ///
    /// Returns `true` only for the write that won the slot and reached a
    /// still-waiting receiver.
    pub fn complete(&self, event: TerminalEvent) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        sender.is_some_and(|tx| tx.send(event).is_ok())
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl CompletionReceiver {
    /// Waits for the first terminal event, at most `limit`.
    ///
    /// Consumes the receiver, so a write landing after a timeout is dropped
    /// on the floor.
    pub async fn wait(self, limit: Duration) -> Completion {
        match timeout(limit, self.rx).await {
            Ok(Ok(event)) => Completion::Terminal(event),
            Ok(Err(_)) => Completion::Abandoned,
            Err(_) => Completion::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::registration::tests::run_async_test;

    fn registered(id: &str) -> TerminalEvent {
        TerminalEvent::Registered {
            registration_id: id.to_owned(),
        }
    }

    #[test]
    fn first_write_wins() -> AppResult<()> {
        run_async_test(async {
            let (tx, rx) = completion_bridge();
            if !tx.complete(registered("first")) {
                return Err(AppError::validation("Expected first write to win"));
            }
            if tx.complete(TerminalEvent::Failed(RegistrationFailure::transport("late"))) {
                return Err(AppError::validation("Expected second write to be dropped"));
            }
            match rx.wait(Duration::from_secs(1)).await {
                Completion::Terminal(event) if event == registered("first") => Ok(()),
                other => Err(AppError::validation(format!(
                    "Unexpected completion: {:?}",
                    other
                ))),
            }
        })
    }

    #[test]
    fn wait_times_out_without_write() -> AppResult<()> {
        run_async_test(async {
            let (tx, rx) = completion_bridge();
            let completion = rx.wait(Duration::from_millis(20)).await;
            if completion != Completion::TimedOut {
                return Err(AppError::validation(format!(
                    "Expected timeout, got {:?}",
                    completion
                )));
            }
            if tx.complete(registered("late")) {
                return Err(AppError::validation(
                    "Late write must not reach a timed-out receiver",
                ));
            }
            if !tx.is_completed() {
                return Err(AppError::validation("Slot should be spent after late write"));
            }
            Ok(())
        })
    }

    #[test]
    fn dropped_sender_abandons_wait() -> AppResult<()> {
        run_async_test(async {
            let (tx, rx) = completion_bridge();
            drop(tx);
            let completion = rx.wait(Duration::from_secs(5)).await;
            if completion != Completion::Abandoned {
                return Err(AppError::validation(format!(
                    "Expected abandoned, got {:?}",
                    completion
                )));
            }
            Ok(())
        })
    }

    #[test]
    fn write_from_other_thread_is_observed() -> AppResult<()> {
        run_async_test(async {
            let (tx, rx) = completion_bridge();
            let writer = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                tx.complete(registered("threaded"))
            });
            let completion = rx.wait(Duration::from_secs(2)).await;
            let won = writer
                .join()
                .map_err(|_err| AppError::validation("Writer thread panicked"))?;
            if !won || completion != Completion::Terminal(registered("threaded")) {
                return Err(AppError::validation(format!(
                    "Unexpected completion: {:?}",
                    completion
                )));
            }
            Ok(())
        })
    }
}
