#![cfg(feature = "service")]

//! Actor front-end for a [`StakePost`].
//!
//! A single tokio task owns the ledger and applies commands one at a time
//! in arrival order; callers talk to it through a cloneable
//! [`LedgerHandle`]. Each command completes before the next is taken from
//! the mailbox, which gives the same serial semantics as the lock-based
//! [`SharedLedger`](crate::SharedLedger) without blocking threads.

use crate::account::ExitQuote;
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::events::NotificationSink;
use crate::identity::Identity;
use crate::ledger::{Post, Slot};
use crate::reference::PostReference;
use crate::snapshot::LedgerSnapshot;
use crate::stake_post::StakePost;
use crate::transfer::{Amount, ValueTransfer};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Mailbox depth used by [`spawn`].
pub const DEFAULT_MAILBOX: usize = 256;

/// Errors raised by the actor front-end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    /// The ledger rejected the command.
    Ledger(#[from] LedgerError),
    #[error("ledger service stopped")]
    /// The actor task is no longer running.
    Stopped,
}

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Stake {
        participant: Identity,
        reference: PostReference,
        amount: Amount,
        reply: Reply<Result<Slot, LedgerError>>,
    },
    Exit {
        participant: Identity,
        reply: Reply<Result<ExitQuote, LedgerError>>,
    },
    SetFeeRate {
        caller: Identity,
        rate: u32,
        reply: Reply<Result<(), LedgerError>>,
    },
    SetFeeCollector {
        caller: Identity,
        collector: Identity,
        reply: Reply<Result<(), LedgerError>>,
    },
    Lookup {
        participant: Identity,
        reply: Reply<Option<Slot>>,
    },
    Post {
        slot: Slot,
        reply: Reply<Option<Post>>,
    },
    Snapshot {
        reply: Reply<LedgerSnapshot>,
    },
}

/// Cloneable sender side of the ledger actor.
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<Command>,
}

/// Moves `ledger` into a new actor task and returns its handle.
///
/// The task ends once every handle is dropped; awaiting the returned
/// [`JoinHandle`] then yields the ledger back.
pub fn spawn<C, V, S>(ledger: StakePost<C, V, S>) -> (LedgerHandle, JoinHandle<StakePost<C, V, S>>)
where
    C: Clock + 'static,
    V: ValueTransfer + 'static,
    S: NotificationSink + 'static,
{
    let (tx, rx) = mpsc::channel(DEFAULT_MAILBOX);
    let task = tokio::spawn(run(ledger, rx));
    (LedgerHandle { tx }, task)
}

async fn run<C, V, S>(
    mut ledger: StakePost<C, V, S>,
    mut rx: mpsc::Receiver<Command>,
) -> StakePost<C, V, S>
where
    C: Clock,
    V: ValueTransfer,
    S: NotificationSink,
{
    tracing::info!(evt = "SERVICE_START", "ledger service running");
    while let Some(command) = rx.recv().await {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::Stake {
                participant,
                reference,
                amount,
                reply,
            } => {
                let _ = reply.send(ledger.stake_and_post(participant, reference, amount));
            }
            Command::Exit { participant, reply } => {
                let _ = reply.send(ledger.exit(&participant));
            }
            Command::SetFeeRate {
                caller,
                rate,
                reply,
            } => {
                let _ = reply.send(ledger.set_fee_rate(&caller, rate));
            }
            Command::SetFeeCollector {
                caller,
                collector,
                reply,
            } => {
                let _ = reply.send(ledger.set_fee_collector(&caller, collector));
            }
            Command::Lookup { participant, reply } => {
                let _ = reply.send(ledger.get_index_by_user(&participant));
            }
            Command::Post { slot, reply } => {
                let _ = reply.send(ledger.post(slot).cloned());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(ledger.snapshot());
            }
        }
    }
    tracing::info!(evt = "SERVICE_STOP", "ledger service stopped");
    ledger
}

impl LedgerHandle {
    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// See [`StakePost::stake_and_post`].
    pub async fn stake_and_post(
        &self,
        participant: Identity,
        reference: PostReference,
        amount: Amount,
    ) -> Result<Slot, ServiceError> {
        Ok(self
            .call(|reply| Command::Stake {
                participant,
                reference,
                amount,
                reply,
            })
            .await??)
    }

    /// See [`StakePost::exit`].
    pub async fn exit(&self, participant: Identity) -> Result<ExitQuote, ServiceError> {
        Ok(self
            .call(|reply| Command::Exit { participant, reply })
            .await??)
    }

    /// See [`StakePost::set_fee_rate`].
    pub async fn set_fee_rate(&self, caller: Identity, rate: u32) -> Result<(), ServiceError> {
        Ok(self
            .call(|reply| Command::SetFeeRate {
                caller,
                rate,
                reply,
            })
            .await??)
    }

    /// See [`StakePost::set_fee_collector`].
    pub async fn set_fee_collector(
        &self,
        caller: Identity,
        collector: Identity,
    ) -> Result<(), ServiceError> {
        Ok(self
            .call(|reply| Command::SetFeeCollector {
                caller,
                collector,
                reply,
            })
            .await??)
    }

    /// See [`StakePost::get_index_by_user`].
    pub async fn get_index_by_user(&self, participant: Identity) -> Result<Option<Slot>, ServiceError> {
        self.call(|reply| Command::Lookup { participant, reply })
            .await
    }

    /// Copy of the record at `slot`.
    pub async fn post(&self, slot: Slot) -> Result<Option<Post>, ServiceError> {
        self.call(|reply| Command::Post { slot, reply }).await
    }

    /// Consistent copy of the persistent state.
    pub async fn snapshot(&self) -> Result<LedgerSnapshot, ServiceError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }
}
