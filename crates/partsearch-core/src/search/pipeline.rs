//! Lexer pipeline
//!
//! Runs the [`Lexer`] as a producer task that pushes tokens into a bounded
//! queue. The consumer side is a [`TokenStream`]. The producer suspends
//! while the queue is full and stops promptly when the stream is cancelled
//! or dropped, so a consumer that bails out early never leaves a scan
//! running.

use futures_core::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::lexer::{Lexer, Token};

/// Default capacity of the hand-off queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// How the producer task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    /// The terminal token was delivered to the queue
    Completed,
    /// The stream was cancelled before the terminal token
    Cancelled,
    /// The receiving side went away
    ConsumerGone,
}

/// Consumer end of a running lexer
#[derive(Debug)]
pub struct TokenStream {
    rx: mpsc::Receiver<Token>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<ProducerExit>>,
}

/// Spawn a lexer over `input` feeding a queue of `capacity` tokens
pub fn spawn_lexer(input: impl Into<String>, capacity: usize) -> TokenStream {
    spawn_lexer_with_cancel(input, capacity, CancellationToken::new())
}

/// Like [`spawn_lexer`], stopping as soon as `cancel` fires
pub fn spawn_lexer_with_cancel(
    input: impl Into<String>,
    capacity: usize,
    cancel: CancellationToken,
) -> TokenStream {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(produce(input.into(), tx, cancel.clone()));

    TokenStream {
        rx,
        cancel,
        handle: Some(handle),
    }
}

async fn produce(
    input: String,
    tx: mpsc::Sender<Token>,
    cancel: CancellationToken,
) -> ProducerExit {
    for token in Lexer::new(&input) {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(query = %input, "Lexer cancelled before end of input");
                return ProducerExit::Cancelled;
            }
            sent = tx.send(token) => {
                if sent.is_err() {
                    debug!(query = %input, "Token consumer dropped");
                    return ProducerExit::ConsumerGone;
                }
            }
        }
    }
    ProducerExit::Completed
}

impl TokenStream {
    /// Receive the next token; `None` once the producer is done
    pub async fn next(&mut self) -> Option<Token> {
        self.rx.recv().await
    }

    /// Ask the producer to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A handle that cancels this stream's producer
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the producer and wait for it to exit
    pub async fn finish(mut self) -> Result<ProducerExit, JoinError> {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => handle.await,
            None => Ok(ProducerExit::Cancelled),
        }
    }

    /// Drain every remaining token
    pub async fn drain(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next().await {
            tokens.push(token);
        }
        tokens
    }
}

impl Stream for TokenStream {
    type Item = Token;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Token>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
