//! The validate-and-store pipeline behind every span upload.
//!
//! [`IngestPipeline::accept_spans`] counts the message, reverses transport
//! compression, hands the payload to a [`SpanConsumer`], and returns a
//! [`CompletionHandle`] that resolves to exactly one [`Outcome`]. Transport
//! adapters only translate their request into an [`IngestRequest`] and the
//! outcome into a response.

use crate::codec::SpanFormat;
use crate::collector::{CollectorMetrics, ConsumeFailure, FailureKind, SpanConsumer};
use crate::compression::decompress;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Failure messages with this prefix are server-side.
pub const SERVER_FAILURE_PREFIX: &str = "Cannot store";

/// One inbound span upload.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    encoding: Option<String>,
    format: SpanFormat,
    body: Bytes,
}

impl IngestRequest {
    /// Creates a request from the declared content encoding, format, and raw body.
    #[must_use]
    pub fn new(encoding: Option<String>, format: SpanFormat, body: Bytes) -> Self {
        Self {
            encoding,
            format,
            body,
        }
    }

    /// Returns the declared content encoding.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Returns the declared wire format.
    #[must_use]
    pub fn format(&self) -> SpanFormat {
        self.format
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Who a rejection is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cause {
    /// The caller sent bad data; maps to 400.
    Client,
    /// The collector failed; maps to 500.
    Server,
}

impl Cause {
    /// Returns the HTTP status code for this cause.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::Client => 400,
            Self::Server => 500,
        }
    }
}

impl From<FailureKind> for Cause {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Validation => Self::Client,
            FailureKind::Infrastructure => Self::Server,
        }
    }
}

/// Classifies a failure that carries only text.
///
/// No message, or a message starting with `"Cannot store"`, is a server
/// failure; any other message is blamed on the client.
#[must_use]
pub fn classify(message: Option<&str>) -> Cause {
    match message {
        None => Cause::Server,
        Some(m) if m.starts_with(SERVER_FAILURE_PREFIX) => Cause::Server,
        Some(_) => Cause::Client,
    }
}

/// Terminal result of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The spans were accepted.
    Accepted,
    /// The upload failed.
    Rejected {
        /// Human-readable reason, without trailing newline.
        message: String,
        /// Who the failure is attributed to.
        cause: Cause,
    },
}

impl Outcome {
    /// Creates a rejection.
    #[must_use]
    pub fn rejected(message: impl Into<String>, cause: Cause) -> Self {
        Self::Rejected {
            message: message.into(),
            cause,
        }
    }

    /// Converts a consumer failure into a rejection.
    ///
    /// A structured kind wins over the message heuristic. A failure without
    /// a message is reported by its kind name.
    #[must_use]
    pub fn from_failure(failure: &ConsumeFailure) -> Self {
        let cause = failure
            .kind()
            .map_or_else(|| classify(failure.message()), Cause::from);
        let message = match (failure.message(), failure.kind()) {
            (Some(m), _) => m.to_string(),
            (None, Some(kind)) => kind.name().to_string(),
            (None, None) => "UnknownFailure".to_string(),
        };
        Self::rejected(message, cause)
    }

    /// Returns the HTTP status code for this outcome.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Accepted => 202,
            Self::Rejected { cause, .. } => cause.status_code(),
        }
    }
}

/// Write half of a completion; consumed by the single write.
#[derive(Debug)]
struct Completer {
    tx: oneshot::Sender<Outcome>,
}

impl Completer {
    fn complete(self, outcome: Outcome) {
        // The caller may have stopped waiting; the outcome is then discarded.
        if self.tx.send(outcome).is_err() {
            tracing::debug!("Ingest caller went away before completion");
        }
    }
}

/// Awaitable result of [`IngestPipeline::accept_spans`].
///
/// Resolves exactly once. If the pipeline task dies before completing, the
/// handle resolves to a server-side rejection instead of hanging.
#[derive(Debug)]
pub struct CompletionHandle {
    rx: oneshot::Receiver<Outcome>,
}

fn completion() -> (Completer, CompletionHandle) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, CompletionHandle { rx })
}

impl CompletionHandle {
    /// Returns the outcome if it is already available.
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        self.rx.try_recv().ok()
    }
}

impl Future for CompletionHandle {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.unwrap_or_else(|_| {
                Outcome::rejected("Ingest pipeline dropped the request", Cause::Server)
            })
        })
    }
}

/// Orchestrates decompression, consumption, and completion for uploads.
#[derive(Clone)]
pub struct IngestPipeline {
    consumer: Arc<dyn SpanConsumer>,
    metrics: Arc<dyn CollectorMetrics>,
}

impl IngestPipeline {
    /// Creates a pipeline feeding `consumer` and counting into `metrics`.
    pub fn new(consumer: Arc<dyn SpanConsumer>, metrics: Arc<dyn CollectorMetrics>) -> Self {
        Self { consumer, metrics }
    }

    /// Starts processing an upload and returns its completion handle.
    ///
    /// Decompression runs on the calling task; consumption runs on a spawned
    /// task, so this must be called from within a Tokio runtime. The handle
    /// is resolved exactly once: with a client rejection if decompression
    /// fails (the consumer is never called), otherwise from the consumer's
    /// result.
    pub fn accept_spans(&self, request: IngestRequest) -> CompletionHandle {
        let (completer, handle) = completion();
        self.metrics.increment_messages();

        let IngestRequest {
            encoding,
            format,
            body,
        } = request;

        let body = match decompress(body, encoding.as_deref()) {
            Ok(body) => body,
            Err(e) => {
                self.metrics.increment_messages_dropped();
                tracing::warn!(error = %e, encoding = ?encoding, "Dropping undecompressable message");
                completer.complete(Outcome::rejected(e.to_string(), Cause::Client));
                return handle;
            }
        };

        let consumer = Arc::clone(&self.consumer);
        tokio::spawn(async move {
            let outcome = match consumer.consume(body, format).await {
                Ok(()) => Outcome::Accepted,
                Err(failure) => {
                    let outcome = Outcome::from_failure(&failure);
                    if let Outcome::Rejected { message, cause } = &outcome {
                        match cause {
                            Cause::Server => tracing::error!(%format, %message, "Span upload failed"),
                            Cause::Client => tracing::warn!(%format, %message, "Span upload rejected"),
                        }
                    }
                    outcome
                }
            };
            completer.complete(outcome);
        });

        handle
    }
}
