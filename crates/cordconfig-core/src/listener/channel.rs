// # Channel Listener
//
// Hands events off from the synchronous broadcast to an async consumer.
//
// `ChannelListener::event()` only pushes onto an unbounded tokio channel, so
// it returns immediately no matter how slow the consumer is. The consumer
// reads the events back as a `Stream`.
//
// ## Usage
//
// ```rust,ignore
// let (listener, mut events) = ChannelListener::new();
// manager.add_listener(listener);
//
// tokio::spawn(async move {
//     while let Some(event) = events.next().await {
//         info!("{}", event);
//     }
// });
// ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::event::CordConfigEvent;
use crate::traits::CordConfigListener;

/// Listener forwarding every event into an unbounded channel
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<CordConfigEvent>,
}

impl ChannelListener {
    /// Create a listener and the stream its events come out of
    pub fn new() -> (Arc<Self>, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self { tx }),
            EventStream {
                inner: UnboundedReceiverStream::new(rx),
            },
        )
    }
}

impl CordConfigListener for ChannelListener {
    fn event(&self, event: &CordConfigEvent) -> anyhow::Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| anyhow::anyhow!("event stream receiver dropped"))
    }
}

/// Stream of events received by a [`ChannelListener`]
///
/// Ends once the listener is dropped (unsubscribed and released by its
/// owner).
pub struct EventStream {
    inner: UnboundedReceiverStream<CordConfigEvent>,
}

impl Stream for EventStream {
    type Item = CordConfigEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
