//! Single-item stream returned by `NetworkService::publisher`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, Stream};
use tokio::sync::oneshot;

use crate::error::NetworkError;
use crate::service::TaskHandle;

/// Yields the result of one call, then ends.
///
/// Dropped before yielding, it cancels the call.
#[derive(Debug)]
pub struct Publisher<T> {
    receiver: Option<oneshot::Receiver<Result<T, NetworkError>>>,
    handle: Option<TaskHandle>,
}

impl<T> Publisher<T> {
    pub(crate) fn new(
        receiver: oneshot::Receiver<Result<T, NetworkError>>,
        handle: Option<TaskHandle>,
    ) -> Self {
        Self {
            receiver: Some(receiver),
            handle,
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.cancel();
        }
    }
}

impl<T> Stream for Publisher<T> {
    type Item = Result<T, NetworkError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(None);
        };
        let item = match Pin::new(receiver).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(result)) => result,
            // The task went away without completing, e.g. runtime shutdown.
            Poll::Ready(Err(_)) => Err(NetworkError::Cancelled),
        };
        self.receiver = None;
        Poll::Ready(Some(item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.receiver.is_some());
        (remaining, Some(remaining))
    }
}

impl<T> FusedStream for Publisher<T> {
    fn is_terminated(&self) -> bool {
        self.receiver.is_none()
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        if self.receiver.is_some() {
            self.cancel();
        }
    }
}
