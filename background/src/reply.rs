//! Single-use reply handle.

use shared::Response;
use tokio::sync::oneshot;
use tracing::{debug, error};

/// Delivers exactly one [`Response`] to whoever issued a request.
///
/// Sending consumes the handle. A handle dropped without sending, e.g. when
/// the task owning it panics, sends a failure response instead.
#[derive(Debug)]
pub struct Reply {
    tx: Option<oneshot::Sender<Response>>,
}

/// Create a reply handle and the receiver its response arrives on.
pub fn channel() -> (Reply, oneshot::Receiver<Response>) {
    let (tx, rx) = oneshot::channel();
    (Reply { tx: Some(tx) }, rx)
}

impl Reply {
    pub fn send(mut self, response: Response) {
        self.deliver(response);
    }

    fn deliver(&mut self, response: Response) {
        if let Some(tx) = self.tx.take() {
            if tx.send(response).is_err() {
                debug!("Caller went away before the reply was delivered");
            }
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if self.tx.is_some() {
            error!("Request finished without a response");
            self.deliver(Response::failure("Internal error: request ended without a response"));
        }
    }
}
