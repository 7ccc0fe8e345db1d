//! Connection Handler Contract

use super::request::ConnectionRequest;

/// User-supplied reaction to incoming connection requests
///
/// Invoked on whatever thread the native transport delivers the callback on,
/// possibly several at once. The handler takes ownership of the request and
/// decides it by calling [`ConnectionRequest::accept`] or
/// [`ConnectionRequest::reject`]; a request dropped undecided is rejected.
pub trait ConnectionHandler: Send + Sync {
    /// Handle one connection request
    fn on_connection_request(&self, request: ConnectionRequest);
}

impl<F> ConnectionHandler for F
where
    F: Fn(ConnectionRequest) + Send + Sync,
{
    fn on_connection_request(&self, request: ConnectionRequest) {
        self(request)
    }
}
