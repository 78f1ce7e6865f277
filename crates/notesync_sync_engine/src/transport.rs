//! Transport abstraction for the remote command and event services.

use crate::error::{SyncError, SyncResult};
use notesync_core::Event;
use notesync_sync_protocol::{
    CborMessage, GetEventsRequest, GetEventsResponse, PostCommandRequest, PostCommandResponse,
    RpcCode, RpcHandler, RpcStatus, GET_EVENTS, POST_COMMAND,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// The remote command service.
pub trait CommandService: Send + Sync {
    /// Submits one command.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Rpc`] if the call fails at the transport level.
    /// A rejected command is a successful call with a failure status.
    fn post_command(
        &self,
        request: &PostCommandRequest,
        deadline: Option<Duration>,
    ) -> SyncResult<PostCommandResponse>;
}

/// The remote event stream.
pub trait EventService: Send + Sync {
    /// Fetches a page of events.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Rpc`] if the call fails at the transport level.
    fn get_events(
        &self,
        request: &GetEventsRequest,
        deadline: Option<Duration>,
    ) -> SyncResult<GetEventsResponse>;
}

/// Encodes requests, hands them to an [`RpcHandler`] and decodes the
/// answers.
///
/// With an in-process handler this is a loopback connection. It can be
/// switched off to simulate an unreachable server.
///
/// The deadline is checked before a call is dispatched. A response that
/// arrives after the deadline is returned anyway, since the server may
/// already have applied the command.
pub struct RpcTransport<H: RpcHandler> {
    handler: H,
    connected: AtomicBool,
}

impl<H: RpcHandler> RpcTransport<H> {
    /// Creates a connected transport.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            connected: AtomicBool::new(true),
        }
    }

    /// Returns the handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Sets the connected state. Calls on a disconnected transport fail
    /// with [`RpcCode::Unavailable`].
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns true if calls are forwarded.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn call<Req, Res>(&self, method: &str, request: &Req, deadline: Option<Duration>) -> SyncResult<Res>
    where
        Req: CborMessage,
        Res: CborMessage,
    {
        if !self.is_connected() {
            return Err(RpcStatus::new(RpcCode::Unavailable, "not connected").into());
        }

        let started = Instant::now();
        let body = request.encode()?;
        if let Some(deadline) = deadline {
            if started.elapsed() >= deadline {
                return Err(RpcStatus::new(
                    RpcCode::DeadlineExceeded,
                    format!("{method} expired before dispatch ({deadline:?})"),
                )
                .into());
            }
        }

        // Once dispatched, the handler may have committed; a late answer is
        // still the answer.
        let response = self.handler.call(method, &body)?;
        if let Some(deadline) = deadline {
            let elapsed = started.elapsed();
            if elapsed > deadline {
                warn!(method, ?elapsed, ?deadline, "late rpc response kept");
            }
        }

        trace!(method, request_bytes = body.len(), response_bytes = response.len(), "rpc call");
        Ok(Res::decode(&response)?)
    }
}

impl<H: RpcHandler> CommandService for RpcTransport<H> {
    fn post_command(
        &self,
        request: &PostCommandRequest,
        deadline: Option<Duration>,
    ) -> SyncResult<PostCommandResponse> {
        self.call(POST_COMMAND, request, deadline)
    }
}

impl<H: RpcHandler> EventService for RpcTransport<H> {
    fn get_events(
        &self,
        request: &GetEventsRequest,
        deadline: Option<Duration>,
    ) -> SyncResult<GetEventsResponse> {
        self.call(GET_EVENTS, request, deadline)
    }
}

/// A scripted transport for tests.
///
/// Command replies are consumed in order; once the script is exhausted
/// every call fails with [`RpcCode::Unimplemented`]. Every request is
/// recorded. Events served by [`EventService`] are set with
/// [`push_event`](Self::push_event).
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<PostCommandResponse, RpcStatus>>>,
    requests: Mutex<Vec<PostCommandRequest>>,
    events: Mutex<Vec<Event>>,
}

impl MockTransport {
    /// Creates a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer to the next unanswered command.
    pub fn push_reply(&self, reply: Result<PostCommandResponse, RpcStatus>) {
        self.replies.lock().push_back(reply);
    }

    /// Makes an event available on the event stream.
    pub fn push_event(&self, event: Event) {
        self.events.lock().push(event);
    }

    /// Returns every command request received so far.
    pub fn requests(&self) -> Vec<PostCommandRequest> {
        self.requests.lock().clone()
    }
}

impl CommandService for MockTransport {
    fn post_command(
        &self,
        request: &PostCommandRequest,
        _deadline: Option<Duration>,
    ) -> SyncResult<PostCommandResponse> {
        self.requests.lock().push(request.clone());
        match self.replies.lock().pop_front() {
            Some(reply) => reply.map_err(SyncError::from),
            None => Err(RpcStatus::new(RpcCode::Unimplemented, "no scripted reply").into()),
        }
    }
}

impl EventService for MockTransport {
    fn get_events(
        &self,
        request: &GetEventsRequest,
        _deadline: Option<Duration>,
    ) -> SyncResult<GetEventsResponse> {
        let events = self.events.lock();
        let mut page: Vec<Event> = events
            .iter()
            .filter(|event| event.event_id > request.after_event_id)
            .cloned()
            .collect();
        let limit = request.limit as usize;
        let has_more = page.len() > limit;
        page.truncate(limit);
        Ok(GetEventsResponse::new(page, has_more))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::NoteEvent;
    use notesync_sync_protocol::CommandMessage;

    fn request() -> PostCommandRequest {
        PostCommandRequest {
            agg_id: "note-1".into(),
            last_revision: 0,
            command: CommandMessage::DeleteNote,
        }
    }

    struct Echo;

    impl RpcHandler for Echo {
        fn call(&self, method: &str, body: &[u8]) -> Result<Vec<u8>, RpcStatus> {
            match method {
                POST_COMMAND => {
                    let request = PostCommandRequest::decode(body)
                        .map_err(|e| RpcStatus::new(RpcCode::InvalidArgument, e.to_string()))?;
                    PostCommandResponse::success(1, request.last_revision + 1)
                        .encode()
                        .map_err(|e| RpcStatus::new(RpcCode::Internal, e.to_string()))
                }
                _ => Err(RpcStatus::new(RpcCode::Unimplemented, method)),
            }
        }
    }

    #[test]
    fn rpc_transport_round_trip() {
        let transport = RpcTransport::new(Echo);
        let response = transport.post_command(&request(), None).unwrap();
        assert_eq!(response, PostCommandResponse::success(1, 1));
    }

    #[test]
    fn rpc_transport_disconnected() {
        let transport = RpcTransport::new(Echo);
        transport.set_connected(false);

        let err = transport.post_command(&request(), None).unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, SyncError::Rpc { code: RpcCode::Unavailable, .. }));
    }

    #[derive(Default)]
    struct Slow {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl RpcHandler for Slow {
        fn call(&self, method: &str, body: &[u8]) -> Result<Vec<u8>, RpcStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Echo.call(method, body)
        }
    }

    #[test]
    fn rpc_transport_expired_deadline_is_not_dispatched() {
        let transport = RpcTransport::new(Slow::default());
        let err = transport
            .post_command(&request(), Some(Duration::ZERO))
            .unwrap_err();

        assert!(matches!(err, SyncError::Rpc { code: RpcCode::DeadlineExceeded, .. }));
        assert_eq!(transport.handler().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rpc_transport_keeps_late_response() {
        let transport = RpcTransport::new(Slow::default());
        let response = transport
            .post_command(&request(), Some(Duration::from_millis(1)))
            .unwrap();

        assert_eq!(response, PostCommandResponse::success(1, 1));
        assert_eq!(transport.handler().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rpc_transport_unknown_method() {
        let transport = RpcTransport::new(Echo);
        let err = transport
            .get_events(&GetEventsRequest::new(0, 10), None)
            .unwrap_err();
        assert!(matches!(err, SyncError::Rpc { code: RpcCode::Unimplemented, .. }));
    }

    #[test]
    fn mock_transport_script() {
        let transport = MockTransport::new();
        transport.push_reply(Ok(PostCommandResponse::success(7, 1)));
        transport.push_reply(Err(RpcStatus::new(RpcCode::Unavailable, "down")));

        assert!(transport.post_command(&request(), None).unwrap().is_success());
        assert!(transport.post_command(&request(), None).unwrap_err().is_transient());
        assert!(matches!(
            transport.post_command(&request(), None),
            Err(SyncError::Rpc { code: RpcCode::Unimplemented, .. })
        ));
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn mock_transport_pages_events() {
        let transport = MockTransport::new();
        for id in 1..=3 {
            transport.push_event(Event::new("note-1", id, NoteEvent::Deleted).with_event_id(id));
        }

        let page = transport.get_events(&GetEventsRequest::new(0, 2), None).unwrap();
        assert_eq!(page.last_event_id(), Some(2));
        assert!(page.has_more);

        let page = transport.get_events(&GetEventsRequest::new(2, 2), None).unwrap();
        assert_eq!(page.events.len(), 1);
        assert!(!page.has_more);
    }
}
