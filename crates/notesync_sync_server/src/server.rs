//! The command server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use notesync_core::{CborEventSerializer, CommandProcessor, EventLog, EventStore};
use notesync_storage::DirectoryRecordStore;
use notesync_sync_protocol::{
    CborMessage, GetEventsRequest, GetEventsResponse, PostCommandRequest, PostCommandResponse,
    RpcCode, RpcHandler, RpcStatus, GET_EVENTS, POST_COMMAND,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// The authoritative remote side.
///
/// Holds the remote event log, accepts one command per call and streams
/// the log to clients. It answers encoded calls through [`RpcHandler`], so
/// a client can reach it in-process.
///
/// # Example
///
/// ```
/// use notesync_core::{Command, Path};
/// use notesync_sync_protocol::command_to_request;
/// use notesync_sync_server::{CommandServer, ServerConfig};
///
/// let server = CommandServer::new(ServerConfig::default());
/// let request = command_to_request(&Command::create_note("note-1", Path::root(), "T", ""));
/// let response = server.handle_post_command(&request).unwrap();
/// assert_eq!(response.new_event_id, 1);
/// assert_eq!(server.event_count(), 1);
/// ```
pub struct CommandServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl CommandServer {
    /// Creates a server with an empty in-memory log.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(EventLog::in_memory()))
    }

    /// Creates a server over an existing log.
    pub fn with_store(config: ServerConfig, store: Arc<dyn EventStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Opens a server whose log is kept in `dir`, one file per event.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// event cannot be loaded.
    pub fn open(config: ServerConfig, dir: &Path) -> ServerResult<Self> {
        let records = DirectoryRecordStore::open(dir).map_err(notesync_core::CoreError::from)?;
        let log = EventLog::open(Box::new(records), Box::new(CborEventSerializer))?;
        Ok(Self::with_store(config, Arc::new(log)))
    }

    /// Handles one command.
    ///
    /// # Errors
    ///
    /// Returns an error only if the event log fails.
    pub fn handle_post_command(
        &self,
        request: &PostCommandRequest,
    ) -> ServerResult<PostCommandResponse> {
        self.handler.handle_post_command(request)
    }

    /// Handles an event stream request.
    ///
    /// # Errors
    ///
    /// Returns an error if the event log cannot be read.
    pub fn handle_get_events(&self, request: &GetEventsRequest) -> ServerResult<GetEventsResponse> {
        self.handler.handle_get_events(request)
    }

    /// Returns the authoritative event log.
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.context.store
    }

    /// Returns the processor of the authoritative log.
    pub fn processor(&self) -> &CommandProcessor {
        self.context.processor()
    }

    /// Returns the number of events in the log.
    pub fn event_count(&self) -> usize {
        self.context
            .store
            .all_events(None)
            .map(|events| events.len())
            .unwrap_or(0)
    }

    fn dispatch(&self, method: &str, body: &[u8]) -> ServerResult<Vec<u8>> {
        match method {
            POST_COMMAND => {
                let request = PostCommandRequest::decode(body)?;
                Ok(self.handle_post_command(&request)?.encode()?)
            }
            GET_EVENTS => {
                let request = GetEventsRequest::decode(body)?;
                Ok(self.handle_get_events(&request)?.encode()?)
            }
            other => Err(ServerError::InvalidRequest(format!("unknown method {other}"))),
        }
    }
}

impl RpcHandler for CommandServer {
    fn call(&self, method: &str, body: &[u8]) -> Result<Vec<u8>, RpcStatus> {
        if method != POST_COMMAND && method != GET_EVENTS {
            return Err(RpcStatus::new(RpcCode::Unimplemented, method));
        }
        self.dispatch(method, body).map_err(|err| {
            debug!(method, error = %err, "call failed");
            RpcStatus::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::{Command, Path};
    use notesync_sync_protocol::command_to_request;
    use tempfile::tempdir;

    fn create_note(agg_id: &str) -> PostCommandRequest {
        command_to_request(&Command::create_note(agg_id, Path::root(), "T", ""))
    }

    #[test]
    fn encoded_calls() {
        let server = CommandServer::new(ServerConfig::default());

        let body = create_note("note-1").encode().unwrap();
        let response = PostCommandResponse::decode(&server.call(POST_COMMAND, &body).unwrap()).unwrap();
        assert!(response.is_success());

        let body = GetEventsRequest::new(0, 10).encode().unwrap();
        let page = GetEventsResponse::decode(&server.call(GET_EVENTS, &body).unwrap()).unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].agg_id, "note-1");
    }

    #[test]
    fn unknown_method() {
        let server = CommandServer::new(ServerConfig::default());
        let status = server.call("notesync.Other/Call", &[]).unwrap_err();
        assert_eq!(status.code, RpcCode::Unimplemented);
    }

    #[test]
    fn garbage_body_is_invalid_argument() {
        let server = CommandServer::new(ServerConfig::default());
        let status = server.call(POST_COMMAND, &[0xff, 0x00]).unwrap_err();
        assert_eq!(status.code, RpcCode::InvalidArgument);
    }

    #[test]
    fn directory_log_survives_restart() {
        let dir = tempdir().unwrap();
        {
            let server = CommandServer::open(ServerConfig::default(), dir.path()).unwrap();
            server.handle_post_command(&create_note("note-1")).unwrap();
        }

        let server = CommandServer::open(ServerConfig::default(), dir.path()).unwrap();
        assert_eq!(server.event_count(), 1);
        assert_eq!(server.processor().note("note-1").unwrap().title(), "T");

        let response = server.handle_post_command(&create_note("note-2")).unwrap();
        assert_eq!(response.new_event_id, 2);
    }
}
