//! Request handlers for the command service and the event stream.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use notesync_core::{CacheConfig, CommandOrigin, CommandProcessor, CoreError, EventStore};
use notesync_sync_protocol::{
    request_to_command, GetEventsRequest, GetEventsResponse, PostCommandRequest,
    PostCommandResponse,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// State shared by all handlers.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Authoritative event log.
    pub store: Arc<dyn EventStore>,
    processor: CommandProcessor,
}

impl HandlerContext {
    /// Creates a context over `store`.
    pub fn new(config: ServerConfig, store: Arc<dyn EventStore>) -> Self {
        let processor = CommandProcessor::new(Arc::clone(&store), &CacheConfig::default());
        Self {
            config,
            store,
            processor,
        }
    }

    /// Returns the command processor of the authoritative log.
    pub fn processor(&self) -> &CommandProcessor {
        &self.processor
    }
}

/// Handler for command and event stream requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles one command.
    ///
    /// Commands that cannot be mapped or are rejected by the executor are
    /// answered with a failure response. A command that changes nothing is
    /// answered with event id `0` and the current revision.
    ///
    /// # Errors
    ///
    /// Returns an error only if the event log fails.
    pub fn handle_post_command(
        &self,
        request: &PostCommandRequest,
    ) -> ServerResult<PostCommandResponse> {
        let command = match request_to_command(request) {
            Ok(command) => command,
            Err(err) => {
                debug!(agg_id = %request.agg_id, error = %err, "unmappable command");
                return Ok(PostCommandResponse::failure(err.to_string()));
            }
        };

        match self.context.processor.process(&command, CommandOrigin::Remote) {
            Ok(Some(event)) => {
                debug!(
                    agg_id = %event.agg_id,
                    event_id = event.event_id,
                    revision = event.revision,
                    "command accepted"
                );
                Ok(PostCommandResponse::success(event.event_id, event.revision))
            }
            Ok(None) => {
                let revision = self.context.store.current_revision(&request.agg_id)?;
                Ok(PostCommandResponse::success(0, revision))
            }
            Err(err @ CoreError::Storage(_)) => {
                warn!(agg_id = %request.agg_id, error = %err, "event log failure");
                Err(err.into())
            }
            Err(err) => {
                debug!(agg_id = %request.agg_id, error = %err, "command rejected");
                Ok(PostCommandResponse::failure(err.to_string()))
            }
        }
    }

    /// Handles an event stream request.
    ///
    /// The page holds at most `max_events_per_response` events; a `limit`
    /// of `0` asks for a full page.
    ///
    /// # Errors
    ///
    /// Returns an error if the event log cannot be read.
    pub fn handle_get_events(&self, request: &GetEventsRequest) -> ServerResult<GetEventsResponse> {
        let max = self.context.config.max_events_per_response;
        let limit = match request.limit {
            0 => max,
            limit => limit.min(max),
        } as usize;

        let mut events = self.context.store.all_events(Some(request.after_event_id))?;
        let has_more = events.len() > limit;
        events.truncate(limit);
        Ok(GetEventsResponse::new(events, has_more))
    }
}
