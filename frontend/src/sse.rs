use std::rc::Rc;

use chatbot_ui::{ClientError, Result, SessionId, StreamConnection, StreamEvent, StreamTransport};
use futures_util::future::{abortable, AbortHandle};
use futures_util::StreamExt;
use gloo_net::eventsource::futures::EventSource;

/// Receives every event of every session; the session id lets the receiver
/// drop events from sessions it already closed.
pub type Dispatch = Rc<dyn Fn(SessionId, StreamEvent)>;

/// Opens one `EventSource` per answer and forwards its `message` events.
pub struct EventSourceTransport {
    dispatch: Dispatch,
}

impl EventSourceTransport {
    pub fn new(dispatch: impl Fn(SessionId, StreamEvent) + 'static) -> Self {
        Self { dispatch: Rc::new(dispatch) }
    }
}

impl StreamTransport for EventSourceTransport {
    type Connection = EventSourceConnection;

    fn connect(&mut self, url: &str, session: SessionId) -> Result<EventSourceConnection> {
        let mut source = EventSource::new(url).map_err(|e| ClientError::Stream {
            message: e.to_string(),
        })?;
        let mut messages = source.subscribe("message").map_err(|e| ClientError::Stream {
            message: e.to_string(),
        })?;

        let dispatch = self.dispatch.clone();
        let (pump, task) = abortable(async move {
            while let Some(item) = messages.next().await {
                match item {
                    Ok((_, event)) => match event.data().as_string() {
                        Some(data) => dispatch(session, StreamEvent::Message(data)),
                        None => log::warn!("{session}: ignoring non-text event"),
                    },
                    // EventSource reports both server close and network loss as an error.
                    Err(e) => {
                        dispatch(session, StreamEvent::Error(e.to_string()));
                        return;
                    }
                }
            }
            dispatch(session, StreamEvent::End);
        });
        wasm_bindgen_futures::spawn_local(async move {
            let _ = pump.await;
        });

        log::debug!("{session}: connected to {url}");
        Ok(EventSourceConnection {
            source: Some(source),
            task,
        })
    }
}

pub struct EventSourceConnection {
    source: Option<EventSource>,
    task: AbortHandle,
}

impl StreamConnection for EventSourceConnection {
    fn close(&mut self) {
        self.task.abort();
        if let Some(source) = self.source.take() {
            source.close();
        }
    }
}
