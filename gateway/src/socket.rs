// gateway/src/socket.rs
use actix::{Actor, ActorContext, AsyncContext, Handler, StreamHandler};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use common::{ClientMessage, ServerMessage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::auth::Viewer;
use crate::client_registry::{ClientRegistry, Notice};

/// Actor owning one authenticated push connection.
///
/// Registers itself with the [`ClientRegistry`] when started and removes
/// itself when stopped, whatever the reason.
pub struct ClientSocket {
    token: String,
    viewer: Viewer,
    registry: Arc<ClientRegistry>,
    client_id: Option<Uuid>,
    last_heard: Instant,
    idle_timeout: Option<Duration>,
}

impl ClientSocket {
    pub fn new(
        token: String,
        viewer: Viewer,
        registry: Arc<ClientRegistry>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            token,
            viewer,
            registry,
            client_id: None,
            last_heard: Instant::now(),
            idle_timeout,
        }
    }

    // Opt-in cutoff for peers that stop talking without closing
    fn watch_idle(&self, ctx: &mut ws::WebsocketContext<Self>, timeout: Duration) {
        let every = (timeout / 4).max(Duration::from_secs(1));
        ctx.run_interval(every, move |act, ctx| {
            if Instant::now().duration_since(act.last_heard) > timeout {
                tracing::warn!("- socket.idle: [{}] silent for {:?}", act.viewer.email, timeout);
                ctx.close(Some(ws::CloseCode::Away.into()));
                ctx.stop();
            }
        });
    }
}

impl Actor for ClientSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let id = self.registry.register(self.token.clone(), ctx.address().recipient());
        self.client_id = Some(id);
        tracing::info!(client_id = %id, "- socket.open: [{}]", self.viewer.email);

        if let Some(timeout) = self.idle_timeout {
            self.watch_idle(ctx, timeout);
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(id) = self.client_id.take() {
            self.registry.unregister(id);
        }
        tracing::info!("- socket.closed: [{}]", self.viewer.email);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ClientSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heard = Instant::now();
                ctx.pong(&msg);
            },
            Ok(ws::Message::Pong(_)) => {
                self.last_heard = Instant::now();
            },
            Ok(ws::Message::Text(text)) => {
                self.last_heard = Instant::now();

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Ping) => ctx.text(ServerMessage::Ping.to_json()),
                    Ok(ClientMessage::Unknown) => {
                        tracing::debug!("- socket.msg.ignored: [{}] {}", self.viewer.email, text);
                    },
                    Err(e) => {
                        tracing::info!("- socket.msg.err: [{}] {}", self.viewer.email, e);
                    },
                }
            },
            Ok(ws::Message::Binary(_)) => {
                self.last_heard = Instant::now();
            },
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            },
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => (),
            Err(e) => {
                tracing::warn!("- socket.error: [{}] {}", self.viewer.email, e);
                ctx.stop();
            },
        }
    }
}

impl Handler<Notice> for ClientSocket {
    type Result = ();

    fn handle(&mut self, msg: Notice, ctx: &mut Self::Context) -> Self::Result {
        match msg {
            Notice::Send(message) => ctx.text(message.to_json()),
            Notice::Disconnect => {
                ctx.close(Some(ws::CloseCode::Away.into()));
                ctx.stop();
            },
        }
    }
}

/// Upgrade an already-authorized request to a push connection
pub fn upgrade(
    req: &HttpRequest,
    stream: web::Payload,
    token: String,
    viewer: Viewer,
    registry: Arc<ClientRegistry>,
    idle_timeout: Option<Duration>,
) -> Result<HttpResponse, actix_web::Error> {
    ws::start(ClientSocket::new(token, viewer, registry, idle_timeout), req, stream)
}
