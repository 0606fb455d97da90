use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;

use system::ClientId;

use crate::error::ConnectError;
use crate::server::{RoomCommand, RoomDirectory, RoomHandle};
use crate::socket::{Outgoing, Socket};

const MAX_ROOM_NAME_LEN: usize = 64;

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(Outgoing);

struct ConnectionActor {
    room: RoomHandle,
    client_id: ClientId,
    socket: Option<Socket>,
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Outgoing>();
        let socket = self.room.pool().open(tx);
        self.room.send(RoomCommand::Connect {
            socket: socket.clone(),
            client_id: self.client_id.clone(),
        });
        let connection_id = socket.id();
        self.socket = Some(socket);

        let addr = ctx.address().recipient();

        tokio::spawn(async move {
            log::debug!("connection {} egress - started", connection_id);
            while let Some(outgoing) = rx.recv().await {
                if addr.do_send(ConnectionActorMessage(outgoing)).is_err() {
                    break;
                }
            }
            log::debug!("connection {} egress - terminated", connection_id);
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let Some(socket) = self.socket.take() {
            self.room.send(RoomCommand::Disconnect { from: socket.id() });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let from = match &self.socket {
            Some(socket) => socket.id(),
            None => return,
        };
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => {
                log::trace!("Ingress {} bytes from {}", text.len(), from);
                self.room.send(RoomCommand::Message { from, text });
            }
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ignoring {} binary bytes from {}", bin.len(), from);
            }
            Ok(ws::Message::Close(_)) => ctx.stop(),
            Err(err) => {
                log::warn!("Protocol error on connection {}: {}", from, err);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            Outgoing::Text(frame) => ctx.text(frame),
            Outgoing::Close => {
                ctx.close(None);
                ctx.stop();
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    id: Option<String>,
}

/// Room names become directory names on disk.
pub fn is_valid_room_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_ROOM_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Checks the upgrade request and picks the name of the room it belongs to.
/// The room itself is only looked up once the handshake went through.
pub fn resolve_connect(
    room: Option<&str>,
    query: ConnectQuery,
    directory: &RoomDirectory,
) -> Result<(String, ClientId), ConnectError> {
    let client_id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ConnectError::MissingId)?;
    let room = room.unwrap_or_else(|| directory.default_room());
    if !is_valid_room_name(room) {
        return Err(ConnectError::InvalidRoom);
    }
    Ok((room.to_owned(), client_id))
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<ConnectQuery>,
    directory: web::Data<RoomDirectory>,
) -> Result<HttpResponse, Error> {
    let (room_name, client_id) = resolve_connect(
        req.match_info().get("room"),
        query.into_inner(),
        directory.get_ref(),
    )
    .map_err(|err| {
        log::debug!("Rejected connection: {}", err);
        err
    })?;
    let mut res = ws::handshake(&req)?;
    let actor = ConnectionActor {
        room: directory.room(&room_name),
        client_id,
        socket: None,
    };
    Ok(res.streaming(ws::WebsocketContext::create(actor, stream)))
}
