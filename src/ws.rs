use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Recipient};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::api::auth::decode_token;
use crate::AppState;

static NEXT_SESSION_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Message)]
#[rtype(result = "()")]
struct WsMessage(pub String);

#[derive(Message)]
#[rtype(result = "()")]
struct Connect {
    user_id: i32,
    session_id: usize,
    addr: Recipient<WsMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
struct Disconnect {
    user_id: i32,
    session_id: usize,
}

/// Pushes one event to every open session of each listed user.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Notify {
    pub user_ids: Vec<i32>,
    pub event: Event,
}

#[derive(Message)]
#[rtype(result = "usize")]
pub struct SessionCount {
    pub user_id: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct Event {
    pub event: &'static str,
    pub data: serde_json::Value,
}

#[derive(Default)]
pub struct NotificationHub {
    sessions: HashMap<i32, HashMap<usize, Recipient<WsMessage>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for NotificationHub {
    type Context = actix::Context<Self>;
}

impl Handler<Connect> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Self::Context) -> Self::Result {
        self.sessions
            .entry(msg.user_id)
            .or_default()
            .insert(msg.session_id, msg.addr);
    }
}

impl Handler<Disconnect> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Self::Context) -> Self::Result {
        if let Some(user_sessions) = self.sessions.get_mut(&msg.user_id) {
            user_sessions.remove(&msg.session_id);
            if user_sessions.is_empty() {
                self.sessions.remove(&msg.user_id);
            }
        }
    }
}

impl Handler<Notify> for NotificationHub {
    type Result = ();

    fn handle(&mut self, msg: Notify, _: &mut Self::Context) -> Self::Result {
        let Ok(payload) = serde_json::to_string(&msg.event) else {
            return;
        };
        for user_id in msg.user_ids {
            if let Some(user_sessions) = self.sessions.get(&user_id) {
                for addr in user_sessions.values() {
                    addr.do_send(WsMessage(payload.clone()));
                }
            }
        }
    }
}

impl Handler<SessionCount> for NotificationHub {
    type Result = usize;

    fn handle(&mut self, msg: SessionCount, _: &mut Self::Context) -> Self::Result {
        self.sessions.get(&msg.user_id).map_or(0, HashMap::len)
    }
}

struct WsSession {
    user_id: i32,
    session_id: usize,
    hub: actix::Addr<NotificationHub>,
}

impl WsSession {
    fn new(user_id: i32, hub: actix::Addr<NotificationHub>) -> Self {
        Self {
            user_id,
            session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            hub,
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hub.do_send(Connect {
            user_id: self.user_id,
            session_id: self.session_id,
            addr: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        self.hub.do_send(Disconnect {
            user_id: self.user_id,
            session_id: self.session_id,
        });
    }
}

impl Handler<WsMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: WsMessage, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

impl actix::StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match item {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(_) => ctx.stop(),
        }
    }
}

#[derive(Deserialize)]
struct WsQuery {
    token: String,
}

pub async fn notifications_ws(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let token = serde_urlencoded::from_str::<WsQuery>(req.query_string())
        .ok()
        .map(|q| q.token)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return Err(crate::error::ApiError::Unauthorized("missing token").into());
    };

    let user = decode_token(&state.config.jwt_secret, &token)?;
    ws::start(WsSession::new(user.id, state.hub.clone()), &req, stream)
}

/// Fire-and-forget; users without open sessions simply miss the event.
pub fn notify(hub: &actix::Addr<NotificationHub>, user_ids: Vec<i32>, event: &'static str, data: serde_json::Value) {
    if user_ids.is_empty() {
        return;
    }
    hub.do_send(Notify {
        user_ids,
        event: Event { event, data },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::Addr;
    use serde_json::json;

    #[derive(Default)]
    struct Inbox {
        received: Vec<String>,
    }

    impl Actor for Inbox {
        type Context = actix::Context<Self>;
    }

    impl Handler<WsMessage> for Inbox {
        type Result = ();

        fn handle(&mut self, msg: WsMessage, _: &mut Self::Context) -> Self::Result {
            self.received.push(msg.0);
        }
    }

    #[derive(Message)]
    #[rtype(result = "Vec<String>")]
    struct Drain;

    impl Handler<Drain> for Inbox {
        type Result = Vec<String>;

        fn handle(&mut self, _: Drain, _: &mut Self::Context) -> Self::Result {
            std::mem::take(&mut self.received)
        }
    }

    async fn sessions_of(hub: &Addr<NotificationHub>, user_id: i32) -> usize {
        hub.send(SessionCount { user_id }).await.expect("hub alive")
    }

    #[actix_web::test]
    async fn hub_tracks_sessions_and_fans_out() {
        let hub = NotificationHub::new().start();
        let inbox = Inbox::default().start();

        for session_id in [1, 2] {
            hub.send(Connect {
                user_id: 7,
                session_id,
                addr: inbox.clone().recipient(),
            })
            .await
            .expect("connect");
        }
        assert_eq!(sessions_of(&hub, 7).await, 2);
        assert_eq!(sessions_of(&hub, 8).await, 0);

        hub.send(Notify {
            user_ids: vec![7, 8],
            event: Event {
                event: "meeting.scheduled",
                data: json!({ "meeting_id": 3 }),
            },
        })
        .await
        .expect("notify");

        let received = inbox.send(Drain).await.expect("drain");
        assert_eq!(received.len(), 2);
        let event: serde_json::Value = serde_json::from_str(&received[0]).expect("json event");
        assert_eq!(event["event"], json!("meeting.scheduled"));
        assert_eq!(event["data"]["meeting_id"], json!(3));

        hub.send(Disconnect { user_id: 7, session_id: 1 }).await.expect("disconnect");
        assert_eq!(sessions_of(&hub, 7).await, 1);
        hub.send(Disconnect { user_id: 7, session_id: 2 }).await.expect("disconnect");
        assert_eq!(sessions_of(&hub, 7).await, 0);
    }
}
