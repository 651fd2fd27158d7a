// gateway/tests/socket.rs
mod support;

use actix_web::{App, HttpServer};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use support::{harness, Harness};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Run the gateway on an ephemeral port
fn serve(h: &Harness) -> (String, actix_web::dev::ServerHandle) {
    let data = h.gateway.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(gateway::middleware::RequestLog)
            .configure(gateway::api::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0].to_string();
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    (addr, handle)
}

async fn open_socket(addr: &str, token: &str) -> Result<Socket, tokio_tungstenite::tungstenite::Error> {
    let mut request = format!("ws://{}/ws", addr).into_client_request()?;
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {}", token).parse().unwrap());
    connect_async(request).await.map(|(socket, _)| socket)
}

/// Next text frame as JSON, skipping control frames
async fn next_json(socket: &mut Socket) -> Value {
    let read = async {
        while let Some(frame) = socket.next().await {
            if let Message::Text(text) = frame.unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
        panic!("socket closed");
    };
    tokio::time::timeout(Duration::from_secs(5), read).await.unwrap()
}

async fn wait_for_clients(h: &Harness, count: usize) {
    for _ in 0..100 {
        if h.gateway.clients.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {} client(s), found {}", count, h.gateway.clients.len());
}

#[actix_web::test]
async fn test_socket_requires_session() {
    let h = harness(HashMap::new());
    let (addr, handle) = serve(&h);

    assert!(open_socket(&addr, "garbage").await.is_err());
    assert!(h.gateway.clients.is_empty());

    handle.stop(false).await;
}

#[actix_web::test]
async fn test_ping_ack_and_refresh() {
    let h = harness(HashMap::new());
    let (addr, handle) = serve(&h);
    let token = h.token();

    let mut socket = open_socket(&addr, &token).await.unwrap();
    wait_for_clients(&h, 1).await;

    socket.send(Message::Text(r#"{"type":"ping"}"#.to_string())).await.unwrap();
    assert_eq!(next_json(&mut socket).await, json!({"type": "ping"}));

    // Commands are acked on the issuing client's socket
    let response = reqwest::Client::new()
        .post(format!("http://{}/command", addr))
        .bearer_auth(&token)
        .json(&json!({"cmd": "install", "id": "proc:gl:unknown"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(next_json(&mut socket).await, json!({"type": "ack", "command": "install"}));

    assert_eq!(h.gateway.clients.broadcast_refresh(), 1);
    assert_eq!(next_json(&mut socket).await, json!({"type": "refresh"}));

    socket.close(None).await.unwrap();
    wait_for_clients(&h, 0).await;

    handle.stop(false).await;
}

#[actix_web::test]
async fn test_teardown_closes_sockets() {
    let h = harness(HashMap::new());
    let (addr, handle) = serve(&h);

    let mut socket = open_socket(&addr, &h.token()).await.unwrap();
    wait_for_clients(&h, 1).await;

    h.gateway.clients.teardown();
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(frame) = socket.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(_) => continue,
            }
        }
        true
    })
    .await
    .unwrap();
    assert!(closed);

    handle.stop(false).await;
}
