#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::routing::get;
use axum::Router;

use modwss_client::config::WssConfig;
use modwss_client::dispatch::{Dispatcher, ReconnectOutcome};
use modwss_core::protocol::{DeviceLoginRequest, DeviceLoginResponse, Envelope};

const CODE_REPLY: &str = r#"{"messages":[{"operation":"device-login","context":{"code":"AB12C","login_url":"https://example.io/connect","date_expires":1700000000}}]}"#;

async fn serve_socket(mut socket: WebSocket) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue; };
        if text.contains("\"hang-up\"") {
            return;
        }
        if text.contains("\"device-login\"")
            && socket.send(Message::Text(CODE_REPLY.into())).await.is_err()
        {
            return;
        }
    }
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new().route(
        "/ws",
        get(|ws: WebSocketUpgrade| async move { ws.on_upgrade(serve_socket) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn loopback_config(addr: SocketAddr) -> WssConfig {
    let mut cfg = WssConfig::for_rest_endpoint("http://127.0.0.1");
    cfg.server.wss_endpoint = Some(format!("ws://{addr}/ws"));
    cfg.validate().unwrap();
    cfg
}

#[tokio::test]
async fn device_login_round_trip_over_a_real_socket() {
    let addr = spawn_server().await;
    let d = Dispatcher::over_websocket(loopback_config(addr));

    let resp: DeviceLoginResponse = d.request(&DeviceLoginRequest::default()).await.unwrap();
    assert_eq!(resp.code, "AB12C");
    assert!(d.is_connected());

    d.disconnect().await;
    assert!(!d.is_connected());
}

#[tokio::test]
async fn server_hang_up_is_reported() {
    let addr = spawn_server().await;
    let d = Dispatcher::over_websocket(loopback_config(addr));
    let mut reports = d.disconnect_reports();

    d.send(Envelope::new("hang-up", None)).await.unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(5), reports.changed())
        .await
        .expect("no disconnect report")
        .unwrap();
    let report = reports.borrow().clone().unwrap();
    assert_eq!(report.cancelled, 0);
    assert_eq!(report.reconnect, ReconnectOutcome::NotAttempted);
    assert!(!d.is_connected());
}
