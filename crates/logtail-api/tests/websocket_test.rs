// Transport tests against an in-process WebSocket server.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use logtail_api::{
    CloseCode, ConnectionId, TransportEvent, TransportNotice, WsConnection, endpoint_url,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn next_notice(rx: &mut mpsc::UnboundedReceiver<TransportNotice>) -> TransportNotice {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a transport notice")
        .expect("notice channel closed")
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_open_receive_send_and_close() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::text(
            r##"{"_status":"ok","_type":"channel_list","channels":["#rust"]}"##,
        ))
        .await
        .unwrap();

        // First frame from the client is its listen request.
        let request = loop {
            if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                break text.as_str().to_owned();
            }
        };

        // Drain until the client's close handshake completes.
        let mut close_code = None;
        while let Some(Ok(frame)) = ws.next().await {
            if let Message::Close(Some(cf)) = frame {
                close_code = Some(u16::from(cf.code));
            }
        }
        (request, close_code)
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let url = endpoint_url("ws", "127.0.0.1", port, "/").unwrap();
    let id = ConnectionId::new(1);
    let mut conn = WsConnection::connect(url, id, tx);

    let opened = next_notice(&mut rx).await;
    assert_eq!(opened.id, id);
    assert_eq!(opened.event, TransportEvent::Opened);

    let message = next_notice(&mut rx).await;
    assert_eq!(
        message.event,
        TransportEvent::Message(
            r##"{"_status":"ok","_type":"channel_list","channels":["#rust"]}"##.into()
        )
    );

    conn.send_text(r##"{"_type":"listen_request","channels":["#rust"]}"##.into())
        .unwrap();
    conn.close(CloseCode::NORMAL);

    let closed = next_notice(&mut rx).await;
    assert_eq!(closed.id, id);
    assert!(
        matches!(closed.event, TransportEvent::Closed { code, .. } if code == CloseCode::NORMAL),
        "unexpected terminal event: {:?}",
        closed.event
    );

    let (request, close_code) = server.await.unwrap();
    assert_eq!(request, r##"{"_type":"listen_request","channels":["#rust"]}"##);
    assert_eq!(close_code, Some(1000));
}

#[tokio::test]
async fn test_server_close_reports_server_code() {
    let (listener, port) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
            code: 1001.into(),
            reason: String::from("restarting").into(),
        }))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let url = endpoint_url("ws", "127.0.0.1", port, "/").unwrap();
    let _conn = WsConnection::connect(url, ConnectionId::new(2), tx);

    assert_eq!(next_notice(&mut rx).await.event, TransportEvent::Opened);
    let closed = next_notice(&mut rx).await;
    assert_eq!(
        closed.event,
        TransportEvent::Closed {
            code: CloseCode::GOING_AWAY,
            reason: "restarting".into(),
        }
    );
}

#[tokio::test]
async fn test_refused_connection_fails() {
    let (listener, port) = bind().await;
    drop(listener);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let url = endpoint_url("ws", "127.0.0.1", port, "/").unwrap();
    let _conn = WsConnection::connect(url, ConnectionId::new(3), tx);

    let notice = next_notice(&mut rx).await;
    assert_eq!(notice.id, ConnectionId::new(3));
    assert!(
        matches!(notice.event, TransportEvent::Failed { .. }),
        "expected failure, got {:?}",
        notice.event
    );
}
