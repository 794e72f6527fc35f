//! Integration tests for the WebSocket transport.
//!
//! A real listener on an OS-assigned port and a real `tokio-tungstenite`
//! client, so frames actually cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use pokeduel_transport::{Connection, Incoming, Transport, WebSocketConnection, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0, connects one client, and returns both ends.
    async fn pair() -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let incoming = transport.accept().await.expect("should accept");
            incoming.upgrade().await.expect("should upgrade")
        });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive_both_ways() {
        let (server_conn, mut client) = pair().await;
        assert!(server_conn.id().into_inner() > 0);

        server_conn.send(br#"{"type":"battle-ready"}"#).await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "JSON payloads go out as text frames");
        assert_eq!(msg.into_data().as_ref(), br#"{"type":"battle-ready"}"#);

        client
            .send(Message::Text(r#"{"type":"create-room"}"#.into()))
            .await
            .unwrap();
        let received = server_conn.recv().await.unwrap().expect("frame");
        assert_eq!(received, br#"{"type":"create-room"}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_is_pending() {
        let (server_conn, mut client) = pair().await;
        let server_conn = Arc::new(server_conn);

        // A reader parked in recv() must not block a concurrent send().
        let reader = Arc::clone(&server_conn);
        let pending = tokio::spawn(async move { reader.recv().await });

        tokio::time::timeout(Duration::from_secs(2), server_conn.send(b"broadcast"))
            .await
            .expect("send must not wait for the reader")
            .unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"broadcast");

        client.send(Message::Text("reply".into())).await.unwrap();
        let got = pending.await.unwrap().unwrap();
        assert_eq!(got, Some(b"reply".to_vec()));
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (server_conn, mut client) = pair().await;
        client.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_silent_peer_does_not_block_next_accept() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        // Opens TCP and never sends the HTTP upgrade.
        let _silent = tokio::net::TcpStream::connect(addr).await.expect("tcp connect");
        let silent_peer = transport.accept().await.expect("accept silent peer");
        assert_eq!(silent_peer.peer_addr().ip(), addr.ip());

        let server = tokio::spawn(async move {
            let incoming = transport.accept().await.expect("should accept");
            incoming.upgrade().await.expect("should upgrade")
        });
        let (_client, _) = tokio::time::timeout(
            Duration::from_secs(2),
            tokio_tungstenite::connect_async(format!("ws://{addr}")),
        )
        .await
        .expect("second client must not wait on the silent one")
        .expect("client should connect");
        let conn = server.await.expect("accept task");
        assert!(conn.id().into_inner() > 0);

        // The silent peer's upgrade only ends when the caller gives up on it.
        let stalled = tokio::time::timeout(Duration::from_millis(50), silent_peer.upgrade()).await;
        assert!(stalled.is_err());
    }
}
