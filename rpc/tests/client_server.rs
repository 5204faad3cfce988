//! Client tests against an in-process WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use jamscan_rpc::{ClientConfig, ConnectionState, ReconnectPolicy, RpcClient, SessionEvent};

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}", listener.local_addr().expect("local addr"));
    (listener, url)
}

fn fast_config() -> ClientConfig {
    ClientConfig {
        call_timeout: Duration::from_millis(500),
        subscription_buffer: 64,
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            max_attempts: 5,
        },
    }
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.expect("accept");
    accept_async(stream).await.expect("handshake")
}

async fn read_request(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let msg = ws.next().await.expect("frame").expect("frame ok");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("json");
        }
    }
}

async fn respond(ws: &mut WebSocketStream<TcpStream>, id: &Value, result: Value) {
    let reply = json!({"jsonrpc": "2.0", "id": id, "result": result});
    ws.send(Message::Text(reply.to_string())).await.expect("send");
}

#[tokio::test]
async fn call_resolves_with_matching_response() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let request = read_request(&mut ws).await;
        assert_eq!(request["method"], "jam.GetState");
        assert_eq!(request["params"], json!(["0xabc"]));
        respond(&mut ws, &request["id"], json!({"services": 2})).await;
    });

    let (client, _events) = RpcClient::connect(&url, fast_config()).await.unwrap();
    let result = client.call("jam.GetState", json!(["0xabc"])).await.unwrap();
    assert_eq!(result, json!({"services": 2}));

    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn error_response_surfaces_as_rpc_error() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let request = read_request(&mut ws).await;
        let reply = json!({
            "jsonrpc": "2.0",
            "id": request["id"].clone(),
            "error": {"code": -32601, "message": "method not found"}
        });
        ws.send(Message::Text(reply.to_string())).await.unwrap();
    });

    let (client, _events) = RpcClient::connect(&url, fast_config()).await.unwrap();
    let err = client.call("jam.Bogus", json!([])).await.unwrap_err();
    match err {
        jamscan_rpc::RpcClientError::Rpc { code, message } => {
            assert_eq!(code, -32601);
            assert_eq!(message, "method not found");
        }
        other => panic!("expected Rpc error, got {other:?}"),
    }

    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn silent_server_times_the_call_out() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let _request = read_request(&mut ws).await;
        // Never respond; hold the socket open.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _events) = RpcClient::connect(&url, fast_config()).await.unwrap();
    let err = client.call("jam.GetState", json!(["0xdd"])).await.unwrap_err();
    assert!(matches!(
        err,
        jamscan_rpc::RpcClientError::Timeout { ref method } if method == "jam.GetState"
    ));

    client.close().await;
    server.abort();
}

#[tokio::test]
async fn cancel_pending_resolves_in_flight_calls() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let _request = read_request(&mut ws).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut config = fast_config();
    config.call_timeout = Duration::from_secs(30);
    let (client, _events) = RpcClient::connect(&url, config).await.unwrap();
    let client = std::sync::Arc::new(client);

    let caller = {
        let client = std::sync::Arc::clone(&client);
        tokio::spawn(async move { client.call("jam.GetState", json!(["0xee"])).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.cancel_pending();

    let outcome = caller.await.unwrap();
    assert!(matches!(outcome, Err(jamscan_rpc::RpcClientError::Cancelled)));

    client.shutdown();
    server.abort();
}

#[tokio::test]
async fn notifications_route_by_topic_in_order() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let request = read_request(&mut ws).await;
        assert_eq!(request["method"], "jam.Subscribe");
        assert_eq!(request["params"], json!(["jam.NewBlock"]));
        respond(&mut ws, &request["id"], json!(true)).await;

        for n in 1..=3 {
            let notification = json!({
                "jsonrpc": "2.0",
                "method": "jam.NewBlock",
                "params": {"seq": n}
            });
            ws.send(Message::Text(notification.to_string())).await.unwrap();
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _events) = RpcClient::connect(&url, fast_config()).await.unwrap();
    let mut notifications = client.subscribe("jam.NewBlock").await.unwrap();

    for n in 1..=3 {
        let params = notifications.recv().await.expect("notification");
        assert_eq!(params, json!({"seq": n}));
    }

    client.shutdown();
    server.abort();
}

#[tokio::test]
async fn unsubscribe_ends_the_notification_channel() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        // Ack subscribe and unsubscribe alike.
        for _ in 0..2 {
            let request = read_request(&mut ws).await;
            respond(&mut ws, &request["id"], json!(true)).await;
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _events) = RpcClient::connect(&url, fast_config()).await.unwrap();
    let mut notifications = client.subscribe("jam.NewBlock").await.unwrap();
    client.unsubscribe("jam.NewBlock").await.unwrap();

    assert!(notifications.recv().await.is_none());

    client.shutdown();
    server.abort();
}

#[tokio::test]
async fn connect_to_unreachable_endpoint_fails_fast() {
    let (listener, url) = bind().await;
    drop(listener);

    let result = RpcClient::connect(&url, fast_config()).await;
    assert!(matches!(
        result,
        Err(jamscan_rpc::RpcClientError::Connection(_))
    ));
}

#[tokio::test]
async fn send_after_shutdown_is_not_connected() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _events) = RpcClient::connect(&url, fast_config()).await.unwrap();
    client.shutdown();

    let mut state = client.state();
    state
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await
        .unwrap();

    let err = client.call("jam.GetState", json!([])).await.unwrap_err();
    assert!(matches!(err, jamscan_rpc::RpcClientError::NotConnected));

    server.abort();
}

#[tokio::test]
async fn dropped_connection_reconnects_and_reopens() {
    let (listener, url) = bind().await;

    let (done_tx, mut done_rx) = mpsc::channel::<()>(1);
    let server = tokio::spawn(async move {
        // First connection: accept, then drop immediately.
        let ws = accept(&listener).await;
        drop(ws);

        // Second connection: stay up and answer one call.
        let mut ws = accept(&listener).await;
        let request = read_request(&mut ws).await;
        respond(&mut ws, &request["id"], json!("pong")).await;
        let _ = done_tx.send(()).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, mut events) = RpcClient::connect(&url, fast_config()).await.unwrap();

    assert_eq!(events.recv().await, Some(SessionEvent::Opened));
    // The reconnect produces a second Opened.
    assert_eq!(events.recv().await, Some(SessionEvent::Opened));

    let result = client.call("jam.Ping", json!([])).await.unwrap();
    assert_eq!(result, json!("pong"));
    done_rx.recv().await;

    client.shutdown();
    server.abort();
}

#[tokio::test]
async fn reconnect_gives_up_after_max_attempts() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let ws = accept(&listener).await;
        drop(ws);
        drop(listener); // no further connections possible
    });

    let (client, mut events) = RpcClient::connect(&url, fast_config()).await.unwrap();
    assert_eq!(events.recv().await, Some(SessionEvent::Opened));
    assert_eq!(events.recv().await, Some(SessionEvent::Exhausted));

    let mut state = client.state();
    state
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await
        .unwrap();

    server.await.unwrap();
}
