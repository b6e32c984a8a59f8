// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use tokio::io::AsyncReadExt;

async fn one_shot_server(reply: &'static str) -> u16 {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        // Read the request to EOF, then answer.
        let mut chunk = [0u8; 256];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.len() >= 2 && serde_json::from_slice::<CommandRequest>(&buf).is_ok() {
                break;
            }
        }
        let request: CommandRequest = serde_json::from_slice(&buf).unwrap();
        assert_eq!(request.args[0], "--query_worker_state");
        ct_wire::write_reply(&mut stream, reply).await.unwrap();
    });

    port
}

#[tokio::test]
#[serial]
async fn send_round_trips_args_and_reply() {
    let port = one_shot_server("SUCCESS: unconnected").await;
    let client = DaemonClient::new(port);

    let reply = client
        .send(vec!["--query_worker_state".to_string()])
        .await
        .unwrap();
    assert_eq!(reply, "SUCCESS: unconnected");
}

#[tokio::test]
#[serial]
async fn absent_daemon_is_an_error_after_retries() {
    // Shorten the retry cycle for the test.
    std::env::set_var("CT_RETRY_DELAY_MS", "10");
    std::env::set_var("CT_CLIENT_RETRIES", "2");

    // Port 1 is essentially never bound.
    let client = DaemonClient::new(1);
    let err = client.send(vec!["--unregister".to_string()]).await.unwrap_err();
    assert!(matches!(err, ClientError::NotReachable { port: 1, .. }));

    std::env::remove_var("CT_RETRY_DELAY_MS");
    std::env::remove_var("CT_CLIENT_RETRIES");
}
