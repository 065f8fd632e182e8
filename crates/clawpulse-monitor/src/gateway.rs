use clawpulse_core::backoff::BackoffPolicy;
use clawpulse_core::connection::{ConnectionManager, Transition};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

type GatewaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
pub enum GatewayEvent {
    Transition(Transition),
    Frame(String),
}

enum SessionEnd {
    Closed,
    Shutdown,
    ReceiverGone,
}

/// Keeps a receive-only connection to the gateway alive until `shutdown`
/// flips to true or the event receiver is dropped.
pub async fn gateway_loop(
    endpoint: Url,
    policy: BackoffPolicy,
    tx: mpsc::Sender<GatewayEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut manager = ConnectionManager::new(policy);

    loop {
        if *shutdown.borrow() {
            break;
        }
        if !emit(&tx, manager.begin_attempt()).await {
            return;
        }

        let connect = tokio::select! {
            result = connect_async(endpoint.as_str()) => result,
            _ = wait_for_shutdown(&mut shutdown) => break,
        };

        match connect {
            Ok((mut ws, _)) => {
                info!("gateway_connected: {endpoint}");
                if !emit(&tx, manager.on_open()).await {
                    return;
                }
                match read_session(&mut ws, &mut manager, &tx, &mut shutdown).await {
                    SessionEnd::Closed => {}
                    SessionEnd::Shutdown => {
                        let _ = ws.close(None).await;
                        break;
                    }
                    SessionEnd::ReceiverGone => {
                        let _ = ws.close(None).await;
                        return;
                    }
                }
            }
            Err(err) => {
                warn!("gateway_connect_error: {err}");
                if !emit(&tx, manager.on_error(&err.to_string())).await {
                    return;
                }
            }
        }

        let transition = manager.on_close();
        let wait = transition.retry_in.unwrap_or(policy.min_delay);
        info!("gateway_reconnect_scheduled: wait_ms={}", wait.as_millis());
        if !emit(&tx, transition).await {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
    }
    debug!("gateway_loop_stopped");
}

async fn read_session(
    ws: &mut GatewaySocket,
    manager: &mut ConnectionManager,
    tx: &mpsc::Sender<GatewayEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    loop {
        let next = tokio::select! {
            next = ws.next() => next,
            _ = wait_for_shutdown(shutdown) => return SessionEnd::Shutdown,
        };
        match next {
            Some(Ok(Message::Text(text))) => {
                if tx.send(GatewayEvent::Frame(text)).await.is_err() {
                    return SessionEnd::ReceiverGone;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                info!("gateway_peer_close: {frame:?}");
                return SessionEnd::Closed;
            }
            Some(Ok(Message::Binary(bytes))) => {
                debug!("gateway_binary_frame_ignored: len={}", bytes.len());
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!("gateway_read_error: {err}");
                let closed = closes_transport(&err);
                if !emit(tx, manager.on_error(&err.to_string())).await {
                    return SessionEnd::ReceiverGone;
                }
                if closed {
                    return SessionEnd::Closed;
                }
            }
            None => return SessionEnd::Closed,
        }
    }
}

/// Read errors that leave the socket usable keep the session open; the
/// manager then sits in the error state until the peer closes.
fn closes_transport(err: &WsError) -> bool {
    !matches!(err, WsError::Utf8 | WsError::Capacity(_))
}

async fn emit(tx: &mpsc::Sender<GatewayEvent>, transition: Transition) -> bool {
    tx.send(GatewayEvent::Transition(transition)).await.is_ok()
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawpulse_core::ConnectionState;
    use futures_util::SinkExt;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy {
            min_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<GatewayEvent>) -> GatewayEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event before timeout")
            .expect("gateway loop alive")
    }

    fn state_of(event: &GatewayEvent) -> Option<ConnectionState> {
        match event {
            GatewayEvent::Transition(transition) => Some(transition.state),
            GatewayEvent::Frame(_) => None,
        }
    }

    #[tokio::test]
    async fn forwards_frames_and_reconnects_after_peer_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept first");
            let mut ws = accept_async(stream).await.expect("handshake first");
            ws.send(Message::Text(r#"{"type":"heartbeat","duration":5}"#.to_string()))
                .await
                .expect("send heartbeat");
            ws.send(Message::Text("not json".to_string()))
                .await
                .expect("send garbage");
            ws.close(None).await.expect("close first");
            while let Some(Ok(_)) = ws.next().await {}

            let (stream, _) = listener.accept().await.expect("accept second");
            let mut ws = accept_async(stream).await.expect("handshake second");
            ws.send(Message::Text(r#"{"type":"agent_turn"}"#.to_string()))
                .await
                .expect("send agent turn");
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (tx, mut rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let endpoint = Url::parse(&format!("ws://{addr}/")).expect("endpoint");
        let handle = tokio::spawn(gateway_loop(endpoint, fast_policy(), tx, shutdown_rx));

        assert_eq!(state_of(&next_event(&mut rx).await), Some(ConnectionState::Connecting));
        assert_eq!(state_of(&next_event(&mut rx).await), Some(ConnectionState::Connected));
        match next_event(&mut rx).await {
            GatewayEvent::Frame(text) => assert!(text.contains("heartbeat")),
            other => panic!("expected heartbeat frame, got {other:?}"),
        }
        match next_event(&mut rx).await {
            GatewayEvent::Frame(text) => assert_eq!(text, "not json"),
            other => panic!("expected raw frame, got {other:?}"),
        }
        match next_event(&mut rx).await {
            GatewayEvent::Transition(transition) => {
                assert_eq!(transition.state, ConnectionState::Disconnected);
                assert_eq!(transition.retry_in, Some(Duration::from_millis(20)));
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert_eq!(state_of(&next_event(&mut rx).await), Some(ConnectionState::Connecting));
        assert_eq!(state_of(&next_event(&mut rx).await), Some(ConnectionState::Connected));
        match next_event(&mut rx).await {
            GatewayEvent::Frame(text) => assert!(text.contains("agent_turn")),
            other => panic!("expected agent_turn frame, got {other:?}"),
        }

        shutdown_tx.send(true).expect("signal shutdown");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop stops on shutdown")
            .expect("loop task");
    }

    #[tokio::test]
    async fn refused_connections_back_off_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let (tx, mut rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let endpoint = Url::parse(&format!("ws://{addr}/")).expect("endpoint");
        let handle = tokio::spawn(gateway_loop(endpoint, fast_policy(), tx, shutdown_rx));

        let mut waits = Vec::new();
        while waits.len() < 3 {
            let event = next_event(&mut rx).await;
            if let GatewayEvent::Transition(transition) = event {
                match transition.state {
                    ConnectionState::Disconnected => {
                        waits.push(transition.retry_in.expect("retry scheduled"));
                    }
                    ConnectionState::Connected => panic!("nothing is listening"),
                    _ => {}
                }
            }
        }
        assert_eq!(
            waits,
            vec![
                Duration::from_millis(20),
                Duration::from_millis(40),
                Duration::from_millis(80)
            ]
        );

        shutdown_tx.send(true).expect("signal shutdown");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop stops while waiting")
            .expect("loop task");
    }

    #[tokio::test]
    async fn dropped_receiver_stops_the_loop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(rx);
        let endpoint = Url::parse(&format!("ws://{addr}/")).expect("endpoint");
        tokio::time::timeout(
            Duration::from_secs(5),
            gateway_loop(endpoint, fast_policy(), tx, shutdown_rx),
        )
        .await
        .expect("loop returns once nobody listens");
    }

    #[test]
    fn utf8_and_capacity_errors_keep_the_session() {
        assert!(!closes_transport(&WsError::Utf8));
        assert!(closes_transport(&WsError::ConnectionClosed));
        assert!(closes_transport(&WsError::AlreadyClosed));
    }
}
