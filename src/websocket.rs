use super::*;

/// Serves the `/ws` endpoint. Upgraded sockets speak the same line protocol
/// as TCP sessions, one JSON-RPC message per text frame.
pub(crate) async fn serve(
    server: Arc<ProxyServer>,
    listener: TcpListener,
    cancel: CancellationToken,
) -> Result {
    let router = Router::new()
        .route("/ws", get(upgrade))
        .with_state(server);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;

    Ok(())
}

async fn upgrade(
    upgrade: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<ProxyServer>>,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| server.serve_websocket(socket, addr))
}
