use super::*;

mod proxy_config;

use proxy_config::ProxyConfig;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
pub(crate) struct Proxy {
    #[command(flatten)]
    config: ProxyConfig,
}

impl Proxy {
    pub(crate) async fn run(self, cancel: CancellationToken) -> Result {
        let config = self.config;

        let upstream = Arc::new(Upstream::new(
            config.node_url(),
            config.node_timeout(),
            config.max_fails(),
        )?);

        let database = Arc::new(Database::connect(config.database_url()).await?);

        let sessions = Arc::new(Sessions::default());
        let templates = Arc::new(TemplateStore::default());

        let broadcaster = Arc::new(Broadcaster::new(
            sessions.clone(),
            config.broadcast_budget(),
            config.write_timeout(),
            config.difficulty(),
            upstream.sick_handle(),
        ));

        let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);

        let processor = ShareProcessor::new(
            PowHasher::new(config.algorithm(), config.personalization()),
            config.difficulty(),
            config.hashrate_window(),
            upstream.clone(),
            database.clone(),
            refresh_tx,
        );

        let server = Arc::new(ProxyServer {
            sessions: sessions.clone(),
            templates: templates.clone(),
            processor,
            share_difficulty: config.difficulty(),
            read_timeout: config.read_timeout(),
            max_invalid: config.max_invalid(),
        });

        let mut tasks = JoinSet::new();

        generator::spawn(
            upstream.clone(),
            templates.clone(),
            broadcaster.clone(),
            refresh_rx,
            config.update_interval(),
            cancel.clone(),
            &mut tasks,
        );

        let endpoint = format!("{}:{}", config.address(), config.port());
        let listener = TcpListener::bind(&endpoint).await?;

        info!(
            "listening for {:?} miners on {endpoint} at difficulty {}",
            config.algorithm(),
            config.difficulty()
        );

        {
            let server = server.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        accepted = listener.accept() => match accepted {
                            Ok((stream, addr)) => {
                                tokio::spawn(server.clone().serve_tcp(stream, addr));
                            }
                            Err(err) => {
                                warn!("failed to accept connection: {err}");
                            }
                        }
                    }
                }
            });
        }

        if let Some(ws_port) = config.ws_port() {
            let endpoint = format!("{}:{ws_port}", config.address());
            let listener = TcpListener::bind(&endpoint).await?;

            info!("listening for websocket miners on {endpoint}");

            let server = server.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                if let Err(err) = websocket::serve(server, listener, cancel).await {
                    error!("websocket server failed: {err:#}");
                }
            });
        }

        {
            let database = database.clone();
            let sessions = sessions.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            debug!("{} sessions connected", sessions.len());

                            match database.prune_expired().await {
                                Ok(0) => {}
                                Ok(pruned) => debug!("pruned {pruned} expired shares"),
                                Err(err) => warn!("failed to prune shares: {err:#}"),
                            }
                        }
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = tasks.join_next() => match result {
                    Some(Err(err)) if !err.is_cancelled() => {
                        error!("task failed: {err}");
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }

        tasks.shutdown().await;

        info!("proxy shut down");

        Ok(())
    }
}
