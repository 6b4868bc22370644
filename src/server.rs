use super::*;

/// Whether to drop the connection after the reply is written.
#[derive(Debug, PartialEq)]
pub(crate) enum Disposition {
    Keep,
    Disconnect,
}

pub(crate) struct ProxyServer {
    pub(crate) sessions: Arc<Sessions>,
    pub(crate) templates: Arc<TemplateStore>,
    pub(crate) processor: ShareProcessor,
    pub(crate) share_difficulty: u64,
    pub(crate) read_timeout: Duration,
    pub(crate) max_invalid: u64,
}

impl ProxyServer {
    pub(crate) async fn serve_tcp(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let (read_half, write_half) = stream.into_split();

        let mut reader = FramedRead::new(
            read_half,
            LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE),
        );

        let writer = SessionWriter::Tcp(FramedWrite::new(
            write_half,
            LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE),
        ));

        let session = self.sessions.insert(addr, writer);

        debug!("session {} connected from {addr}", session.id);

        loop {
            let line = match timeout(self.read_timeout, reader.next()).await {
                Ok(Some(Ok(line))) => line,
                Ok(Some(Err(err))) => {
                    warn!("dropping session {} ({addr}): {err}", session.id);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    if !idle_expired(&session, self.read_timeout) {
                        continue;
                    }
                    debug!("dropping idle session {} ({addr})", session.id);
                    break;
                }
            };

            if self.dispatch(&session, addr, &line).await == Disposition::Disconnect {
                break;
            }
        }

        self.sessions.remove(session.id);

        debug!("session {} disconnected", session.id);
    }

    pub(crate) async fn serve_websocket(self: Arc<Self>, socket: WebSocket, addr: SocketAddr) {
        let (sink, mut stream) = socket.split();

        let session = self.sessions.insert(addr, SessionWriter::Ws(sink));

        debug!("websocket session {} connected from {addr}", session.id);

        loop {
            let message = match timeout(self.read_timeout, stream.next()).await {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(err))) => {
                    warn!("dropping websocket session {} ({addr}): {err}", session.id);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    if !idle_expired(&session, self.read_timeout) {
                        continue;
                    }
                    debug!("dropping idle websocket session {} ({addr})", session.id);
                    break;
                }
            };

            let line = match message {
                ws::Message::Text(text) => text,
                ws::Message::Close(_) => break,
                _ => continue,
            };

            if self.dispatch(&session, addr, &line).await == Disposition::Disconnect {
                break;
            }
        }

        self.sessions.remove(session.id);

        debug!("websocket session {} disconnected", session.id);
    }

    async fn dispatch(&self, session: &Arc<Session>, addr: SocketAddr, line: &str) -> Disposition {
        let request = match serde_json::from_str::<Request>(line) {
            Ok(request) => request,
            Err(err) => {
                warn!("malformed request from {addr}: {err}");
                return Disposition::Disconnect;
            }
        };

        session.touch();

        let (response, disposition) = self.handle_request(session, addr, request).await;

        let line = match serde_json::to_string(&response) {
            Ok(line) => line,
            Err(err) => {
                error!("failed to serialize response: {err}");
                return Disposition::Disconnect;
            }
        };

        if let Err(err) = session.writer.lock().await.send(&line).await {
            warn!("dropping session {} ({addr}): {err}", session.id);
            return Disposition::Disconnect;
        }

        disposition
    }

    async fn handle_request(
        &self,
        session: &Arc<Session>,
        addr: SocketAddr,
        request: Request,
    ) -> (Response, Disposition) {
        let Request {
            id,
            method,
            params,
            worker,
        } = request;

        if method == "eth_submitLogin" {
            return (self.submit_login(session, addr, id, params), Disposition::Keep);
        }

        let Some(login) = session.login() else {
            return (
                Response::error(id, -1, "Unauthorized"),
                Disposition::Keep,
            );
        };

        match method.as_str() {
            "eth_getWork" => (self.get_work(id), Disposition::Keep),
            "eth_submitWork" => {
                self.submit_work(session, addr, id, params, &login, &worker)
                    .await
            }
            "eth_submitHashrate" => (Response::ok(id, json!(true)), Disposition::Keep),
            _ => (
                Response::error(id, -3, "Method not found"),
                Disposition::Keep,
            ),
        }
    }

    fn submit_login(
        &self,
        session: &Arc<Session>,
        addr: SocketAddr,
        id: Id,
        params: Value,
    ) -> Response {
        let Ok(params) = serde_json::from_value::<Vec<String>>(params) else {
            return Response::error(id, -1, "Invalid params");
        };

        let Some(login) = params.first() else {
            return Response::error(id, -1, "Invalid params");
        };

        if !is_valid_login(login) {
            warn!("invalid login {login} from {addr}");
            return Response::error(id, -1, "Invalid login");
        }

        session.authorize(login.to_lowercase());

        info!("miner {login} logged in from {addr}");

        Response::ok(id, json!(true))
    }

    fn get_work(&self, id: Id) -> Response {
        match self.templates.current() {
            Some(template) => Response::ok(id, job_payload(&template, self.share_difficulty)),
            None => Response::error(id, 0, "Work not ready"),
        }
    }

    async fn submit_work(
        &self,
        session: &Arc<Session>,
        addr: SocketAddr,
        id: Id,
        params: Value,
        login: &str,
        worker: &str,
    ) -> (Response, Disposition) {
        let Ok(params) = serde_json::from_value::<Vec<String>>(params) else {
            return (
                Response::error(id, -1, "Invalid params"),
                Disposition::Keep,
            );
        };

        let worker = worker_name(worker);

        let outcome = self
            .processor
            .process(login, worker, addr, self.templates.current(), &params)
            .await;

        if outcome.counts_toward_hashrate() {
            session.record_accepted();
        } else if outcome == Outcome::Invalid {
            let run = session.record_invalid();

            if run >= self.max_invalid {
                warn!(
                    "disconnecting {login}@{addr} after {run} consecutive invalid shares"
                );
                return (
                    Response::ok(id, json!(false)),
                    Disposition::Disconnect,
                );
            }
        }

        (Response::ok(id, json!(outcome.accepted())), Disposition::Keep)
    }
}

/// Pushed jobs refresh the idle clock, so a read deadline elapsing only
/// drops sessions that have been silent on both directions.
fn idle_expired(session: &Session, read_timeout: Duration) -> bool {
    session.idle_for() >= read_timeout
}

fn worker_name(worker: &str) -> &str {
    if worker.is_empty() {
        "0"
    } else {
        worker
    }
}

fn is_valid_login(login: &str) -> bool {
    login
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
