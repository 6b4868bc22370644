use super::*;

/// One write half, whatever transport the miner connected over. Held behind
/// an async mutex so job pushes and request replies never interleave bytes.
pub(crate) enum SessionWriter {
    Tcp(FramedWrite<OwnedWriteHalf, LinesCodec>),
    Ws(SplitSink<WebSocket, ws::Message>),
    #[cfg(test)]
    Fake(FakeWriter),
}

impl SessionWriter {
    pub(crate) async fn send(&mut self, line: &str) -> Result {
        match self {
            Self::Tcp(framed) => framed.send(line).await.context("tcp write failed"),
            Self::Ws(sink) => sink
                .send(ws::Message::Text(line.to_owned().into()))
                .await
                .context("websocket write failed"),
            #[cfg(test)]
            Self::Fake(fake) => fake.send().await,
        }
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct FakeWriter {
    pub(crate) current: Arc<AtomicU64>,
    pub(crate) peak: Arc<AtomicU64>,
    pub(crate) sent: Arc<AtomicU64>,
    pub(crate) delay: Duration,
    pub(crate) fail: bool,
}

#[cfg(test)]
impl FakeWriter {
    async fn send(&mut self) -> Result {
        let current = self.current.fetch_add(1, atomic::Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, atomic::Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.current.fetch_sub(1, atomic::Ordering::SeqCst);

        if self.fail {
            bail!("fake writer failure");
        }

        self.sent.fetch_add(1, atomic::Ordering::SeqCst);

        Ok(())
    }
}

pub(crate) struct Session {
    pub(crate) id: u64,
    pub(crate) addr: SocketAddr,
    pub(crate) writer: tokio::sync::Mutex<SessionWriter>,
    login: RwLock<Option<String>>,
    last_active: Mutex<Instant>,
    accepted: AtomicU64,
    invalid: AtomicU64,
    consecutive_invalid: AtomicU64,
}

impl Session {
    pub(crate) fn authorize(&self, login: String) {
        *self.login.write() = Some(login);
    }

    pub(crate) fn login(&self) -> Option<String> {
        self.login.read().clone()
    }

    pub(crate) fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_active.lock().elapsed()
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, atomic::Ordering::Relaxed);
        self.consecutive_invalid.store(0, atomic::Ordering::Relaxed);
    }

    /// Returns the updated run of consecutive invalid shares, used by the
    /// anti-flood disconnect.
    pub(crate) fn record_invalid(&self) -> u64 {
        self.invalid.fetch_add(1, atomic::Ordering::Relaxed);
        self.consecutive_invalid.fetch_add(1, atomic::Ordering::Relaxed) + 1
    }

    pub(crate) fn accepted(&self) -> u64 {
        self.accepted.load(atomic::Ordering::Relaxed)
    }

    pub(crate) fn invalid(&self) -> u64 {
        self.invalid.load(atomic::Ordering::Relaxed)
    }
}

/// Live session registry. Jobs are broadcast against a point-in-time
/// snapshot so pushes never hold the map lock across writes.
#[derive(Default)]
pub(crate) struct Sessions {
    next_id: AtomicU64,
    inner: RwLock<HashMap<u64, Arc<Session>>>,
}

impl Sessions {
    pub(crate) fn insert(&self, addr: SocketAddr, writer: SessionWriter) -> Arc<Session> {
        let id = self.next_id.fetch_add(1, atomic::Ordering::Relaxed);

        let session = Arc::new(Session {
            id,
            addr,
            writer: tokio::sync::Mutex::new(writer),
            login: RwLock::new(None),
            last_active: Mutex::new(Instant::now()),
            accepted: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            consecutive_invalid: AtomicU64::new(0),
        });

        self.inner.write().insert(id, session.clone());

        session
    }

    pub(crate) fn remove(&self, id: u64) -> Option<Arc<Session>> {
        self.inner.write().remove(&id)
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Session>> {
        self.inner.read().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }
}
