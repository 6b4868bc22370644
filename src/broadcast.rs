use super::*;

/// Pushes new jobs to every live session with a bounded number of writes in
/// flight. Sessions whose writes fail or time out are evicted.
pub(crate) struct Broadcaster {
    sessions: Arc<Sessions>,
    budget: Arc<Semaphore>,
    write_timeout: Duration,
    share_difficulty: u64,
    sick: Arc<AtomicBool>,
}

impl Broadcaster {
    pub(crate) fn new(
        sessions: Arc<Sessions>,
        budget: usize,
        write_timeout: Duration,
        share_difficulty: u64,
        sick: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sessions,
            budget: Arc::new(Semaphore::new(budget)),
            write_timeout,
            share_difficulty,
            sick,
        }
    }

    /// Returns the number of sessions the job was delivered to.
    pub(crate) async fn broadcast(&self, template: Option<Arc<BlockTemplate>>) -> usize {
        let Some(template) = template else {
            return 0;
        };

        if template.header.is_empty() || self.sick.load(atomic::Ordering::Relaxed) {
            return 0;
        }

        let message = PushMessage::new(job_payload(&template, self.share_difficulty));

        let line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(err) => {
                error!("failed to serialize job push: {err}");
                return 0;
            }
        };

        let snapshot = self.sessions.snapshot();

        if snapshot.is_empty() {
            return 0;
        }

        let start = Instant::now();
        let mut tasks = JoinSet::new();

        for session in snapshot {
            let permit = match self.budget.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let sessions = self.sessions.clone();
            let line = line.clone();
            let write_timeout = self.write_timeout;

            tasks.spawn(async move {
                let _permit = permit;

                let result = {
                    let mut writer = session.writer.lock().await;
                    timeout(write_timeout, writer.send(&line)).await
                };

                match result {
                    Ok(Ok(())) => {
                        session.touch();
                        true
                    }
                    Ok(Err(err)) => {
                        warn!("evicting session {} ({}): {err}", session.id, session.addr);
                        sessions.remove(session.id);
                        false
                    }
                    Err(_) => {
                        warn!(
                            "evicting session {} ({}): job push timed out",
                            session.id, session.addr
                        );
                        sessions.remove(session.id);
                        false
                    }
                }
            });
        }

        let mut delivered = 0;

        while let Some(result) = tasks.join_next().await {
            if matches!(result, Ok(true)) {
                delivered += 1;
            }
        }

        info!(
            "broadcast height {} to {delivered} sessions in {}ms",
            template.height,
            start.elapsed().as_millis()
        );

        delivered
    }
}
