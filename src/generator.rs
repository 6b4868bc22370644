use super::*;

/// Polls the node for work on an interval, and immediately on demand when a
/// block is accepted. New templates only fan out when the header changed.
pub(crate) fn spawn(
    upstream: Arc<Upstream>,
    templates: Arc<TemplateStore>,
    broadcaster: Arc<Broadcaster>,
    mut refresh: mpsc::Receiver<()>,
    interval: Duration,
    cancel: CancellationToken,
    tasks: &mut JoinSet<()>,
) {
    tasks.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                message = refresh.recv() => {
                    if message.is_none() {
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }

            refresh_template(&upstream, &templates, &broadcaster).await;
        }
    });
}

async fn refresh_template(
    upstream: &Upstream,
    templates: &TemplateStore,
    broadcaster: &Broadcaster,
) {
    let work = match upstream.get_work().await {
        Ok(work) => work,
        Err(err) => {
            warn!("failed to fetch work: {err:#}");
            return;
        }
    };

    let previous = templates.current();

    if let Some(previous) = &previous {
        if previous.header == work.header {
            return;
        }
    }

    let template = match BlockTemplate::next(work, previous.as_deref()) {
        Ok(template) => Arc::new(template),
        Err(err) => {
            warn!("discarding work notification: {err:#}");
            return;
        }
    };

    debug!(
        "new template at height {} difficulty {}",
        template.height, template.difficulty
    );

    templates.publish(template.clone());
    broadcaster.broadcast(Some(template)).await;
}
