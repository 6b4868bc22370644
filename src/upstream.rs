use super::*;

/// Work notification from the node, decoded from the four-element
/// `eth_getWork` result `[header, seed, difficultyHex, heightHex]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Work {
    pub(crate) header: String,
    pub(crate) seed: String,
    pub(crate) difficulty: U256,
    pub(crate) height: u64,
}

impl Work {
    pub(crate) fn from_params(params: &[String]) -> Result<Self> {
        ensure!(
            params.len() >= 4,
            "getwork returned {} fields, expected 4",
            params.len()
        );

        let difficulty = parse_hex_u256(&params[2]).context("malformed difficulty")?;
        let height = parse_hex_u64(&params[3]).context("malformed height")?;

        ensure!(!difficulty.is_zero(), "getwork difficulty is zero");

        Ok(Self {
            header: params[0].clone(),
            seed: params[1].clone(),
            difficulty,
            height,
        })
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

pub(crate) fn parse_hex_u256(s: &str) -> Result<U256> {
    Ok(U256::from_str_radix(strip_hex_prefix(s), 16)?)
}

pub(crate) fn parse_hex_u64(s: &str) -> Result<u64> {
    Ok(u64::from_str_radix(strip_hex_prefix(s), 16)?)
}

/// Upstream node RPC surface. Split out as a trait so the share pipeline can
/// be driven in tests without a node.
#[async_trait]
pub(crate) trait NodeRpc: Send + Sync {
    async fn get_work(&self) -> Result<Work>;

    async fn submit_block(&self, params: &[String]) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct RpcReply {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC client for the upstream node. Tracks consecutive failures and
/// flips the shared sick flag once `max_fails` is reached; any success heals
/// it.
pub(crate) struct Upstream {
    client: reqwest::Client,
    url: Url,
    max_fails: u64,
    fails: AtomicU64,
    sick: Arc<AtomicBool>,
    request_id: AtomicU64,
}

impl Upstream {
    pub(crate) fn new(url: Url, timeout: Duration, max_fails: u64) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url,
            max_fails,
            fails: AtomicU64::new(0),
            sick: Arc::new(AtomicBool::new(false)),
            request_id: AtomicU64::new(0),
        })
    }

    pub(crate) fn sick_handle(&self) -> Arc<AtomicBool> {
        self.sick.clone()
    }

    pub(crate) fn is_sick(&self) -> bool {
        self.sick.load(atomic::Ordering::Relaxed)
    }

    fn mark_success(&self) {
        self.fails.store(0, atomic::Ordering::Relaxed);

        if self.sick.swap(false, atomic::Ordering::Relaxed) {
            info!("upstream {} recovered", self.url);
        }
    }

    fn mark_failure(&self) {
        let fails = self.fails.fetch_add(1, atomic::Ordering::Relaxed) + 1;

        if fails >= self.max_fails && !self.sick.swap(true, atomic::Ordering::Relaxed) {
            error!("upstream {} marked sick after {fails} consecutive failures", self.url);
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, atomic::Ordering::Relaxed);

        let result = self
            .client
            .post(self.url.clone())
            .json(&json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await;

        let reply = match result {
            Ok(response) => match response.error_for_status() {
                Ok(response) => response.json::<RpcReply>().await,
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        match reply {
            Ok(reply) => {
                self.mark_success();

                if let Some(error) = reply.error {
                    bail!("{method} failed: {} ({})", error.message, error.code);
                }

                reply.result.ok_or_else(|| anyhow!("{method} returned no result"))
            }
            Err(err) => {
                self.mark_failure();
                Err(err).context(format!("{method} request failed"))
            }
        }
    }
}

#[async_trait]
impl NodeRpc for Upstream {
    async fn get_work(&self) -> Result<Work> {
        let params = serde_json::from_value::<Vec<String>>(self.call("eth_getWork", json!([])).await?)
            .context("malformed getwork result")?;

        Work::from_params(&params)
    }

    async fn submit_block(&self, params: &[String]) -> Result<bool> {
        let result = self.call("eth_submitWork", json!(params)).await?;

        serde_json::from_value(result).context("malformed submitwork result")
    }
}
