use super::*;

#[derive(Clone, Debug, Parser)]
pub(crate) struct ProxyConfig {
    #[arg(help = "Upstream node JSON-RPC <NODE_URL>.")]
    node_url: Url,
    #[arg(long, env = "DATABASE_URL", help = "Connect to Postgres at <DATABASE_URL>.")]
    database_url: String,
    #[arg(long, value_enum, default_value = "ethash", help = "Proof-of-work <ALGORITHM>.")]
    algorithm: Algorithm,
    #[arg(
        long,
        help = "Personalization string for the scrypt algorithm.",
        default_value = ""
    )]
    personalization: String,
    #[arg(
        long,
        help = "Static share difficulty.",
        value_parser = clap::value_parser!(u64).range(1..),
        default_value = "2000"
    )]
    difficulty: u64,
    #[arg(long, help = "Listen at <ADDRESS> for miners.")]
    address: Option<String>,
    #[arg(long, help = "Listen on <PORT> for stratum TCP miners.")]
    port: Option<u16>,
    #[arg(long, help = "Serve websocket miners on <WS_PORT>. Disabled if not set.")]
    ws_port: Option<u16>,
    #[arg(long, help = "Node request timeout in seconds.", default_value = "5")]
    node_timeout: u64,
    #[arg(
        long,
        help = "Mark the node sick after <MAX_FAILS> consecutive failures.",
        default_value = "5"
    )]
    max_fails: u64,
    #[arg(long, help = "Work polling interval in seconds.", default_value = "2")]
    update_interval: u64,
    #[arg(
        long,
        help = "Shares count toward hashrate for <HASHRATE_WINDOW> seconds.",
        default_value = "600"
    )]
    hashrate_window: u64,
    #[arg(
        long,
        help = "Maximum concurrent job-push writes.",
        value_parser = clap::value_parser!(u64).range(1..),
        default_value = "1024"
    )]
    broadcast_budget: u64,
    #[arg(long, help = "Per-session write timeout in seconds.", default_value = "10")]
    write_timeout: u64,
    #[arg(
        long,
        help = "Disconnect sessions idle for <READ_TIMEOUT> seconds.",
        default_value = "600"
    )]
    read_timeout: u64,
    #[arg(
        long,
        help = "Disconnect after <MAX_INVALID> consecutive invalid shares.",
        default_value = "25"
    )]
    max_invalid: u64,
}

impl ProxyConfig {
    pub(crate) fn node_url(&self) -> Url {
        self.node_url.clone()
    }

    pub(crate) fn database_url(&self) -> &str {
        &self.database_url
    }

    pub(crate) fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn personalization(&self) -> &str {
        &self.personalization
    }

    pub(crate) fn difficulty(&self) -> u64 {
        self.difficulty
    }

    pub(crate) fn address(&self) -> String {
        self.address.clone().unwrap_or_else(|| "0.0.0.0".into())
    }

    pub(crate) fn port(&self) -> u16 {
        self.port.unwrap_or(8008)
    }

    pub(crate) fn ws_port(&self) -> Option<u16> {
        self.ws_port
    }

    pub(crate) fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout)
    }

    pub(crate) fn max_fails(&self) -> u64 {
        self.max_fails
    }

    pub(crate) fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    pub(crate) fn hashrate_window(&self) -> Duration {
        Duration::from_secs(self.hashrate_window)
    }

    pub(crate) fn broadcast_budget(&self) -> usize {
        usize::try_from(self.broadcast_budget).unwrap_or(usize::MAX)
    }

    pub(crate) fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    pub(crate) fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub(crate) fn max_invalid(&self) -> u64 {
        self.max_invalid
    }
}
