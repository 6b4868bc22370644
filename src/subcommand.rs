use super::*;

mod proxy;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    #[command(about = "Run the mining proxy")]
    Proxy(proxy::Proxy),
}

impl Subcommand {
    pub(crate) async fn run(self, cancel: CancellationToken) -> Result {
        match self {
            Self::Proxy(proxy) => proxy.run(cancel).await,
        }
    }
}
