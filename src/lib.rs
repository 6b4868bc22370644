use {
    anyhow::{Context, Error, anyhow, bail, ensure},
    arguments::Arguments,
    async_trait::async_trait,
    axum::{
        Router,
        extract::{
            ConnectInfo, State, WebSocketUpgrade,
            ws::{self, WebSocket},
        },
        response::IntoResponse,
        routing::get,
    },
    broadcast::Broadcaster,
    clap::Parser,
    database::{Database, ShareStore},
    derive_more::Display,
    difficulty::{reaches, target},
    futures::{
        sink::SinkExt,
        stream::{SplitSink, StreamExt},
    },
    hasher::{Algorithm, PowHasher},
    parking_lot::{Mutex, RwLock},
    primitive_types::{U256, U512},
    reqwest::Url,
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    server::ProxyServer,
    session::{Session, SessionWriter, Sessions},
    share::{Outcome, ShareProcessor},
    sqlx::{PgPool, postgres::PgPoolOptions},
    std::{
        collections::HashMap,
        env, io,
        net::SocketAddr,
        process,
        sync::{
            Arc,
            atomic::{self, AtomicBool, AtomicU64},
        },
        time::{Duration, Instant},
    },
    stratum::{Id, JSONRPC_VERSION, JsonRpcError, PushMessage, Request, Response, job_payload},
    template::{BlockTemplate, JobDetails, TemplateStore},
    tokio::{
        net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
        runtime::Runtime,
        sync::{Semaphore, mpsc},
        task::JoinSet,
        time::{MissedTickBehavior, timeout},
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
    tracing_appender::non_blocking,
    tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt},
    upstream::{NodeRpc, Upstream, Work, parse_hex_u64},
};

mod arguments;
mod broadcast;
mod database;
mod difficulty;
mod generator;
mod hasher;
mod logs;
mod server;
mod session;
mod share;
mod signal;
mod stratum;
mod subcommand;
mod template;
mod upstream;
mod websocket;

pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;
pub const REFRESH_CHANNEL_CAPACITY: usize = 16;

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub fn main() {
    let _guard = logs::init();

    let args = Arguments::parse();

    Runtime::new()
        .expect("Failed to create tokio runtime")
        .block_on(async {
            let cancel = signal::setup_signal_handler();

            match args.run(cancel).await {
                Err(err) => {
                    eprintln!("error: {err}");

                    for (i, cause) in err.chain().skip(1).enumerate() {
                        if i == 0 {
                            eprintln!();
                            eprintln!("because:");
                        }
                        eprintln!("- {cause}");
                    }

                    if env::var_os("RUST_BACKTRACE")
                        .map(|val| val == "1")
                        .unwrap_or_default()
                    {
                        eprintln!();
                        eprintln!("{}", err.backtrace());
                    }
                    process::exit(1);
                }
                Ok(_) => {
                    process::exit(0);
                }
            }
        });
}
