//! Line based chat between two peers over TCP.
//!
//! Start one side listening, then point the other side at it.
//!
//! ```text
//! cargo run --example chat -- --listen 127.0.0.1:7878
//! cargo run --example chat -- --listen 127.0.0.1:7879 --connect 127.0.0.1:7878
//! ```
//!
//! Every line typed is sent to the peer. A few commands drive the session.
//!
//! * `/connect <address>` - Dial a peer.
//! * `/listen` - Drop the current peer and wait for a new one.
//! * `/stop` - Drop everything until the next `/listen` or `/connect`.

use clap::Parser;
use log::LevelFilter;
use peerlink_session::{
    dispatch, EventSink, Peer, Session, SessionConfiguration, SessionState, TcpTransport,
};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Local address to accept peers on.
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    listen: SocketAddr,

    /// Address of a peer to dial on startup (optional).
    #[arg(short, long)]
    connect: Option<String>,

    /// Read buffer size in bytes.
    #[arg(short, long, default_value = "1024")]
    buffer_size: usize,

    /// Log level.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Prints the conversation.
struct Console;

impl EventSink for Console {
    fn on_state_changed(&mut self, state: SessionState, peer: Option<&Peer>) {
        match (state, peer) {
            (SessionState::Connected, Some(peer)) => {
                println!("* connected to {}", peer.display_name())
            }
            (SessionState::Connected, None) => println!("* connected"),
            (SessionState::Connecting, _) => println!("* connecting..."),
            (SessionState::Listening, _) => println!("* waiting for a peer"),
            (SessionState::Idle, _) => println!("* not connected"),
        }
    }

    fn on_connect_failed(&mut self) {
        println!("* unable to connect to peer");
    }

    fn on_connection_lost(&mut self) {
        println!("* peer connection was lost");
    }

    fn on_data_received(&mut self, bytes: &[u8]) {
        println!("them: {}", String::from_utf8_lossy(bytes));
    }

    fn on_data_sent(&mut self, bytes: &[u8]) {
        println!("me:   {}", String::from_utf8_lossy(bytes));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    };

    // Configure fern logger
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} - {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log_level)
        .chain(std::io::stderr())
        .apply()?;

    let configuration = SessionConfiguration::new().with_read_buffer_size(args.buffer_size);
    log::debug!("Using {configuration}");
    let (session, events) = Session::new(TcpTransport::new(args.listen), configuration);
    dispatch(events, Console);

    session.start().await;
    if let Some(address) = args.connect {
        session.connect(Peer::new(address)).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            _ = &mut ctrl_c => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };

        match line.split_once(' ').unwrap_or((line.as_str(), "")) {
            ("/connect", address) if !address.trim().is_empty() => {
                session.connect(Peer::new(address.trim())).await
            }
            ("/listen", _) => session.start().await,
            ("/stop", _) => session.stop().await,
            _ => {
                if let Err(e) = session.write(line.as_bytes()).await {
                    log::warn!("{e}");
                }
            }
        }
    }

    session.stop().await;
    Ok(())
}
