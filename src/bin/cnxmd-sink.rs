//! Debug destination for cnxmd-proxy.
//!
//! Accepts connections, strips and prints the CNXMD header, then either
//! echoes the payload back or discards it.

use clap::Parser;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use cnxmd_proxy::net::SessionId;
use cnxmd_proxy::protocol::reader::{read_header, DEFAULT_MAX_HEADER_LEN};

#[derive(Parser)]
#[command(name = "cnxmd-sink")]
#[command(about = "Prints CNXMD headers of incoming connections", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:9091")]
    bind: String,

    /// Echo the payload back to the sender instead of discarding it.
    #[arg(short, long)]
    echo: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_HEADER_LEN)]
    max_header_len: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Sink listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept");
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                continue;
            }
        };
        let id = SessionId::new();
        let echo = cli.echo;
        let max_header_len = cli.max_header_len;
        tokio::spawn(async move {
            if let Err(e) = serve(stream, &id, echo, max_header_len).await {
                tracing::warn!(session_id = %id, peer = %peer, error = %e, "Connection failed");
            }
        });
    }
}

async fn serve(
    stream: TcpStream,
    id: &SessionId,
    echo: bool,
    max_header_len: usize,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut reader = BufReader::new(stream);
    let (consumed, header) = read_header(&mut reader, max_header_len).await?;
    tracing::info!(session_id = %id, header_len = consumed, entries = header.len(), "Header received");
    for (key, value) in header.iter() {
        println!(
            "[{}] {}={}",
            id,
            String::from_utf8_lossy(key).escape_debug(),
            String::from_utf8_lossy(value).escape_debug()
        );
    }

    let bytes = if echo {
        let (mut rd, mut wr) = tokio::io::split(reader);
        let n = tokio::io::copy(&mut rd, &mut wr).await?;
        wr.shutdown().await?;
        n
    } else {
        tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?
    };
    tracing::info!(session_id = %id, bytes, "Connection closed");
    Ok(())
}
