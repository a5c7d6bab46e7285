//! twoping-wire - Inspect 2ping packets
//!
//! Decodes packets given as hex, prints the protocol's reference packets and
//! logs packets arriving on a UDP port.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use twoping::config::{self, Config};
use twoping::crypto::{verify_packet, HmacSigner};
use twoping::network::{Endpoint, NetworkError};
use twoping::protocol::{MessageId, Opcode, Packet};

/// twoping-wire - 2ping packet inspector
#[derive(Parser)]
#[command(name = "twoping-wire")]
#[command(author = "twoping Contributors")]
#[command(version)]
#[command(about = "Encode, decode and capture 2ping packets", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a packet given as hex
    Decode {
        /// Packet bytes, e.g. "32 50 2d ae 00 00 00 00 a0 01 00 00"
        hex: Vec<String>,
    },

    /// Print the protocol's reference packets
    Reference,

    /// Log every packet received on a UDP port
    Listen {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    match cli.command {
        Commands::Decode { hex } => {
            decode(&config, &hex.join(""))?;
        }
        Commands::Reference => {
            for (name, packet) in reference_packets() {
                println!("{}: {}", name, hex::encode(packet.dump()?));
            }
        }
        Commands::Listen { port } => {
            listen(config, port).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn decode(config: &Config, input: &str) -> anyhow::Result<()> {
    let data = parse_hex(input)?;
    let packet = Packet::load(&data)?;
    println!("{}", packet);

    if let Some(key) = config.hmac.key_bytes()? {
        let signer = HmacSigner::new(&key)?;
        match verify_packet(&data, &signer) {
            Ok(()) => println!("digest: ok"),
            Err(e) => println!("digest: {}", e),
        }
    }
    Ok(())
}

async fn listen(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let mut net_config = config.network.clone();
    if let Some(port) = port {
        net_config.port = port;
    }

    let mut endpoint = Endpoint::bind(net_config)
        .await?
        .with_encode_options(config.packet.encode_options());
    if let Some(key) = config.hmac.key_bytes()? {
        endpoint = endpoint.with_signer(Arc::new(HmacSigner::new(&key)?));
    }

    println!("Listening on {}, press Ctrl+C to stop.", endpoint.local_addr()?);

    loop {
        tokio::select! {
            result = endpoint.recv() => {
                match result {
                    Ok(Some((packet, addr))) => println!("{} {}", addr, packet),
                    Ok(None) => {}
                    // Already logged by the endpoint; keep listening
                    Err(NetworkError::Protocol(_)) | Err(NetworkError::Signature(_))
                    | Err(NetworkError::PacketTooLarge(..)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    let stats = endpoint.stats();
    tracing::info!(
        "Received {} packets ({} bytes), rejected {}",
        stats.packets_received,
        stats.bytes_received,
        stats.packets_rejected
    );
    Ok(())
}

/// Reference packets published with the 2ping protocol document
fn reference_packets() -> Vec<(&'static str, Packet)> {
    let id = |last: u16| {
        let [hi, lo] = last.to_be_bytes();
        MessageId::new([0, 0, 0, 0, hi, lo])
    };

    let mut packets = Vec::new();

    packets.push(("1a", Packet::new(id(0xa001))));

    let mut packet = Packet::new(id(0xa001));
    packet.opcodes.insert(Opcode::REPLY_REQUESTED, Opcode::ReplyRequested);
    packets.push(("2a", packet));

    let mut packet = Packet::new(id(0xb001));
    packet.opcodes.insert(Opcode::IN_REPLY_TO, Opcode::InReplyTo(id(0xa001)));
    packets.push(("2b", packet));

    let mut packet = Packet::new(id(0xa002));
    packet.opcodes.insert(Opcode::IN_REPLY_TO, Opcode::InReplyTo(id(0xb001)));
    packet.opcodes.insert(Opcode::RTT_ENCLOSED, Opcode::RttEnclosed { rtt_us: 12345 });
    packets.push(("3c", packet));

    let mut packet = Packet::new(id(0xa00a));
    packet.opcodes.insert(Opcode::REPLY_REQUESTED, Opcode::ReplyRequested);
    packet.opcodes.insert(
        Opcode::INVESTIGATE,
        Opcode::Investigate(vec![id(0xa001), id(0xa002)]),
    );
    packets.push(("6f", packet));

    packets
}

fn parse_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':')
        .collect();
    Ok(hex::decode(digits)?)
}
