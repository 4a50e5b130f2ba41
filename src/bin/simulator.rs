use clap::{App, Arg};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time;
use tracing::{error, info, warn};
use twimodule::modules::Module;
use twimodule::sim::bridge::{Bridge, ModuleKind, SlaveConfig};
use twimodule::sim::SimTwi;

const DEFAULT_PORT: &str = "8090";
const DEFAULT_MODULE: &str = "horn";
/// One control cycle per tick of the 1 kHz tick source.
const CYCLE: Duration = Duration::from_millis(1);

type SharedBridge = Arc<Mutex<Bridge<dyn Module + Send>>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("twimodule-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Simulated two-wire module served over TCP")
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("TCP port for bus master connections")
                .takes_value(true)
                .default_value(DEFAULT_PORT),
        )
        .arg(
            Arg::with_name("module")
                .short("m")
                .long("module")
                .value_name("KIND")
                .help("Module type to simulate")
                .takes_value(true)
                .possible_values(&ModuleKind::NAMES)
                .default_value(DEFAULT_MODULE),
        )
        .arg(
            Arg::with_name("address")
                .short("a")
                .long("address")
                .value_name("ADDRESS")
                .help("Bus address of the module")
                .takes_value(true)
                .default_value("32"),
        )
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .long("timeout")
                .value_name("TICKS")
                .help("Connection timeout in ticks")
                .takes_value(true)
                .default_value("1000"),
        )
        .arg(
            Arg::with_name("id")
                .long("id")
                .value_name("ID")
                .help("Module id register value")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("name")
                .long("name")
                .value_name("NAME")
                .help("Module name, at most 8 bytes")
                .takes_value(true)
                .default_value(""),
        )
        .get_matches();

    let port: u16 = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse()?;
    let kind: ModuleKind = matches.value_of("module").unwrap_or(DEFAULT_MODULE).parse()?;
    let config = SlaveConfig {
        address: matches.value_of("address").unwrap_or("32").parse()?,
        timeout: matches.value_of("timeout").unwrap_or("1000").parse()?,
        id: matches.value_of("id").unwrap_or("0").parse()?,
        name: matches.value_of("name").unwrap_or_default().to_string(),
    };

    println!("🔌 Two-wire module simulator");
    println!("============================");

    let twi = SimTwi::new();
    let module = kind.build(twi.clone(), &config);
    let bridge: SharedBridge = Arc::new(Mutex::new(Bridge::new(twi, module)));
    info!(?kind, address = config.address, timeout = config.timeout, "module ready");

    let server_bridge = Arc::clone(&bridge);
    let server = tokio::spawn(async move {
        if let Err(e) = serve(server_bridge, port).await {
            error!("TCP server error: {}", e);
        }
    });

    let mut interval = time::interval(CYCLE);
    let mut was_connected = false;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let connected = {
                    let mut guard = bridge.lock().await;
                    guard.step();
                    guard.module().connected()
                };
                if connected != was_connected {
                    was_connected = connected;
                    info!(connected, "master link changed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    server.abort();
    println!("🛑 Simulator stopped");
    Ok(())
}

async fn serve(bridge: SharedBridge, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("🌐 Listening for bus masters on port {}", port);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 Master connected: {}", addr);
                let client_bridge = Arc::clone(&bridge);
                tokio::spawn(async move {
                    if let Err(e) = handle_master(stream, client_bridge).await {
                        warn!("Master {} error: {}", addr, e);
                    }
                    info!("Master {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_master(
    stream: TcpStream,
    bridge: SharedBridge,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = {
            let mut guard = bridge.lock().await;
            guard.handle_line(trimmed)?
        };
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}
