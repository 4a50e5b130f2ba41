use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use twimodule::sim::bridge::{BridgeRequest, BridgeResponse, ModuleStatus};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8090";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("twimodule")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bus master console for a simulated two-wire module")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .short("H")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table"])
                .default_value("table")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("write")
                .about("Master write: register address followed by data bytes")
                .arg(
                    Arg::with_name("address")
                        .help("Register address")
                        .required(true)
                        .validator(validate_byte),
                )
                .arg(
                    Arg::with_name("data")
                        .help("Data bytes (decimal or 0x hex)")
                        .multiple(true)
                        .validator(validate_byte),
                ),
        )
        .subcommand(
            SubCommand::with_name("read")
                .about("Master read of LEN bytes, header byte included")
                .arg(Arg::with_name("len").help("Bytes to read").required(true)),
        )
        .subcommand(SubCommand::with_name("status").about("Decode the module's registers"))
        .subcommand(
            SubCommand::with_name("tick")
                .about("Advance the module by COUNT ticks")
                .arg(Arg::with_name("count").help("Ticks").default_value("1")),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port: u16 = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse()?;
    let format = matches.value_of("format").unwrap_or("table");

    let request = match matches.subcommand() {
        ("write", Some(sub)) => write_request(sub)?,
        ("read", Some(sub)) => {
            BridgeRequest::Read { len: sub.value_of("len").unwrap_or("0").parse()? }
        }
        ("status", _) => BridgeRequest::Status,
        ("tick", Some(sub)) => {
            BridgeRequest::Tick { count: sub.value_of("count").unwrap_or("1").parse()? }
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            return Ok(());
        }
    };

    let reply = send_request(host, port, &request).await?;
    if format == "json" {
        println!("{}", reply);
        return Ok(());
    }
    print_response(&serde_json::from_str::<BridgeResponse>(&reply)?);
    Ok(())
}

fn parse_byte(value: &str) -> Result<u8, std::num::ParseIntError> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn validate_byte(value: String) -> Result<(), String> {
    parse_byte(&value).map(|_| ()).map_err(|e| format!("'{}' is not a byte: {}", value, e))
}

fn write_request(matches: &ArgMatches<'_>) -> Result<BridgeRequest, Box<dyn std::error::Error>> {
    let mut data = vec![parse_byte(matches.value_of("address").unwrap_or("0"))?];
    if let Some(values) = matches.values_of("data") {
        for value in values {
            data.push(parse_byte(value)?);
        }
    }
    Ok(BridgeRequest::Write { data })
}

async fn send_request(
    host: &str,
    port: u16,
    request: &BridgeRequest,
) -> Result<String, Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", host, port);
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!(
                "{} Failed to connect to module simulator at {}",
                "❌".red(),
                addr.bright_white()
            );
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Start it with {}", "💡".yellow(), "twimodule-sim".bright_cyan());
            }
            return Err(e.into());
        }
    };

    let line = serde_json::to_string(request)?;
    let exchange = async move {
        let (reader, mut writer) = stream.into_split();
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let mut reply = String::new();
        if BufReader::new(reader).read_line(&mut reply).await? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "simulator closed connection",
            ));
        }
        Ok(reply.trim_end().to_string())
    };

    match tokio::time::timeout(REQUEST_TIMEOUT, exchange).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            eprintln!(
                "{} Request timed out after {} seconds",
                "⏰".yellow(),
                REQUEST_TIMEOUT.as_secs()
            );
            Err("request timeout".into())
        }
    }
}

fn print_response(response: &BridgeResponse) {
    match response {
        BridgeResponse::Written { accepted } => {
            println!("{} {} bytes accepted", "✅".green(), accepted.to_string().bright_cyan());
        }
        BridgeResponse::Data { bytes } => print_bytes(bytes),
        BridgeResponse::Ticked { count, connected } => {
            let link = if *connected {
                "connected".bright_green()
            } else {
                "disconnected".bright_red()
            };
            println!(
                "{} advanced {} ticks, master {}",
                "⏱️".blue(),
                count.to_string().bright_cyan(),
                link
            );
        }
        BridgeResponse::Status(status) => print_status(status),
        BridgeResponse::Error { message } => {
            println!("{} {}", "❌".red(), message.bright_red());
        }
    }
}

fn print_bytes(bytes: &[u8]) {
    for (row, chunk) in bytes.chunks(8).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        println!("{} {}", format!("{:04X}", row * 8).dimmed(), hex.join(" ").bright_white());
    }
}

fn flag(set: bool) -> ColoredString {
    if set {
        "yes".bright_green()
    } else {
        "no".bright_red()
    }
}

fn print_status(status: &ModuleStatus) {
    let header = &status.header;
    println!("{}", "📟 Module Status".bright_blue().bold());
    println!("{}", "════════════════".bright_blue());
    println!("{:<16}{}", "Signature:", flag(header.signature_valid));
    println!("{:<16}0x{:02X}", "Type:", header.type_signature);
    println!("{:<16}{}", "Id:", header.id);
    println!("{:<16}{}", "Name:", header.name.bright_cyan());
    println!("{:<16}0x{:02X}", "Bus address:", status.address);
    println!("{:<16}{}", "Connected:", flag(status.connected));
    println!("{:<16}{}", "Active:", flag(header.active()));
    println!("{:<16}{}", "Operational:", flag(header.operational()));
    println!("{:<16}{}", "LED:", flag(status.led));
    println!("{:<16}{:08b}", "Status:", header.status);
    println!("{:<16}{:08b}", "Settings:", header.settings);
    println!("\n{}", "Registers".bright_white().bold());
    print_bytes(&status.registers);
}
