// gattbridge: command-line front end for the GATT bridge
//
// Codec helpers for UUID halves and device addresses, persistent bridge
// configuration, and a loopback demo session that drives every actor through
// the dispatch facade.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use futures::future::join_all;
use gattbridge_core::{
    decode_uuid, encode_uuid, format_address, init_logging, parse_address, AttributeKind,
    AttributeRow, BridgeConfig, BridgeContext, EventReceivers, EventSink, GattEvent, LoopbackPeer,
    LoopbackStack, ScanFilterCondition, Uuid128,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

const DEMO_PEER: &str = "C0:FF:EE:00:00:01";
const DEMO_CENTRAL: &str = "12:34:56:78:9A:BC";
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "gattbridge")]
#[command(about = "GATT bridge codec tools and loopback demo", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert between UUID text and msb/lsb halves
    Uuid {
        #[command(subcommand)]
        action: UuidAction,
    },
    /// Normalise a colon-hex device address
    Address { address: String },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run a client/server session against the loopback stack
    Demo {
        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UuidAction {
    /// Halves (hex, optional 0x prefix) to UUID text
    Encode { msb: String, lsb: String },
    /// UUID text to halves
    Decode { uuid: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Uuid { action } => cmd_uuid(action),
        Commands::Address { address } => cmd_address(&address),
        Commands::Config { action } => cmd_config(action),
        Commands::Demo { json } => cmd_demo(json).await,
    }
}

fn parse_half(text: &str) -> Result<u64> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid 64-bit hex value: {}", text))
}

fn cmd_uuid(action: UuidAction) -> Result<()> {
    match action {
        UuidAction::Encode { msb, lsb } => {
            let uuid = encode_uuid(parse_half(&msb)?, parse_half(&lsb)?);
            println!("{}", uuid.to_string().bright_cyan());
            println!("  Stack bytes: {}", hex::encode(uuid.as_bytes()).dimmed());
        }
        UuidAction::Decode { uuid } => {
            let parsed =
                uuid::Uuid::parse_str(&uuid).with_context(|| format!("Invalid UUID: {}", uuid))?;
            let (msb, lsb) = decode_uuid(&Uuid128::from(parsed));
            println!("  msb: {}", format!("0x{:016x}", msb).bright_cyan());
            println!("  lsb: {}", format!("0x{:016x}", lsb).bright_cyan());
        }
    }
    Ok(())
}

fn cmd_address(text: &str) -> Result<()> {
    let address = parse_address(text)?;
    println!("{}", format_address(&address).bright_cyan());
    println!("  Bytes: {}", hex::encode(address.as_bytes()).dimmed());
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let path = config::config_file()?;

    match action {
        ConfigAction::Set { key, value } => {
            config::set_and_save(&path, &key, &value)?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            let config = config::load_from(&path)?;
            if !BridgeConfig::keys().contains(&key.as_str()) {
                anyhow::bail!("Unknown config key: {}", key);
            }
            match config.get(&key) {
                Some(value) => println!("{} = {}", key.bright_cyan(), value),
                None => println!("{} = {}", key.bright_cyan(), "(unset)".dimmed()),
            }
        }

        ConfigAction::List => {
            let config = config::load_from(&path)?;
            println!("{}", "Configuration".bold());
            println!();
            for (key, value) in config::list(&config) {
                println!("  {:<20} {}", key.bright_cyan(), value);
            }
        }

        ConfigAction::Path => println!("{}", path.display()),
    }

    Ok(())
}

// ============================================================================
// Loopback demo
// ============================================================================

fn demo_database() -> Vec<AttributeRow> {
    vec![
        AttributeRow::new(AttributeKind::PrimaryService, Uuid128::from_u16(0x180F))
            .with_handles(1, 1, 3),
        AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A19))
            .with_handles(2, 0, 0)
            .with_properties(0x12),
        AttributeRow::new(AttributeKind::Descriptor, Uuid128::from_u16(0x2902))
            .with_handles(3, 0, 0),
        AttributeRow::new(AttributeKind::PrimaryService, Uuid128::from_u16(0x180A))
            .with_handles(4, 4, 5),
        AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A29))
            .with_handles(5, 0, 0)
            .with_properties(0x02),
    ]
}

fn demo_stack() -> Result<Arc<LoopbackStack>> {
    let peer = LoopbackPeer::new(parse_address(DEMO_PEER)?)
        .with_rssi(-52)
        .with_adv_data(vec![0x02, 0x01, 0x06, 0x05, 0x09, b'D', b'e', b'm', b'o'])
        .with_database(demo_database())
        .with_value(2, vec![93])
        .with_value(3, vec![0x00, 0x00])
        .with_value(5, b"gattbridge".to_vec());
    Ok(Arc::new(LoopbackStack::new().with_peer(peer)))
}

fn print_event(event: &GattEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
    } else {
        println!("  {} {}", "←".bright_blue(), event);
    }
}

async fn next_event(rx: &mut UnboundedReceiver<GattEvent>, json: bool) -> Result<GattEvent> {
    let event = tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .context("Timed out waiting for event")?
        .context("Event channel closed")?;
    print_event(&event, json);
    Ok(event)
}

async fn cmd_demo(json: bool) -> Result<()> {
    let config = config::load()?;
    let _guard = match init_logging(&config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} {}", "Logging disabled:".yellow(), e);
            None
        }
    };

    let stack = demo_stack()?;
    let ctx = BridgeContext::new(config);
    let (sink, mut rx) = EventSink::channel();
    ctx.initialize(stack.clone(), sink)
        .context("Failed to start loopback stack")?;
    info!("Loopback demo started");

    println!("{}", "Client".bold());
    demo_client(&ctx, &mut rx, json).await?;
    println!();

    println!("{}", "Scanner".bold());
    demo_scanner(&ctx, &mut rx, json).await?;
    println!();

    println!("{}", "Server".bold());
    demo_server(&ctx, &stack, &mut rx, json).await?;
    println!();

    ctx.cleanup();
    println!("{}", "Demo complete".green().bold());
    Ok(())
}

async fn demo_client(ctx: &BridgeContext, rx: &mut EventReceivers, json: bool) -> Result<()> {
    let registered = ctx
        .register_client_awaitable(Uuid128::from_u16(0xC11E))?
        .await?;
    print_event(&registered, json);
    let client_if = match registered {
        GattEvent::ClientRegistered { client_if, .. } => client_if,
        other => anyhow::bail!("Unexpected registration event: {}", other),
    };

    ctx.connect(client_if, DEMO_PEER, true, 2).into_result()?;
    let conn_id = match next_event(&mut rx.client, json).await? {
        GattEvent::Connected { conn_id, status: 0, .. } => conn_id,
        other => anyhow::bail!("Connect failed: {}", other),
    };

    ctx.search_service(conn_id, None).into_result()?;
    next_event(&mut rx.client, json).await?;

    let db = ctx.get_gatt_db_awaitable(conn_id)?.await?;
    if let GattEvent::GattDbRetrieved { rows, .. } = &db {
        for row in rows {
            println!(
                "    {:?} 0x{:04x} {}",
                row.kind,
                row.attribute_handle,
                row.uuid.map(|u| u.to_string()).unwrap_or_default().dimmed()
            );
        }
    }

    // Both reads are outstanding at once; each resolves by its own handle
    let reads = vec![
        ctx.read_characteristic_awaitable(conn_id, 2, 0)?,
        ctx.read_characteristic_awaitable(conn_id, 5, 0)?,
    ];
    for result in join_all(reads).await {
        print_event(&result?, json);
    }

    let mtu = ctx.configure_mtu_awaitable(conn_id, 247)?.await?;
    print_event(&mtu, json);

    ctx.disconnect(client_if, DEMO_PEER, conn_id).into_result()?;
    next_event(&mut rx.client, json).await?;
    Ok(())
}

async fn demo_scanner(ctx: &BridgeContext, rx: &mut EventReceivers, json: bool) -> Result<()> {
    ctx.register_scanner(Uuid128::from_u16(0x5CA7)).into_result()?;
    let scanner_id = match next_event(&mut rx.scanner, json).await? {
        GattEvent::ScannerRegistered { scanner_id, .. } => scanner_id as i32,
        other => anyhow::bail!("Unexpected registration event: {}", other),
    };

    let name_filter = ScanFilterCondition::LocalName {
        name: "Demo".to_string(),
    };
    ctx.scan_filter_add(scanner_id, 0, &name_filter).into_result()?;
    next_event(&mut rx.scanner, json).await?;

    ctx.scan(true).into_result()?;
    if let GattEvent::ScanResult { adv_data, .. } = next_event(&mut rx.scanner, json).await? {
        println!("    adv: {}", hex::encode(adv_data).dimmed());
    }
    ctx.scan(false).into_result()?;
    Ok(())
}

async fn demo_server(
    ctx: &BridgeContext,
    stack: &LoopbackStack,
    rx: &mut EventReceivers,
    json: bool,
) -> Result<()> {
    ctx.register_server(Uuid128::from_u16(0x5E77)).into_result()?;
    let server_if = match next_event(&mut rx.server, json).await? {
        GattEvent::ServerRegistered { server_if, .. } => server_if,
        other => anyhow::bail!("Unexpected registration event: {}", other),
    };

    let service = vec![
        AttributeRow::new(AttributeKind::PrimaryService, Uuid128::from_u16(0x181A)),
        AttributeRow::new(AttributeKind::Characteristic, Uuid128::from_u16(0x2A6E))
            .with_properties(0x12)
            .with_permissions(0x01),
    ];
    ctx.add_service(server_if, &service).into_result()?;
    let char_handle = match next_event(&mut rx.server, json).await? {
        GattEvent::ServiceAdded { rows, .. } if rows.len() == 2 => rows[1].attribute_handle,
        other => anyhow::bail!("Service not added: {}", other),
    };

    let conn_id = stack.simulate_server_connection(server_if, parse_address(DEMO_CENTRAL)?);
    next_event(&mut rx.server, json).await?;

    let trans_id = stack
        .simulate_read_request(conn_id, char_handle, 0, false, false)
        .context("Loopback stack not running")?;
    next_event(&mut rx.server, json).await?;

    // 21.50 °C in 0.01 °C units, little-endian
    let temperature = 2150i16.to_le_bytes();
    ctx.send_response(conn_id, trans_id, 0, char_handle, 0, 0, Some(&temperature))
        .into_result()?;
    next_event(&mut rx.server, json).await?;

    ctx.send_notification(server_if, char_handle, conn_id, Some(&temperature))
        .into_result()?;
    next_event(&mut rx.server, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_half_accepts_prefix() {
        assert_eq!(parse_half("0x0102030405060708").unwrap(), 0x0102030405060708);
        assert_eq!(parse_half("0a0b0c0d0e0f1011").unwrap(), 0x0a0b0c0d0e0f1011);
        assert!(parse_half("xyz").is_err());
    }

    #[test]
    fn test_demo_database_encodes() {
        assert!(gattbridge_core::encode_table(&demo_database()).is_ok());
    }
}
