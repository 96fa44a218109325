use anyhow::Context;
use clap::{Parser, Subcommand};
use sx127x_rs::{init_logger, Sx127xConfig};

#[derive(Parser)]
#[command(name = "sx127x-cli")]
#[command(about = "CLI tool for SX127x radio control")]
struct Cli {
    /// Path to a JSON configuration file (pins, SPI bus, PA output)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transmit a payload and wait for completion
    Tx {
        /// Carrier frequency in Hz
        #[arg(short, long, default_value = "868000000")]
        frequency: u64,
        /// Payload as a hex string, e.g. "deadbeef"
        payload: String,
        /// Use LoRa modulation instead of FSK
        #[arg(long)]
        lora: bool,
        /// Output power in dBm
        #[arg(short, long, default_value = "17")]
        power: i32,
    },
    /// Receive continuously and print payloads
    Rx {
        /// Carrier frequency in Hz
        #[arg(short, long, default_value = "868000000")]
        frequency: u64,
        /// Expected payload size in bytes
        #[arg(short, long, default_value = "16")]
        size: u8,
        /// Use LoRa modulation instead of FSK
        #[arg(long)]
        lora: bool,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<Sx127xConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config file {path}"))
        }
        None => Ok(Sx127xConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    run(cli.command, config).await
}

#[cfg(feature = "raspberry-pi")]
async fn run(command: Commands, config: Sx127xConfig) -> anyhow::Result<()> {
    use std::time::Duration;
    use sx127x_rs::{log_info, OpMode, PassthroughCodec, Sx127xDriver};

    let mut driver = Sx127xDriver::from_config(&config, PassthroughCodec)?;
    driver.initialize()?;
    let notifier = driver.start_event_notifier()?;

    match command {
        Commands::Tx {
            frequency,
            payload,
            lora,
            power,
        } => {
            let payload = hex::decode(&payload).context("payload is not valid hex")?;
            driver.set_op_mode(if lora { OpMode::LoRa } else { OpMode::Fsk })?;
            driver.set_frequency(frequency, 0)?;
            driver.set_tx_power(power)?;

            driver.send(&payload)?;
            while !driver.is_tx_done() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            log_info(&format!("Sent {} bytes", payload.len()));
        }
        Commands::Rx {
            frequency,
            size,
            lora,
        } => {
            driver.set_op_mode(if lora { OpMode::LoRa } else { OpMode::Fsk })?;
            driver.set_frequency(frequency, 0)?;
            driver.set_payload_size(size)?;
            driver.enable_continuous_rx()?;

            let mut buf = vec![0u8; size as usize];
            loop {
                while !driver.is_rx_done() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                let received = driver.read(&mut buf)?;
                let stats = driver.rssi()?;
                log_info(&format!(
                    "Received {} bytes: {} (rssi {} dBm, lq {})",
                    received,
                    hex::encode(&buf),
                    stats.rssi_dbm,
                    stats.link_quality
                ));
            }
        }
    }

    notifier.shutdown().await;
    driver.shutdown()?;
    Ok(())
}

#[cfg(not(feature = "raspberry-pi"))]
async fn run(_command: Commands, _config: Sx127xConfig) -> anyhow::Result<()> {
    anyhow::bail!(
        "sx127x-cli needs hardware access; rebuild with --features raspberry-pi"
    )
}
