use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mxsdp::transport::UsbHidDevice;
use mxsdp::{
    ChipDB, Config, DownloadOutcome, FirmwareComponent, Flashing, ImageParameter, MemSection,
};

#[derive(Parser)]
#[command(
    name = "mxsdp",
    about = "Load and boot images on i.MX application processors over the Serial Download Protocol",
    version
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Target chip, as named in the chip database
    #[arg(long, default_value = "imx50", global = true)]
    chip: String,
    /// Index among the connected devices of that chip
    #[arg(long, default_value_t = 0, global = true)]
    device: usize,
    /// YAML file overriding timing and transfer sizes
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known chips and how many of each are connected
    List {},
    /// Read the ROM error status word
    Status {},
    /// Download an image to RAM and prepare it for booting
    Download {
        /// Binary, Intel HEX or ELF image
        path: PathBuf,
        /// RAM address, defaults to the load address stored in the image
        #[arg(long, value_parser = parse_number)]
        address: Option<u32>,
        /// Offset of the code inside the image
        #[arg(long, value_parser = parse_number, default_value = "0")]
        code_offset: u32,
        #[arg(long, value_enum, default_value = "app")]
        load_section: MemSection,
        #[arg(long, value_enum, default_value = "app")]
        set_section: MemSection,
        /// Register write script replayed before the download
        #[arg(long)]
        init: Option<PathBuf>,
        /// Jump to the image once its boot header is verified
        #[arg(long)]
        jump: bool,
    },
    /// Replay a register write script
    Init { script: PathBuf },
    /// Jump to an address
    Jump {
        #[arg(value_parser = parse_number)]
        address: u32,
    },
    /// Dump device memory
    Read {
        #[arg(value_parser = parse_number)]
        address: u32,
        #[arg(value_parser = parse_number)]
        length: u32,
    },
    /// Write a single register
    WriteReg {
        #[arg(value_parser = parse_number)]
        address: u32,
        #[arg(value_parser = parse_number)]
        data: u32,
        /// Access width in bits
        #[arg(long, default_value_t = 32)]
        format: u8,
    },
}

fn parse_number(s: &str) -> std::result::Result<u32, String> {
    mxsdp::config::parse_u32(s).map_err(|e| format!("invalid number {:?}: {}", s, e))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let _ = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let db = ChipDB::load()?;
    let connect = || -> Result<Flashing<UsbHidDevice>> {
        let chip = db.find_chip(&cli.chip)?;
        log::debug!("Target chip: {}", chip);
        let device = UsbHidDevice::open_nth(&chip, cli.device, &config.timing)?;
        Ok(Flashing::new(device, chip.family, config.clone()).with_status_ack(chip.status_ack))
    };

    match cli.command {
        Commands::List {} => {
            for chip in db.chips() {
                let n = UsbHidDevice::scan_devices(chip)?;
                log::info!("{} [{:?}] {}: {} connected", chip, chip.family, chip.description, n);
            }
        }
        Commands::Status {} => {
            let status = connect()?.error_status()?;
            log::info!("ROM status: {:#010x}", status);
        }
        Commands::Download {
            path,
            address,
            code_offset,
            load_section,
            set_section,
            init,
            jump,
        } => {
            let mut flashing = connect()?;
            if let Some(script) = init {
                let writes = mxsdp::script::load(script)?;
                flashing.init_memory(&writes)?;
            }

            let firmware = mxsdp::format::read_firmware_from_file(&path)?;
            let target_ram_address = address.or(firmware.load_address).context(
                "image carries no load address, pass --address",
            )?;
            let param = ImageParameter {
                target_ram_address,
                code_offset,
                load_section,
                set_section,
            };
            log::info!("Firmware size: {}", firmware.data.len());

            let mut bar = ProgressBar::new(firmware.data.len() as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg:20} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )?
                .progress_chars("#>-"),
            );
            let outcome =
                flashing.download(&FirmwareComponent::new(&firmware.data), &param, &mut bar);
            bar.finish_and_clear();

            match outcome? {
                DownloadOutcome::Done => log::info!("Image loaded"),
                DownloadOutcome::ReadyToJump(address) if jump => {
                    log::info!("Booting from {:#010x}", address);
                    flashing.jump()?;
                }
                DownloadOutcome::ReadyToJump(address) => {
                    log::info!("Image ready, boot it with `jump {:#010x}`", address)
                }
            }
        }
        Commands::Init { script } => {
            let writes = mxsdp::script::load(script)?;
            connect()?.init_memory(&writes)?;
        }
        Commands::Jump { address } => {
            let mode = connect()?.jump_to(address)?;
            log::info!("{}", mode);
        }
        Commands::Read { address, length } => {
            let data = connect()?.read_memory(address, length as usize)?;
            let mut out = Vec::new();
            hxdmp::hexdump(&data, &mut out)?;
            println!("{}", String::from_utf8_lossy(&out));
        }
        Commands::WriteReg {
            address,
            data,
            format,
        } => {
            connect()?.write_register(format, address, data)?;
            log::info!("[{:#010x}] <- {:#010x}", address, data);
        }
    }

    Ok(())
}
