use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use oboflow::diag::{MiscAttr, OboAttr};
use oboflow::i2c::OPTIC_EEPROM_ADDR;
use oboflow::{BarBus, FpgaDevice};

#[derive(Parser, Debug)]
#[command(name = "oboflow")]
#[command(about = "OBO optics management over the switch FPGA SPI engines")]
struct Args {
    #[arg(
        long,
        help = "PCI address of the FPGA (as listed under /sys/bus/pci/devices)",
        default_value = "0000:04:00.0"
    )]
    device: String,

    #[arg(
        long,
        help = "Use the CSR-based SPI engine of second-generation FPGAs"
    )]
    mrvl: bool,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows all BAR read/write operations)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read module memory through the raw SPI engine
    Read {
        #[arg(long, help = "Target OBO port, 0-based")]
        obo: u8,
        #[arg(long, default_value = "0")]
        bank: String,
        #[arg(long, default_value = "0")]
        page: String,
        #[arg(long, default_value = "0")]
        offset: String,
        #[arg(long, default_value = "1")]
        len: String,
    },
    /// Write module memory through the raw SPI engine
    Write {
        #[arg(long, help = "Target OBO port, 0-based")]
        obo: u8,
        #[arg(long, default_value = "0")]
        bank: String,
        #[arg(long, default_value = "0")]
        page: String,
        #[arg(long, default_value = "0")]
        offset: String,
        #[arg(help = "Space-separated hex byte tokens, e.g. \"01 02 03 04\"")]
        data: String,
    },
    /// Probe whether a module is present and done committing writes
    Probe {
        #[arg(long, help = "Target OBO port, 0-based")]
        obo: u8,
        #[arg(long, default_value = "0")]
        bank: String,
    },
    /// Read module EEPROM through the virtual I2C port (page banked)
    Eeprom {
        #[arg(long, help = "Virtual port, 0-based")]
        port: u8,
        #[arg(long, default_value = "0")]
        offset: String,
        #[arg(long, default_value = "128")]
        len: String,
    },
    /// Show the staged transfer configuration and page-select cache
    Show,
    /// Show or set a board-level OBO bitmap (reset, lpmod, txdis, ...)
    Misc {
        #[arg(help = "One of: reset, lpmod, txdis, connect, interrupt")]
        attr: String,
        #[arg(help = "16-bit bitmap to store; omit to read")]
        value: Option<String>,
    },
}

fn misc_attr(name: &str) -> anyhow::Result<MiscAttr> {
    match name {
        "reset" => Ok(MiscAttr::Reset),
        "lpmod" => Ok(MiscAttr::Lpmod),
        "txdis" => Ok(MiscAttr::TxDis),
        "connect" => Ok(MiscAttr::ConnectCheck),
        "interrupt" => Ok(MiscAttr::Interrupt),
        other => anyhow::bail!("unknown misc attribute: {other}"),
    }
}

fn stage_transfer(
    device: &FpgaDevice,
    obo: u8,
    bank: &str,
    page: &str,
    offset: &str,
    len: &str,
) -> anyhow::Result<()> {
    device.attr_store(OboAttr::OboId, &obo.to_string())?;
    device.attr_store(OboAttr::Bank, bank)?;
    device.attr_store(OboAttr::Page, page)?;
    device.attr_store(OboAttr::Offset, offset)?;
    device.attr_store(OboAttr::Len, len)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let bus = BarBus::new(&args.device)
        .with_context(|| format!("cannot open BAR of device {}", args.device))?;
    let device = FpgaDevice::new(Arc::new(bus));

    // Refuse to poke registers on a board this tool does not know.
    let board = device.check_board_type()?;
    tracing::info!("Attached to FPGA, board type 0x{:x}", board);

    match args.command {
        Command::Read {
            obo,
            bank,
            page,
            offset,
            len,
        } => {
            stage_transfer(&device, obo, &bank, &page, &offset, &len)?;
            let dump = if args.mrvl {
                device.mrvl_spi_read_data()?
            } else {
                device.spi_read_data()?
            };
            print!("{dump}");
        }
        Command::Write {
            obo,
            bank,
            page,
            offset,
            data,
        } => {
            let tokens = data.split_whitespace().count();
            stage_transfer(&device, obo, &bank, &page, &offset, &tokens.to_string())?;
            if args.mrvl {
                device.mrvl_spi_write_data(&data)?;
            } else {
                device.spi_write_data(&data)?;
            }
        }
        Command::Probe { obo, bank } => {
            use oboflow::spi::{check_ready, mrvl_check_ready, wait_module_ready, PollSpec};

            let bank = oboflow::diag::parse_value(&bank)? as u8;
            device.port(obo)?; // bounds check only
            let bus = device.bus();
            let poll = PollSpec::default();
            let result = if args.mrvl {
                wait_module_ready(|| mrvl_check_ready(bus, obo, bank, poll))
            } else {
                wait_module_ready(|| {
                    check_ready(bus, oboflow::SpiChannel::new(oboflow::DEFAULT_PIM, obo), poll)
                })
            };
            match result {
                Ok(()) => println!("OBO_{}: ready", obo + 1),
                Err(e) => {
                    println!("OBO_{}: not ready ({e})", obo + 1);
                    std::process::exit(1);
                }
            }
        }
        Command::Eeprom { port, offset, len } => {
            let offset = oboflow::diag::parse_value(&offset)? as u8;
            let len = oboflow::diag::parse_value(&len)? as usize;
            let port = device.port(port)?;

            let mut cmd = [offset];
            let mut buf = vec![0u8; len];
            let mut msgs = [
                oboflow::I2cMessage {
                    addr: OPTIC_EEPROM_ADDR,
                    read: false,
                    buf: &mut cmd,
                },
                oboflow::I2cMessage {
                    addr: OPTIC_EEPROM_ADDR,
                    read: true,
                    buf: &mut buf,
                },
            ];
            port.transfer(&mut msgs)?;
            print!("{}", oboflow::diag::hexdump(&buf, offset as usize));
        }
        Command::Show => {
            print!("{}", device.cfg_summary());
        }
        Command::Misc { attr, value } => {
            let attr = misc_attr(&attr)?;
            match value {
                Some(value) => device.misc_store(attr, &value)?,
                None => print!("{}", device.misc_show(attr)?),
            }
        }
    }

    Ok(())
}
