//! hid-viewer
//!
//! Lists the HID devices the native transport can see: path, manufacturer,
//! product and serial number for each one.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use config::ViewerConfig;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use hid_adapter::{DeviceManager, Dispatcher};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "hid-viewer")]
#[command(author, version, about = "List HID devices visible to the native transport")]
#[command(long_about = "
Enumerates HID devices through the hidapi native library, connects to each
one and prints its path and descriptor strings. Devices that cannot be opened
are still listed, with the strings captured during enumeration.

EXAMPLES:
    # List every device
    hid-viewer

    # Only Logitech devices, exit immediately
    hid-viewer --filter 0x046d:* --no-wait

    # Run with debug logging
    hid-viewer --log-level debug

CONFIGURATION:
    The viewer looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/hid-adapter/viewer.toml
    3. /etc/hid-adapter/viewer.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Device filter as VID:PID (e.g. 0x046d:*, *:*)
    #[arg(short, long, value_name = "VID:PID")]
    filter: Option<String>,

    /// Exit without waiting for a keypress
    #[arg(long)]
    no_wait: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = ViewerConfig::default();
        let path = ViewerConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        ViewerConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        ViewerConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.viewer.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("hid-viewer v{}", env!("CARGO_PKG_VERSION"));

    let (vendor_id, product_id) = match args.filter.as_deref() {
        Some(filter) => config::parse_filter(filter),
        None => config.filter_ids(),
    }
    .context("Invalid device filter")?;

    let dispatcher = Dispatcher::load(&config.library_overrides())
        .context("Failed to load the native HID library")?;
    let mut manager = DeviceManager::new(Arc::new(dispatcher));

    let result = list_devices(&mut manager, vendor_id, product_id, &mut io::stdout().lock());
    manager.shutdown();
    result?;

    if config.viewer.wait_for_key && !args.no_wait {
        wait_for_key()?;
    }

    Ok(())
}

/// Search, then print each device found; returns the number listed
fn list_devices(
    manager: &mut DeviceManager,
    vendor_id: u16,
    product_id: u16,
    out: &mut impl Write,
) -> Result<usize> {
    let devices = manager
        .search_devices(vendor_id, product_id)
        .context("Device enumeration failed")?;

    if devices.is_empty() {
        writeln!(out, "no devices found")?;
        return Ok(0);
    }

    let mut listed = 0;
    for mut device in devices {
        writeln!(out, "path: {}", device.path_lossy())?;

        if device.connect() {
            writeln!(out, "  manufacturer: {}", device.manufacturer())?;
            writeln!(out, "  product: {}", device.product())?;
            writeln!(out, "  serial number: {}", device.serial_number())?;
            device.disconnect();
        } else {
            // Enumeration-time strings; usually a permissions problem.
            warn!("Could not open {}", device.path_lossy());
            let d = device.descriptor();
            writeln!(out, "  (could not open)")?;
            writeln!(
                out,
                "  manufacturer: {}",
                d.manufacturer_string.as_deref().unwrap_or("")
            )?;
            writeln!(out, "  product: {}", d.product_string.as_deref().unwrap_or(""))?;
            writeln!(
                out,
                "  serial number: {}",
                d.serial_number.as_deref().unwrap_or("")
            )?;
        }
        listed += 1;
    }

    Ok(listed)
}

/// Block until a key is pressed
fn wait_for_key() -> Result<()> {
    println!("Press any key to exit...");
    enable_raw_mode().context("Failed to enable raw mode")?;

    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(()),
            Ok(_) => continue,
            Err(e) => break Err(e),
        }
    };

    disable_raw_mode().context("Failed to disable raw mode")?;
    result.context("Failed to read terminal event")
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{FakeCall, FakeTransport, create_mock_device_list};

    fn run(fake: &FakeTransport, vendor_id: u16, product_id: u16) -> (usize, String) {
        let mut manager = DeviceManager::new(fake.dispatcher());
        let mut out = Vec::new();
        let listed = list_devices(&mut manager, vendor_id, product_id, &mut out).unwrap();
        manager.shutdown();
        (listed, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_list_devices_prints_each_device() {
        let fake = FakeTransport::install(create_mock_device_list(2));

        let (listed, output) = run(&fake, 0, 0);

        assert_eq!(listed, 2);
        assert_eq!(
            output,
            "path: /dev/hidraw1\n  manufacturer: Test Manufacturer 1\n  product: Test Product 1\n  serial number: SN000001\n\
             path: /dev/hidraw2\n  manufacturer: Test Manufacturer 2\n  product: Test Product 2\n  serial number: SN000002\n"
        );
        assert_eq!(fake.open_devices(), 0);
        assert_eq!(fake.outstanding_lists(), 0);
    }

    #[test]
    fn test_list_devices_empty() {
        let fake = FakeTransport::install(Vec::new());

        let (listed, output) = run(&fake, 0, 0);

        assert_eq!(listed, 0);
        assert_eq!(output, "no devices found\n");
    }

    #[test]
    fn test_list_devices_reports_unopenable() {
        let fake = FakeTransport::install(create_mock_device_list(3))
            .with_behavior(|b| b.fail_open = true);

        let (listed, output) = run(&fake, 0, 0);

        assert_eq!(listed, 3);
        for id in 1..=3 {
            assert!(output.contains(&format!("path: /dev/hidraw{}\n", id)));
            assert!(output.contains(&format!("serial number: SN{:06}\n", id)));
        }
        assert_eq!(output.matches("(could not open)").count(), 3);
        assert_eq!(fake.count(|c| *c == FakeCall::GetSerialNumberString), 0);
    }

    #[test]
    fn test_list_devices_applies_filter() {
        let fake = FakeTransport::install(create_mock_device_list(3));

        let (listed, output) = run(&fake, 0x1002, 0);

        assert_eq!(listed, 1);
        assert!(output.starts_with("path: /dev/hidraw2\n"));
        assert_eq!(
            fake.count(|c| *c
                == FakeCall::Enumerate {
                    vendor_id: 0x1002,
                    product_id: 0
                }),
            1
        );
    }

    #[test]
    fn test_list_devices_init_failure() {
        let fake = FakeTransport::install(create_mock_device_list(1))
            .with_behavior(|b| b.fail_init = true);
        let mut manager = DeviceManager::new(fake.dispatcher());
        let mut out = Vec::new();

        let err = list_devices(&mut manager, 0, 0, &mut out).unwrap_err();
        assert!(format!("{:#}", err).contains("hid_init"));
    }
}
