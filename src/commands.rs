//! Command handlers for the `vhid` binary

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use logi_vhid::input::hid_codes::key_from_name;
use logi_vhid::transport::protocol::ioctl;
use logi_vhid::transport::{
    shared, system_transport, Access, RecordingTransport, SharedTransport,
};
use logi_vhid::{Modifier, MouseButton, Session, VhidConfig};
use tracing::info;

use crate::cli::Commands;

/// Transport for this run, plus the recorder when `--dry-run` is set
pub fn open_transport(dry_run: bool) -> (SharedTransport, Option<RecordingTransport>) {
    if dry_run {
        let recorder = RecordingTransport::new();
        (shared(recorder.clone()), Some(recorder))
    } else {
        (system_transport(), None)
    }
}

/// `probe`: report which endpoints open, without creating anything
pub fn probe(config: &VhidConfig, transport: &SharedTransport) {
    let mut transport = transport.lock();
    println!("Backend: {}", transport.name());
    let bus = transport.is_available(&config.bus_path, Access::ReadWrite);
    println!(
        "Bus     {}  {}",
        if bus { "ok     " } else { "missing" },
        config.bus_path
    );
    for path in &config.input_paths {
        let ok = transport.is_available(path, Access::WriteOnly);
        println!("Input   {}  {}", if ok { "ok     " } else { "missing" }, path);
    }
    if !bus {
        println!("The LGHUB virtual bus driver does not appear to be installed or running.");
        return;
    }
    match transport.bus_children(&config.bus_path) {
        Ok(children) => {
            for child in children {
                let kind = child.kind().map_or("other", |k| k.name());
                println!("Child   {:<8} id {:<4} {}", kind, child.device_id, child.instance_id);
            }
        }
        Err(e) => println!("Bus children could not be listed: {e}"),
    }
}

/// `config`: print (and optionally write) the effective configuration
pub fn show_config(config: &VhidConfig, path: &Path, write: bool) -> Result<()> {
    print!("{}", config.to_toml()?);
    if write {
        config.save(path)?;
        println!("# written to {}", path.display());
    }
    Ok(())
}

/// `destroy`: remove devices left on the bus
///
/// A fresh session tracks nothing, so every keyboard and mouse child counts.
pub fn destroy_leftovers(session: &mut Session, include_foreign: bool) -> Result<()> {
    session.initialize().context("opening the virtual bus")?;
    let result = session.destroy_orphans(include_foreign);
    session.cleanup();
    let destroyed = result.context("destroying leftover devices")?;
    if destroyed == 0 {
        println!("No leftover devices on the bus");
    } else {
        println!("Destroyed {destroyed} leftover device(s)");
    }
    Ok(())
}

/// Run one device command inside a full initialize / power_on / cleanup cycle
pub fn run_device_command(session: &mut Session, command: &Commands) -> Result<()> {
    session.initialize().context("opening the virtual bus")?;
    let powered = session.power_on().context("creating virtual devices");
    let result = powered.and_then(|()| dispatch(session, command));
    session.cleanup();
    result
}

fn dispatch(session: &mut Session, command: &Commands) -> Result<()> {
    match command {
        Commands::Move { dx, dy } => session.move_relative(*dx, *dy)?,
        Commands::MoveTo { x, y } => session.move_absolute(*x, *y)?,
        Commands::Click { button, count } => {
            let button = MouseButton::from(*button);
            for i in 0..*count {
                if i > 0 {
                    thread::sleep(Duration::from_millis(50));
                }
                session.click(button)?;
            }
        }
        Commands::Wheel { delta } => session.wheel(*delta)?,
        Commands::Tap { key, mods } => tap(session, key, mods)?,
        Commands::Type { text } => session.type_text(text)?,
        Commands::Reset => session.reset_state()?,
        Commands::Demo => demo(session)?,
        Commands::Probe | Commands::Config { .. } | Commands::Destroy { .. } => {
            bail!("command does not use the virtual devices")
        }
    }
    Ok(())
}

fn tap(session: &mut Session, key: &str, mods: &[String]) -> Result<()> {
    let code = key_from_name(key).ok_or_else(|| anyhow!("unknown key: {key}"))?;
    let modifiers = mods
        .iter()
        .map(|m| Modifier::from_name(m).ok_or_else(|| anyhow!("unknown modifier: {m}")))
        .collect::<Result<Vec<_>>>()?;

    for &m in &modifiers {
        session.modifier_down(m)?;
    }
    let tapped = session.key_tap(code);
    for &m in modifiers.iter().rev() {
        session.modifier_up(m)?;
    }
    Ok(tapped?)
}

fn demo(session: &mut Session) -> Result<()> {
    info!("Demo: square, click, type");
    if session.is_present(logi_vhid::DeviceKind::Mouse) {
        for (dx, dy) in [(100, 0), (0, 100), (-100, 0), (0, -100)] {
            session.move_relative(dx, dy)?;
            thread::sleep(Duration::from_millis(100));
        }
        session.click(MouseButton::Left)?;
        session.wheel(-2)?;
    }
    if session.is_present(logi_vhid::DeviceKind::Keyboard) {
        session.type_text("Hello from vhid!")?;
    }
    session.reset_state()?;
    Ok(())
}

/// Print what a dry run sent
pub fn print_traffic(recorder: &RecordingTransport) {
    for call in recorder.calls() {
        println!(
            "{:<22} {:>3} bytes  {:02X?}",
            ioctl::name(call.opcode),
            call.input.len(),
            call.input
        );
    }
}
