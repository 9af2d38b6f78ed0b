use std::io::BufRead;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::time::Duration;

use anyhow::Result;
use boresight::console::{parse_console_command, ConsoleInput, HELP};
use boresight::logging;
use boresight::overlay::platform::OverlayPlatform;
use boresight::overlay::settings_store;
use boresight::overlay::{spawn_overlay, OverlaySettings, OverlayToMain};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[cfg(windows)]
fn platform_factory() -> Result<OverlayPlatform> {
    boresight::overlay::platform::win32::native_platform()
}

#[cfg(not(windows))]
fn platform_factory() -> Result<OverlayPlatform> {
    anyhow::bail!("no native overlay backend is available for this platform")
}

fn spawn_console_reader() -> Receiver<ConsoleInput> {
    let (tx, rx) = channel();
    let spawned = std::thread::Builder::new()
        .name("boresight-console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match parse_console_command(&line) {
                    Some(input) => {
                        if tx.send(input).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("{HELP}"),
                }
            }
            let _ = tx.send(ConsoleInput::Quit);
        });
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "console input unavailable");
    }
    rx
}

fn main() -> Result<()> {
    let (settings, load_error) = match settings_store::load() {
        Ok(settings) => (settings, None),
        Err(err) => (OverlaySettings::default(), Some(err)),
    };
    let _log_guard = logging::init(settings.debug_logging, settings.log_file.clone());
    if let Some(err) = load_error {
        tracing::warn!(error = ?err, "failed to load overlay settings, using defaults");
    }

    let mut runtime = spawn_overlay(settings, platform_factory)?;
    let console = spawn_console_reader();
    println!("{HELP}");

    loop {
        match console.try_recv() {
            Ok(ConsoleInput::Quit) | Err(TryRecvError::Disconnected) => break,
            Ok(ConsoleInput::Overlay(command)) => {
                if let Err(err) = runtime.command(command) {
                    tracing::warn!(error = %err, ?command, "overlay command dropped");
                }
            }
            Err(TryRecvError::Empty) => {}
        }

        let Some(event) = runtime.recv_timeout(EVENT_POLL_INTERVAL) else {
            continue;
        };
        match event {
            OverlayToMain::Started => tracing::info!("overlay started"),
            OverlayToMain::PreferencesChanged(settings) => match settings_store::save(&settings) {
                Ok(path) => tracing::debug!(path = %path.display(), "overlay preferences saved"),
                Err(err) => tracing::error!(error = ?err, "failed to save overlay preferences"),
            },
            OverlayToMain::Notice(text) => println!("{text}"),
            OverlayToMain::ReadoutCopied(text) => println!("copied {text}"),
            OverlayToMain::CaptureFailed(err) => tracing::warn!(error = %err, "magnifier capture failed"),
            OverlayToMain::StatusChanged(status) => tracing::debug!(?status, "overlay status"),
            OverlayToMain::SettingsApplied => {}
            OverlayToMain::Exited { reason } => {
                tracing::info!(?reason, "overlay exited");
                break;
            }
        }
    }

    runtime.stop();
    Ok(())
}
