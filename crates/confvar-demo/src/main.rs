//! confvar demo application.
//!
//! Declares a few settings as global fields, loads `settings.json` from the
//! working directory, records one more launch and writes the file back.
//!
//! ```text
//! main()
//!  └─ Settings::register()   -- Field::new for every key
//!  └─ ConfigStore::load()    -- missing file keeps the defaults
//!  └─ launches += 1
//!  └─ ConfigStore::save()
//! ```
//!
//! Set `RUST_LOG=debug` to see what the store does with the file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use confvar_core::{ConfigError, ConfigStore, Field};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WindowGeometry {
    width: u32,
    height: u32,
    maximized: bool,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            maximized: false,
        }
    }
}

/// Every persisted setting of the application.
struct Settings {
    volume: Field<u8>,
    muted: Field<bool>,
    username: Field<String>,
    launches: Field<u64>,
    window: Field<WindowGeometry>,
}

impl Settings {
    fn register() -> Result<Self, ConfigError> {
        Ok(Self {
            volume: Field::new("volume", 80)?,
            muted: Field::new("muted", false)?,
            username: Field::new("username", String::new())?,
            launches: Field::new("launches", 0)?,
            window: Field::new("window", WindowGeometry::default())?,
        })
    }

    fn reset(&self) {
        self.volume.set_value(80);
        self.muted.set_value(false);
        self.username.set_value(String::new());
        self.launches.set_value(0);
        self.window.set_value(WindowGeometry::default());
    }
}

fn main() -> anyhow::Result<()> {
    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::register().context("declaring settings")?;
    let store = ConfigStore::new();
    info!("using {}", store.file_path(SETTINGS_FILE).display());

    match store.load(SETTINGS_FILE) {
        Ok(()) => {}
        Err(e @ ConfigError::Deserialize { .. }) => {
            // An incompatible file: start over from defaults rather than abort.
            warn!("{e}; falling back to defaults");
            settings.reset();
        }
        Err(e) => return Err(e).context("loading settings"),
    }

    let launches = settings.launches.update(|n| {
        *n += 1;
        *n
    });
    let window = settings.window.value();
    info!(
        "launch #{launches}: volume={} muted={} user={:?} window={}x{}",
        settings.volume.value(),
        settings.muted.value(),
        settings.username.value(),
        window.width,
        window.height,
    );

    println!("{}", store.get().context("rendering settings")?);

    store.save(SETTINGS_FILE).context("saving settings")?;
    Ok(())
}
