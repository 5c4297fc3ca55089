pub mod config;
pub mod log;
pub mod reminder;
pub mod run;
pub mod task;
pub mod timer;

use std::error::Error;
use std::sync::Arc;

use timetrack_core::{data_dir, notify, Config, SystemClock, Tracker};

pub type CmdResult = Result<(), Box<dyn Error>>;

/// Open the tracker named by the user's config, with the real clock.
pub fn open_tracker() -> Result<Tracker, Box<dyn Error>> {
    let dir = data_dir()?;
    let config = Config::load()?;
    Ok(Tracker::from_config(
        &config,
        &dir,
        Arc::new(SystemClock),
        notify::sink_for(&config.notifications),
    ))
}
