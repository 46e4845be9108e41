mod app;
mod compose;
mod engine;
mod logging;
mod model;
mod nav;
mod services;
mod theme;
mod ui;
mod widgets;

use anyhow::Result;

fn main() -> Result<()> {
    logging::init()?;
    ui::run()
}
