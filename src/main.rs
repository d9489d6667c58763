use std::process::ExitCode;

use log::{error, info};
use winit::event_loop::{ControlFlow, EventLoop};

use plife::error::ViewerError;
use plife::window::App;
use plife::SimulationConfig;

fn run() -> Result<(), ViewerError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {}", path);
            SimulationConfig::load(&path)?
        }
        None => SimulationConfig::default(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("plife=info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
