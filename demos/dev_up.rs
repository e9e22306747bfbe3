#[macro_use]
extern crate lazy_static;

mod cli;
mod env;

use cli::App;

/// Opens and brings UP a Linux TAP interface. You should be able to arping and
/// ping the device address from the host.
fn main() {
    env_logger::init();

    let matches = clap::App::new("dev_up").with_defaults().get_matches();

    let mut interface = env::interface(&matches);

    loop {
        env::tick(&mut interface);
    }
}
