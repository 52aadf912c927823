mod assets;
mod cli;
mod commands;
mod config;
mod env_loader;
mod error;
mod logging;
mod prune;

fn main() {
    env_loader::load_dotenv();

    if let Err(err) = cli::run() {
        logging::error(format!("{err:#}"));
        std::process::exit(1);
    }
}
