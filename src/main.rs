use std::io;
use std::path::Path;
use std::process;

#[macro_use]
extern crate lazy_static;

use chrono::Local;
use env_logger::Env;

mod cli;
use cli::{command_usage, RunOptions};

mod common;
mod config;
use config::ValetConfig;

mod csv_store;
mod error;
mod pipeline;
mod rows;
mod valet;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let matches = command_usage().get_matches();

    let config_path = matches.value_of("config").unwrap_or(cli::DEFAULT_CONFIG);
    let config = match ValetConfig::load(Path::new(config_path)) {
        Ok(c) => { c },
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let today = Local::now().naive_local().date();
    let options = match RunOptions::from_matches(&matches, &config, today) {
        Ok(o) => { o },
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = if options.list_series {
        pipeline::list_series(&options.client, &options.group, &mut out)
    } else {
        // a failed CSV write is reported by the writer and is not fatal
        pipeline::run(&options, &options.client, &mut out).map(|_| ())
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        process::exit(1);
    }
}
