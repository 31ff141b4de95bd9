use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::sync::Arc;

use getopts::{Matches, Options};
use simple_logger::SimpleLogger;

use minidns::dns::context::{ConfigOverrides, ServerConfig, ServerContext, ZoneConfig};
use minidns::dns::server::{DnsServer, DnsUdpServer};

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn parse_number<T: FromStr>(matches: &Matches, name: &str) -> Result<Option<T>, String> {
    match matches.opt_str(name) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("Invalid value for --{}: {}", name, value)),
        None => Ok(None),
    }
}

fn parse_zones(matches: &Matches) -> Result<Vec<ZoneConfig>, String> {
    matches
        .opt_strs("zone")
        .iter()
        .map(|arg| match arg.split_once('=') {
            Some((origin, file)) if !origin.is_empty() && !file.is_empty() => Ok(ZoneConfig {
                origin: origin.to_string(),
                file: PathBuf::from(file),
            }),
            _ => Err(format!("Zone must be given as ORIGIN=FILE: {}", arg)),
        })
        .collect()
}

fn build_config(matches: &Matches) -> Result<ServerConfig, String> {
    let mut config = match matches.opt_str("config") {
        Some(path) => ServerConfig::from_file(Path::new(&path))
            .map_err(|e| format!("Failed to read {}: {}", path, e))?,
        None => ServerConfig::default(),
    };

    config.apply_overrides(ConfigOverrides {
        address: matches.opt_str("address"),
        port: parse_number(matches, "port")?,
        threads: parse_number(matches, "threads")?,
        log_level: matches.opt_str("log-level"),
        zones: parse_zones(matches)?,
    });

    Ok(config)
}

/// Main entry point for the minidns server
fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt("c", "config", "TOML configuration file", "FILE");
    opts.optopt("a", "address", "Address to listen on (default 127.0.0.1)", "ADDR");
    opts.optopt("p", "port", "UDP port to listen on (default 9999)", "PORT");
    opts.optopt("t", "threads", "Number of worker threads (default 4)", "N");
    opts.optmulti(
        "z",
        "zone",
        "Zone file to serve, may be repeated",
        "ORIGIN=FILE",
    );
    opts.optopt(
        "l",
        "log-level",
        "Log level: error, warn, info, debug or trace (default info)",
        "LEVEL",
    );

    let opt_matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{}", f);
            print_usage(&program, opts);
            process::exit(2);
        }
    };

    if opt_matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }

    let config = match build_config(&opt_matches) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let level = log::LevelFilter::from_str(&config.server.log_level).unwrap_or_else(|_| {
        eprintln!("Unknown log level {}, using info", config.server.log_level);
        log::LevelFilter::Info
    });
    // RUST_LOG, when set, takes precedence
    if let Err(e) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let context = match ServerContext::from_config(&config) {
        Ok(x) => Arc::new(x),
        Err(e) => {
            log::error!("Failed to set up server: {}", e);
            process::exit(1);
        }
    };

    log::info!(
        "Serving {} records for {} names",
        context.store.len(),
        context.store.domains().count()
    );

    let udp_server = DnsUdpServer::new(context.clone(), context.thread_count);
    match udp_server.run_server() {
        Ok(addr) => log::info!("minidns ready on {}", addr),
        Err(e) => {
            log::error!("Failed to bind UDP listener on {}: {}", context.listen_address(), e);
            process::exit(1);
        }
    }

    loop {
        std::thread::park();
    }
}
