use std::error::Error as _;
use std::process;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use simplelog::LevelFilter;

use http10::client::{HttpClient, TcpConnector};
use http10::error::{Error, Result};
use http10::server::{EchoHandler, HttpServer, ServerConfig};

mod logger;

/// Minimal HTTP/1.0 client and echo server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity of the log written to stderr
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue one GET request and print the response
    Get {
        /// Absolute url of the form http://host[:port][/path]
        url: String,

        /// Read and write deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Serve the echo handler until accepting a connection fails
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Handler threads; 0 spawns one thread per connection
        #[arg(long, default_value_t = 0)]
        workers: usize,

        /// Per-connection read and write deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Start the echo server in the background and query it once
    Demo {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        #[arg(long, default_value = "/")]
        path: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn print_response(status: u16, body: &str) {
    println!("Status: {}", status);
    println!("Body: {}", body);
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Get { url, timeout_ms } => {
            let connector = TcpConnector::with_io_timeout(timeout_ms.map(Duration::from_millis));
            let (status, body) = HttpClient::with_connector(connector).execute(&url)?;
            print_response(status, &body);
        }
        Command::Serve {
            host,
            port,
            workers,
            timeout_ms,
        } => {
            let config = ServerConfig {
                host,
                port,
                workers,
                io_timeout: timeout_ms.map(Duration::from_millis),
            };
            HttpServer::bind(&config, EchoHandler)?.serve_forever()?;
        }
        Command::Demo { port, path } => {
            let config = ServerConfig {
                host: "127.0.0.1".into(),
                port,
                ..ServerConfig::default()
            };
            let server = HttpServer::bind(&config, EchoHandler)?;
            let port = server
                .local_addr()
                .map_err(|source| Error::Bind {
                    addr: config.address(),
                    source,
                })?
                .port();
            thread::spawn(move || server.serve_forever());

            let url = format!("http://localhost:{}{}", port, path);
            info!("demo request to {}", url);
            let (status, body) = http10::client::execute(&url)?;
            print_response(status, &body);
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    logger::init_logger(args.log_level.into());

    if let Err(e) = run(args.command) {
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            message.push_str(&format!(": {}", cause));
            source = cause.source();
        }
        error!("{}", message);
        process::exit(1);
    }
}
