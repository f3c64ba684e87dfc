//! `graphtraced` – NDJSON execution daemon.

use graphtrace::service::Service;
use graphtrace::supervisor::{Supervisor, SupervisorConfig};
use std::env;
use std::io::{self, BufReader, BufWriter};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut listen_addr: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = match args.next() {
                    Some(path) => path,
                    None => {
                        eprintln!("--config requires a path argument");
                        print_usage();
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "missing value for --config",
                        ));
                    }
                };
                config_path = Some(PathBuf::from(path));
            }
            "--stdio" => {
                // Stdio is the default transport; accept the flag for symmetry with --listen.
            }
            "--listen" => {
                let addr = match args.next() {
                    Some(addr) => addr,
                    None => {
                        eprintln!("--listen requires an address argument");
                        print_usage();
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "missing value for --listen",
                        ));
                    }
                };
                listen_addr = Some(addr);
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid command-line argument",
                ));
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => SupervisorConfig::load(path).map_err(to_io_error)?,
        None => SupervisorConfig::default(),
    };
    config.apply_env_overrides().map_err(to_io_error)?;
    let supervisor = Supervisor::new(config).map_err(to_io_error)?;
    let service = Service::new(Arc::new(supervisor));

    if let Some(addr) = listen_addr {
        return run_tcp(service, &addr);
    }

    run_stdio(service)
}

fn run_stdio(service: Service) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let reader = stdin.lock();
    let writer = BufWriter::new(stdout.lock());

    service.handle(reader, writer)
}

fn run_tcp(service: Service, addr: &str) -> io::Result<()> {
    let listener = TcpListener::bind(addr)?;
    let actual = listener.local_addr()?;
    tracing::info!("graphtraced listening on {}", actual);

    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let service = service.clone();
                thread::spawn(move || {
                    let peer = stream.peer_addr().ok();
                    let result = match stream.try_clone() {
                        Ok(read_half) => {
                            service.handle(BufReader::new(read_half), BufWriter::new(stream))
                        }
                        Err(err) => Err(err),
                    };
                    if let Err(err) = result {
                        tracing::warn!("connection error from {:?}: {}", peer, err);
                    }
                });
            }
            Err(err) => {
                tracing::warn!("failed to accept connection: {err}");
            }
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!(
        "Usage: graphtraced [--config PATH] [--stdio] [--listen ADDR]\n\
         \n\
         Options:\n\
           --config PATH Supervisor configuration file (JSON)\n\
           --stdio       Communicate over stdin/stdout (default)\n\
           --listen ADDR Listen on TCP ADDR instead of stdio\n\
         \n\
         GRAPHTRACE_* environment variables override the configuration.\n"
    );
}

fn to_io_error(error: anyhow::Error) -> io::Error {
    io::Error::other(format!("{:#}", error))
}
