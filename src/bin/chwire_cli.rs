use std::{error::Error, io, net::Shutdown, time::Duration};

use clap::Parser;
use chwire::{
    ClientError, ClientOptions, Command, Connection, Outcome, PrintEvents, command::CommandError,
    prompt, protocol::DEFAULT_PORT,
};
use log::warn;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,
    /// Server native protocol port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Default database
    #[arg(long, short, default_value = "default")]
    database: String,
    #[arg(long, short, default_value = "default")]
    user: String,
    #[arg(long, env = "CHWIRE_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,
    /// Report server exceptions without turning them into errors
    #[arg(long)]
    no_rethrow: bool,
    /// Connect/read/write timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let mut options = ClientOptions::new(cli.host, cli.port)
        .with_database(cli.database)
        .with_credentials(cli.user, cli.password)
        .with_rethrow_exceptions(!cli.no_rethrow);
    if let Some(secs) = cli.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let mut conn = Connection::connect(options)?;

    // Closing the socket is the only way to abandon a running query.
    let cancel = conn.cancel_handle()?;
    ctrlc::set_handler(move || {
        eprintln!("interrupted, closing connection");
        if let Err(e) = cancel.shutdown(Shutdown::Both) {
            warn!("failed to shut down connection: {e}");
        }
    })?;

    let stdin = io::stdin();
    let mut events = PrintEvents::new(io::stdout(), io::stderr());

    loop {
        let cmd = match prompt(stdin.lock(), io::stdout().lock()) {
            Ok(c) => c,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match cmd {
            Command::Exit => {
                if let Err(e) = conn.close() {
                    eprintln!("failed to close connection. error: {e}");
                }
                break;
            }
            Command::Ping => match conn.ping() {
                Ok(()) => println!("pong"),
                Err(e) => eprintln!("ping failed: {e}"),
            },
            Command::ServerInfo => {
                let info = conn.server_info();
                println!(
                    "{} {}.{} revision {} timezone {}",
                    info.name,
                    info.version_major,
                    info.version_minor,
                    info.revision,
                    info.timezone.as_deref().unwrap_or("-")
                );
            }
            Command::Query(text) => {
                events.reset();
                match conn.execute(text, &mut events) {
                    Ok(Outcome::Finished) => println!("\n{} rows in set.", events.rows()),
                    // Already printed by the sink.
                    Ok(Outcome::ServerException) | Err(ClientError::Server(_)) => {}
                    Err(e) => eprintln!("query error: {e}"),
                }
                if let Some(e) = events.take_error() {
                    eprintln!("failed to print results: {e}");
                }
            }
        }

        if !conn.is_usable() {
            eprintln!("connection lost");
            break;
        }
    }

    Ok(())
}
