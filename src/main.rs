//! # CGI Server - Entry Point
//! src/main.rs
//!
//! Parsea la configuración, inicializa los logs y arranca el servidor.

use cgi_server::config::Config;
use cgi_server::logging;
use cgi_server::server::Server;
use clap::Parser;

fn main() {
    let config = Config::parse();

    logging::init(&config.log_level);
    config.print_summary();

    let mut server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("💥 Error al iniciar: {}", e);
            std::process::exit(1);
        }
    };

    // Bloquea el thread principal
    if let Err(e) = server.run() {
        eprintln!("💥 Error fatal: {}", e);
        server.shutdown();
        std::process::exit(1);
    }
}
