//! Command-line surface for the `pigserver` binary (SPEC_FULL.md §6, §10.3).

use std::net::IpAddr;

use clap::Parser;

use pigserver_protocol::DEFAULT_PORT;

/// Pig dice game server: accepts paired TCP clients and referees matches.
#[derive(Parser, Debug)]
#[command(name = "pigserver", version, about)]
pub struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// Maximum number of concurrently connected players
    #[arg(short = 'p', long = "max-players", default_value_t = 10)]
    pub max_players: usize,

    /// Maximum number of game rooms
    #[arg(short = 'r', long = "max-rooms", default_value_t = 5)]
    pub max_rooms: usize,

    /// Directory the four append-only log files are written into
    #[arg(short = 'l', long = "log-dir", default_value = "logs")]
    pub log_dir: String,

    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_section_six() {
        let args = Args::parse_from(["pigserver"]);
        assert_eq!(args.address, "0.0.0.0".parse::<IpAddr>().unwrap());
        assert_eq!(args.max_players, 10);
        assert_eq!(args.max_rooms, 5);
        assert_eq!(args.log_dir, "logs");
        assert_eq!(args.port, DEFAULT_PORT);
    }

    #[test]
    fn positional_port_and_flags_parse_together() {
        let args = Args::parse_from(["pigserver", "-a", "127.0.0.1", "-p", "4", "-r", "2", "-l", "/tmp/logs", "9999"]);
        assert_eq!(args.address, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(args.max_players, 4);
        assert_eq!(args.max_rooms, 2);
        assert_eq!(args.log_dir, "/tmp/logs");
        assert_eq!(args.port, 9999);
    }
}
