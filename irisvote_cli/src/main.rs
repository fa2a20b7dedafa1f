use clap::{App, AppSettings, Arg, SubCommand};
use ed25519_dalek::SecretKey;
use std::fmt::Display;

mod command_auth;
mod command_election;
mod command_keygen;
mod command_register;
mod command_vote;
mod rest;

use command_auth::*;
use command_election::*;
use command_keygen::*;
use command_register::*;
use command_vote::*;

#[derive(PartialEq, PartialOrd, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Verbosity {
    Silent = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
}

fn main() {
    let secret_key_arg = Arg::with_name("secret-key")
        .long("secret-key")
        .takes_value(true)
        .help("Hex ed25519 secret key, can also be set with IRISVOTE_SECRET_KEY");
    let template_arg = Arg::with_name("template")
        .long("template")
        .takes_value(true)
        .required(true)
        .help("File holding the iris template captured at enrolment");
    let salt_arg = Arg::with_name("salt")
        .long("salt")
        .takes_value(true)
        .default_value("")
        .help("Salt mixed into the iris commitment");

    let matches = App::new("irisvote")
        .version("0.1")
        .about("Interacts with an irisvoted server")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("uri")
                .long("uri")
                .takes_value(true)
                .global(true)
                .help("Set the irisvoted uri - can also be set with IRISVOTE_URI"),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(SubCommand::with_name("keygen").about("Generate an ed25519 keypair"))
        .subcommand(SubCommand::with_name("health").about("Show server and storage health"))
        .subcommand(
            SubCommand::with_name("register")
                .about("Register a voter identity")
                .arg(Arg::with_name("VOTER-ID").index(1).required(true))
                .arg(Arg::with_name("NAME").index(2).required(true))
                .arg(
                    Arg::with_name("email")
                        .long("email")
                        .takes_value(true)
                        .help("Contact email"),
                )
                .arg(
                    Arg::with_name("demographics")
                        .long("demographics")
                        .takes_value(true)
                        .help("JSON file with demographic attributes"),
                )
                .arg(secret_key_arg.clone())
                .arg(template_arg.clone())
                .arg(salt_arg.clone()),
        )
        .subcommand(
            SubCommand::with_name("auth")
                .about("Request a challenge and answer it with an identity proof")
                .arg(Arg::with_name("VOTER-ID").index(1).required(true))
                .arg(secret_key_arg.clone())
                .arg(template_arg)
                .arg(salt_arg),
        )
        .subcommand(
            SubCommand::with_name("election")
                .about("Manage elections")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("create")
                        .about("Create an election from a JSON file")
                        .arg(
                            Arg::with_name("INPUT")
                                .index(1)
                                .required(true)
                                .help("Election definition in JSON format"),
                        ),
                )
                .subcommand(SubCommand::with_name("list").about("List elections"))
                .subcommand(
                    SubCommand::with_name("get")
                        .about("Show a single election")
                        .arg(Arg::with_name("ELECTION-ID").index(1).required(true)),
                )
                .subcommand(
                    SubCommand::with_name("status")
                        .about("Move an election to a new status")
                        .arg(Arg::with_name("ELECTION-ID").index(1).required(true))
                        .arg(
                            Arg::with_name("STATUS")
                                .index(2)
                                .required(true)
                                .possible_values(&["draft", "active", "closed"]),
                        ),
                ),
        )
        .subcommand(
            SubCommand::with_name("vote")
                .about("Cast a vote")
                .arg(Arg::with_name("ELECTION-ID").index(1).required(true))
                .arg(Arg::with_name("CANDIDATE-ID").index(2).required(true))
                .arg(secret_key_arg)
                .arg(
                    Arg::with_name("key-hash")
                        .long("key-hash")
                        .takes_value(true)
                        .help("Public key hash to vote as, derived from the secret key if not set"),
                )
                .arg(
                    Arg::with_name("proof")
                        .long("proof")
                        .takes_value(true)
                        .help("JSON file with the zero-knowledge proof"),
                )
                .arg(
                    Arg::with_name("signed-payload")
                        .long("signed-payload")
                        .takes_value(true)
                        .help("Signed ballot payload"),
                ),
        )
        .subcommand(
            SubCommand::with_name("attach-tx")
                .about("Link a vote to its on-chain transaction")
                .arg(Arg::with_name("VOTE-ID").index(1).required(true))
                .arg(Arg::with_name("TX-HASH").index(2).required(true))
                .arg(
                    Arg::with_name("chain-id")
                        .long("chain-id")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("contract")
                        .long("contract")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("votes")
                .about("List votes, or show one vote")
                .arg(
                    Arg::with_name("election")
                        .long("election")
                        .takes_value(true)
                        .help("Only votes for this election"),
                )
                .arg(Arg::with_name("VOTE-ID").index(1)),
        )
        .get_matches();

    let verbosity = match matches.occurrences_of("v") {
        0 => Verbosity::Warn,
        _ => Verbosity::Info,
    };

    let env_var = std::env::var("IRISVOTE_URI");
    let uri = match matches.value_of("uri") {
        Some(uri) => uri,
        None => env_var.as_deref().unwrap_or("http://localhost:8000"),
    };
    if verbosity >= Verbosity::Info {
        eprintln!("URI: {}", uri);
    }

    let rest = rest::Rest::new(uri);

    match matches.subcommand() {
        ("keygen", Some(matches)) => command_keygen(matches),
        ("health", Some(_)) => print_json("health", rest.health()),
        ("register", Some(matches)) => command_register(matches, &rest, verbosity),
        ("auth", Some(matches)) => command_auth(matches, &rest, verbosity),
        ("election", Some(matches)) => command_election(matches, &rest),
        ("vote", Some(matches)) => command_vote(matches, &rest, verbosity),
        ("attach-tx", Some(matches)) => command_attach_tx(matches, &rest),
        ("votes", Some(matches)) => command_votes(matches, &rest),
        _ => unreachable!("subcommand is required"),
    }
}

/// Expand `~` and environment variables in a path or argument
pub fn expand(input: &str) -> String {
    shellexpand::full(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|e| exit_with("irisvote", e))
}

/// The secret key from `--secret-key` or `IRISVOTE_SECRET_KEY`
pub fn secret_key(matches: &clap::ArgMatches, command: &str) -> SecretKey {
    let env_var = std::env::var("IRISVOTE_SECRET_KEY");
    let hex_key = match matches.value_of("secret-key") {
        Some(key) => key.to_owned(),
        None => env_var.unwrap_or_else(|_| {
            exit_with(
                command,
                "provide a secret key with --secret-key or IRISVOTE_SECRET_KEY",
            )
        }),
    };

    parse_secret_key(&hex_key).unwrap_or_else(|e| exit_with(command, e))
}

pub fn parse_secret_key(hex_key: &str) -> Result<SecretKey, String> {
    let bytes = irisvote::decode_hex(hex_key.trim()).map_err(|e| format!("invalid secret key: {}", e))?;
    SecretKey::from_bytes(&bytes).map_err(|e| format!("invalid secret key: {}", e))
}

/// Read a file given on the command line
pub fn read_input(path: &str, command: &str) -> Vec<u8> {
    let path = expand(path);
    std::fs::read(&path)
        .unwrap_or_else(|e| exit_with(command, format!("unable to read {}: {}", path, e)))
}

pub fn print_json(command: &str, result: Result<serde_json::Value, rest::RestError>) {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(out) => println!("{}", out),
            Err(e) => exit_with(command, e),
        },
        Err(e) => exit_with(command, e),
    }
}

pub fn exit_with(command: &str, e: impl Display) -> ! {
    eprintln!("irisvote {}: {}", command, e);
    std::process::exit(1);
}
