use crate::rest::Rest;
use crate::{exit_with, print_json, read_input};
use irisvote::NewElection;

pub fn command_election(matches: &clap::ArgMatches, rest: &Rest) {
    match matches.subcommand() {
        ("create", Some(matches)) => command_election_create(matches, rest),
        ("list", Some(_)) => print_json("election list", rest.list_elections()),
        ("get", Some(matches)) => {
            let id = matches.value_of("ELECTION-ID").unwrap();
            print_json("election get", rest.get_election(id));
        }
        ("status", Some(matches)) => {
            let id = matches.value_of("ELECTION-ID").unwrap();
            let status = matches.value_of("STATUS").unwrap();
            print_json("election status", rest.set_election_status(id, status));
        }
        _ => exit_with("election", "unknown subcommand"),
    }
}

pub fn command_election_create(matches: &clap::ArgMatches, rest: &Rest) {
    let bytes = read_input(matches.value_of("INPUT").unwrap(), "election create");
    let election: NewElection = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| exit_with("election create", format!("invalid election: {}", e)));

    if election.candidates.is_empty() {
        eprintln!("irisvote election create: WARNING: election has no candidates");
    }

    print_json("election create", rest.create_election(&election));
}
