use crate::rest::Rest;
use crate::{exit_with, print_json, read_input, secret_key, Verbosity};
use ed25519_dalek::PublicKey;
use irisvote::{ChainAttachment, Payload};
use serde_json::json;

pub fn command_vote(matches: &clap::ArgMatches, rest: &Rest, verbosity: Verbosity) {
    // Unwraps are OK, these args are required
    let election_id = matches.value_of("ELECTION-ID").unwrap();
    let candidate_id = matches.value_of("CANDIDATE-ID").unwrap();

    let key_hash = match matches.value_of("key-hash") {
        Some(hash) => hash.to_owned(),
        None => {
            let public_key: PublicKey = (&secret_key(matches, "vote")).into();
            irisvote::public_key_hash(&irisvote::client::public_key_hex(&public_key))
        }
    };
    if verbosity >= Verbosity::Info {
        eprintln!("voting as {}", key_hash);
    }

    let zk_proof: Option<Payload> = matches.value_of("proof").map(|path| {
        let bytes = read_input(path, "vote");
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|e| exit_with("vote", format!("invalid proof: {}", e)))
    });

    let ballot = json!({
        "election_id": election_id,
        "voter_public_key_hash": key_hash,
        "candidate_id": candidate_id,
        "zk_proof": zk_proof,
        "signed_payload": matches.value_of("signed-payload"),
    });
    print_json("vote", rest.cast_vote(&ballot));
}

pub fn command_attach_tx(matches: &clap::ArgMatches, rest: &Rest) {
    let vote_id = matches.value_of("VOTE-ID").unwrap();
    let chain_id = matches.value_of("chain-id").map(|id| {
        id.parse::<u64>()
            .unwrap_or_else(|_| exit_with("attach-tx", format!("invalid chain id {}", id)))
    });

    let attachment = ChainAttachment {
        tx_hash: matches.value_of("TX-HASH").unwrap().to_owned(),
        contract_address: matches.value_of("contract").map(str::to_owned),
        chain_id,
    };
    print_json("attach-tx", rest.attach_tx(vote_id, &attachment));
}

pub fn command_votes(matches: &clap::ArgMatches, rest: &Rest) {
    match matches.value_of("VOTE-ID") {
        Some(id) => print_json("votes", rest.get_vote(id)),
        None => print_json("votes", rest.list_votes(matches.value_of("election"))),
    }
}
