use crate::rest::Rest;
use crate::{exit_with, read_input, secret_key, Verbosity};

pub fn command_auth(matches: &clap::ArgMatches, rest: &Rest, verbosity: Verbosity) {
    // Unwraps are OK, these args are required
    let voter_id = matches.value_of("VOTER-ID").unwrap();
    let template = read_input(matches.value_of("template").unwrap(), "auth");
    let salt = matches.value_of("salt").unwrap_or("");
    let secret_key = secret_key(matches, "auth");

    let nonce = rest
        .challenge(voter_id)
        .unwrap_or_else(|e| exit_with("auth", e));
    if verbosity >= Verbosity::Info {
        eprintln!("nonce: {}", nonce);
    }

    // The proof and signature are computed here; the template never leaves this machine
    let response = irisvote::client::respond_to_challenge(
        voter_id,
        &nonce,
        &secret_key,
        &template,
        salt.as_bytes(),
    );

    let res = rest
        .verify(
            voter_id,
            &response.iris_commitment_proof,
            &response.signed_nonce,
        )
        .unwrap_or_else(|e| exit_with("auth", e));
    println!(
        "public-key-hash: {}",
        res["public_key_hash"].as_str().unwrap_or_default()
    );
}
