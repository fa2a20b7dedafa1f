use crate::rest::Rest;
use crate::{exit_with, read_input, secret_key, Verbosity};
use ed25519_dalek::PublicKey;
use irisvote::{Payload, Registration};

pub fn command_register(matches: &clap::ArgMatches, rest: &Rest, verbosity: Verbosity) {
    // Unwraps are OK, these args are required
    let voter_id = matches.value_of("VOTER-ID").unwrap();
    let name = matches.value_of("NAME").unwrap();
    let template = read_input(matches.value_of("template").unwrap(), "register");
    let salt = matches.value_of("salt").unwrap_or("");

    let secret_key = secret_key(matches, "register");
    let public_key: PublicKey = (&secret_key).into();

    let demographics: Option<Payload> = matches.value_of("demographics").map(|path| {
        let bytes = read_input(path, "register");
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|e| exit_with("register", format!("invalid demographics: {}", e)))
    });

    let registration = Registration {
        voter_id: voter_id.to_owned(),
        name: name.to_owned(),
        email: matches.value_of("email").map(str::to_owned),
        demographics,
        public_key: irisvote::client::public_key_hex(&public_key),
        iris_commitment: irisvote::client::iris_commitment(&template, salt.as_bytes()),
    };
    if verbosity >= Verbosity::Info {
        eprintln!("iris commitment: {}", registration.iris_commitment);
    }

    let res = rest
        .register(&registration)
        .unwrap_or_else(|e| exit_with("register", e));
    println!("id: {}", res["id"].as_str().unwrap_or_default());
    println!(
        "public-key-hash: {}",
        res["public_key_hash"].as_str().unwrap_or_default()
    );
}
