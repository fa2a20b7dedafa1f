pub fn command_keygen(_matches: &clap::ArgMatches) {
    let (secret, public) = irisvote::generate_keypair();
    let public = irisvote::client::public_key_hex(&public);

    println!("secret-key: {}", hex::encode(secret.to_bytes()));
    println!("public-key: {}", public);
    println!("public-key-hash: {}", irisvote::public_key_hash(&public));
}
