//! Password hash helper
//!
//! Prints an Argon2id hash for `CDN_ADMIN_PASSWORD_HASH`. The password is
//! taken from the first argument, or read from stdin when none is given.

use std::io::{self, BufRead};
use std::process::ExitCode;

use rax_cdn_server::auth::credentials::hash_password;

fn read_password() -> io::Result<String> {
    if let Some(password) = std::env::args().nth(1) {
        return Ok(password);
    }
    eprintln!("Enter password:");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn main() -> ExitCode {
    let password = match read_password() {
        Ok(password) if !password.is_empty() => password,
        Ok(_) => {
            eprintln!("Usage: hash_password <password>");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Failed to read password: {e}");
            return ExitCode::FAILURE;
        }
    };

    match hash_password(&password) {
        Ok(hash) => {
            println!("{hash}");
            eprintln!("Set CDN_ADMIN_PASSWORD_HASH to the value above.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to hash password: {e}");
            ExitCode::FAILURE
        }
    }
}
