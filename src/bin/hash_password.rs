//! Prints an argon2 hash for `ADMIN_PASSWORD_HASH`.
//!
//! Reads the password from the first argument, or from stdin when none is
//! given.

use anyhow::Context;
use club_portal::auth::hash_password;
use std::io::{self, BufRead};

fn main() -> anyhow::Result<()> {
    let password = match std::env::args().nth(1) {
        Some(password) => password,
        None => {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    anyhow::ensure!(!password.is_empty(), "password must not be empty");

    let hash = hash_password(password).map_err(|e| anyhow::anyhow!("failed to hash: {e}"))?;
    println!("{hash}");
    Ok(())
}
