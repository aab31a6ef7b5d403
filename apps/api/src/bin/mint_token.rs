//! # Development Token Minter
//!
//! Issues a bearer token signed with the configured secret, for exercising
//! the API without the identity service.
//!
//! ## Usage
//! ```bash
//! cargo run -p flashmart-api --bin mint-token -- --sub u1 --email asha@example.com
//! cargo run -p flashmart-api --bin mint-token -- --sub admin --role admin
//! ```

use std::env;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use flashmart_api::auth::{JwtManager, Role};
use flashmart_api::ApiConfig;
use flashmart_core::Customer;

fn print_help() {
    println!("Flashmart Token Minter");
    println!();
    println!("Usage: mint-token [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --sub <ID>         User id (default: dev-user)");
    println!("  --email <EMAIL>    Email claim (default: <sub>@flashmart.local)");
    println!("  --name <NAME>      Name claim (default: Dev User)");
    println!("  --role <ROLE>      customer or admin (default: customer)");
    println!("  -h, --help         Show this help message");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flashmart=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut sub = "dev-user".to_string();
    let mut email = None;
    let mut name = "Dev User".to_string();
    let mut role = Role::Customer;

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        if flag == "-h" || flag == "--help" {
            print_help();
            return Ok(());
        }

        let value = iter
            .next()
            .with_context(|| format!("{} needs a value", flag))?;

        match flag.as_str() {
            "--sub" => sub = value.clone(),
            "--email" => email = Some(value.clone()),
            "--name" => name = value.clone(),
            "--role" => role = value.parse().map_err(anyhow::Error::msg)?,
            other => bail!("unknown option '{}' (try --help)", other),
        }
    }

    let email = email.unwrap_or_else(|| format!("{}@flashmart.local", sub));

    let config = ApiConfig::load(None).context("Failed to load configuration")?;
    let jwt = JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.issuer.clone(),
        config.auth.token_lifetime_secs,
    );

    let token = jwt.issue(&Customer::new(sub, email, name), role)?;

    println!("{}", token);
    Ok(())
}
