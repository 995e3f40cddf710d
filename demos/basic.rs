//! Basic ManageSieve client example
//!
//! Run with: cargo run --example basic
//!
//! Connection details come from `SIEVE_HOST`, `SIEVE_PORT`, `SIEVE_USER`
//! and `SIEVE_PASS`.

use managesieve_rs::{SecurityMode, ServerConfig, SieveClient};

const VACATION: &str = r#"require ["vacation"];
vacation :days 7 :subject "Out of office" "I'm away until Monday.";
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let host = std::env::var("SIEVE_HOST").unwrap_or_else(|_| "mail.example.com".to_string());
    let port = std::env::var("SIEVE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(managesieve_rs::DEFAULT_PORT);
    let user = std::env::var("SIEVE_USER").unwrap_or_else(|_| "user".to_string());
    let pass = std::env::var("SIEVE_PASS").unwrap_or_else(|_| "pass".to_string());

    let config = ServerConfig::new(host, user, pass)
        .with_port(port)
        .with_security(SecurityMode::StartTls);
    if !config.has_credentials() {
        return Err("SIEVE_USER and SIEVE_PASS must not be empty".into());
    }

    println!("Connecting to {}:{}...", config.host, config.port);
    let mut client = SieveClient::new(config);
    client.set_debug_handler(|line| eprintln!("{}", line));
    client.connect().await?;
    println!(
        "Connected to {} (TLS: {})",
        client.implementation()?.unwrap_or("unknown server"),
        client.is_tls()
    );
    println!("Server offers: {}", client.auth_mechanisms()?.join(", "));

    client.login().await?;
    println!("Authenticated!");

    if client.has_extension("vacation")? {
        if client.has_space("vacation-demo", VACATION.len() as u64).await? {
            client.install_script("vacation-demo", VACATION, false).await?;
            println!("Uploaded vacation-demo");
        } else {
            println!("Not enough quota for vacation-demo");
        }
    }

    let scripts = client.list_scripts().await?;
    println!("\n{} scripts:", scripts.names.len());
    for name in &scripts.names {
        let marker = if scripts.active.as_deref() == Some(name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("  {} {}", marker, name);
    }

    if scripts.contains("vacation-demo") {
        let source = client.get_script("vacation-demo").await?;
        println!("\nvacation-demo:\n{}", source);
        client.remove_script("vacation-demo").await?;
    }

    client.disconnect(true).await?;
    println!("\nConnection closed.");

    Ok(())
}
