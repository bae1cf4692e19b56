//! Clan console - restores a session and reports what it may access.

use std::env;

use clan_console::access::{Decision, Route};
use clan_console::{logging, Config, Console};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("clan-console {}", VERSION);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Set CLAN__SUPABASE__URL and CLAN__SUPABASE__PUBLISHABLE_KEY or provide console.toml.",
            e
        )
    })?;

    logging::init(&config.logging.level);
    tracing::info!("Starting clan-console {}", VERSION);

    let console = Console::from_config(&config);
    console.start().await;

    let auth = console.sessions.wait_until_ready().await;
    if auth.session.is_none() {
        // The session arrives through the provider once the browser flow completes.
        console.sessions.sign_in().await;
        console.shutdown();
        return Ok(());
    }

    let profile = console.profiles.wait_until_loaded().await;
    tracing::info!(
        "Signed in as {} ({})",
        console.profiles.display_name(),
        profile
            .profile
            .as_ref()
            .map(|p| p.permission.as_str())
            .unwrap_or("no profile")
    );

    for route in Route::ALL {
        tracing::info!("{:<10} {}", route.path(), console.gate.check(route));
    }

    if console.gate.check(Route::Recruits) == Decision::Allow
        && console.roster.load().await.is_ok()
    {
        tracing::info!("{} recruits on the roster", console.roster.recruits().len());
    }

    if console.admin.is_visible() && console.admin.load_admin_users().await.is_ok() {
        tracing::info!("{} users visible to the owner", console.admin.snapshot().users.len());
    }

    console.shutdown();
    Ok(())
}
