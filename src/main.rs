// Credence Prediction Market - Main Entry Point
// Wires config, persisted state and the HTTP router together.

use std::net::SocketAddr;

use dotenv::dotenv;

use credence_market::{handlers, shared, AppState, EconomicConfig, ServerConfig};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("\n═══════════════════════════════════════════════");
    println!("     🎲 Credence Prediction Market");
    println!("═══════════════════════════════════════════════\n");

    let economics = EconomicConfig::from_env();
    let server = ServerConfig::from_env();
    let port = server.port;

    // Load persisted state (fresh state if no snapshot exists yet)
    let state = shared(AppState::from_disk(economics, server));

    // Clone state for shutdown handler before moving into router
    let shutdown_state = state.clone();

    let app = handlers::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("\n╔════════════════════════════════════════════╗");
    println!("║   🚀 SERVER RUNNING                        ║");
    println!("║   📡 http://0.0.0.0:{:<23}║", port);
    println!("╚════════════════════════════════════════════╝\n");

    println!("📋 Available Endpoints:");
    println!("   POST /users                    - Sign up (zero starting balance)");
    println!("   GET  /users/:name              - Account details");
    println!("   GET  /users/:name/ledger       - Wallet ledger history");
    println!("   GET  /users/:name/positions    - Portfolio across markets");
    println!("   GET  /markets                  - List all prediction markets");
    println!("   POST /markets                  - Create new market (x-username)");
    println!("   GET  /markets/:id              - Market details + probability history");
    println!("   GET  /markets/:id/positions    - Share positions per user");
    println!("   POST /markets/:id/resolve      - Resolve YES / NO / N/A (creator or admin)");
    println!("   POST /bet                      - Buy YES or NO credits (x-username)");
    println!("   POST /sell                     - Sell shares back for credits (x-username)");
    println!("   GET  /system/metrics           - Money-supply audit\n");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind server address");

    // Spawn shutdown handler
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");

        println!("\n\n🛑 Shutdown signal received...");
        println!("💾 Saving state to disk...");

        if let Ok(app_state) = shutdown_state.lock() {
            if let Err(e) = app_state.save() {
                eprintln!("❌ Failed to save state: {}", e);
            } else {
                println!("✅ State saved successfully");
            }
        }

        println!("👋 Goodbye!\n");
        std::process::exit(0);
    });

    axum::serve(listener, app).await.expect("server error");
}
