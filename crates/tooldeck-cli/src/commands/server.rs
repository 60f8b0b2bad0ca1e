//! `tooldeck server` — Start the tooldeck HTTP backend server.

pub async fn run(
    host: String,
    port: u16,
    db_path: String,
    session_tokens: Vec<String>,
) -> Result<(), String> {
    let config = tooldeck_server::ServerConfig {
        host: host.clone(),
        port,
        db_path,
        session_tokens,
    };

    println!("Starting tooldeck server on {}:{}...", host, port);

    let addr = tooldeck_server::start_server(config).await?;
    println!("tooldeck server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
