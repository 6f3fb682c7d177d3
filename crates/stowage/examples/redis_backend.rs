//! Redis backend through the driver registry

use std::time::Duration;
use stowage::prelude::*;
use stowage::storage::redis::CLIENT_RESOURCE;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    println!("Connecting to Redis at {}", redis_url);

    let config = RedisConfig::default().pool_size(5);
    let backend = match RedisBackend::connect(&redis_url, config).await {
        Ok(backend) => backend,
        Err(err) => {
            println!("Skipping, redis unavailable: {err}");
            return Ok(());
        }
    };

    // Share the pool with a second, differently prefixed store
    register_default_drivers();
    let sessions = stowage::open(
        "redis",
        &DriverConfig::new()
            .with_resource(CLIENT_RESOURCE, backend.pool().clone())
            .with("prefix", "sessions")
            .with("expire", "30m"),
    )?;

    backend.set("hello", "world", Duration::from_secs(300)).await?;
    sessions.set("hello", "session", Duration::ZERO).await?;
    println!("cache:hello = {}", backend.get("hello").await?);
    println!("sessions:hello = {}", sessions.get("hello").await?);

    sessions.clear().await?;
    println!("after clearing sessions, cache:hello present: {}", backend.has("hello").await);

    backend.clear().await?;
    Ok(())
}
