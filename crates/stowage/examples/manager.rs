//! Named and deferred stores behind a CacheManager, with tracing enabled

use stowage::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    register_default_drivers();
    println!("drivers: {:?}", stowage::drivers());

    let dir = std::env::temp_dir().join("stowage-manager-example");
    let manager = CacheManager::new();

    // An open store and a deferred one, opened on first lookup
    manager.add_store("memory", Arc::new(MemoryBackend::new(MemoryConfig::default())));
    manager.add_deferred_store(
        "disk",
        DriverConfig::for_driver("file")
            .with("storagePath", dir.to_string_lossy().into_owned())
            .with("prefix", "example")
            .with("expire", "10m"),
    );
    manager.set_default_store("memory");

    // The manager forwards to its default store
    manager.set("hello", "from memory", Duration::ZERO).await?;
    println!("default store: {}", manager.get("hello").await?);

    let disk = manager.store("disk");
    disk.set("hello", "from disk", Duration::ZERO).await?;
    println!("disk store: {}", disk.get("hello").await?);

    // Missing stores fall back to the default
    let fallback = manager.store_or_default("redis");
    println!("fallback store: {}", fallback.get("hello").await?);

    match manager.try_store("redis") {
        Ok(_) => println!("redis configured"),
        Err(err) => println!("try_store failed: {err}"),
    }

    disk.clear().await?;
    Ok(())
}
