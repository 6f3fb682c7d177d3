//! Basic example demonstrating stowage with the memory backend

use stowage::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== stowage Basic Example ===\n");

    // Raw string store
    let backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::new(MemoryConfig::default()));
    backend.set("greeting", "hello", Duration::from_secs(300)).await?;
    println!("greeting = {}", backend.get("greeting").await?);

    // Typed view over the same store
    let users = TypedCache::<User>::new(backend.clone());
    let user = User {
        id: 123,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
    };

    println!("Storing user in cache...");
    users.set("user:123", &user, Duration::from_secs(300)).await?;

    match users.get("user:123").await {
        Ok(user) => println!("Cache HIT: {} <{}>", user.name, user.email),
        Err(err) if err.is_not_found() => println!("Cache MISS"),
        Err(err) => return Err(err.into()),
    }
    println!("Stored payload: {}", backend.get("user:123").await?);

    // Cache-aside
    println!("\n--- Load ---");
    let loaded = users
        .load(
            "user:456",
            || async {
                println!("   loader ran");
                Ok(User {
                    id: 456,
                    name: "Bob".to_string(),
                    email: "bob@example.com".to_string(),
                })
            },
            Duration::from_secs(60),
        )
        .await?;
    println!("Loaded: {}", loaded.name);

    let again = users
        .load("user:456", || async { Err(CacheError::loader("not called")) }, Duration::ZERO)
        .await?;
    println!("Second load served from cache: {}", again.name);

    // Expiry
    println!("\n--- Expiry ---");
    backend.set("temp", "expires soon", Duration::from_millis(200)).await?;
    println!("has temp: {}", backend.has("temp").await);
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("has temp after 250ms: {}", backend.has("temp").await);

    // Delete and clear
    users.delete("user:123").await?;
    println!("\nExists after delete: {}", users.has("user:123").await);
    backend.clear().await?;
    println!("Exists after clear: {}", users.has("user:456").await);

    println!("\n=== Example Complete ===");
    Ok(())
}
