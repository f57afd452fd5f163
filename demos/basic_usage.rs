//! Basic usage example for the CloudFS client
//!
//! This example demonstrates:
//! - Signing in with a password grant
//! - Creating folders and uploading a file
//! - Listing, downloading and sharing
//! - Deleting into the trash and restoring
//!
//! Reads CLOUDFS_ENDPOINT, CLOUDFS_CLIENT_ID, CLOUDFS_CLIENT_SECRET,
//! CLOUDFS_USERNAME and CLOUDFS_PASSWORD from the environment.
//!
//! Run with: cargo run --example basic_usage

use cloudfs_client::{
    Config, Exists, ProgressCallback, RestAdapter, RestoreMethod, TransferProgress,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("☁️  CloudFS - Basic Usage Example\n");

    let config = Config::from_env();
    let adapter = RestAdapter::new(config)?;

    let username = std::env::var("CLOUDFS_USERNAME")?;
    let password = std::env::var("CLOUDFS_PASSWORD")?;

    println!("🔑 Signing in as {}...", username);
    adapter.authenticate(&username, &password).await?;
    println!("   ✅ Authenticated");

    let profile = adapter.user_profile().await?;
    println!(
        "   Account: {} ({})",
        profile.username,
        profile.id.as_deref().unwrap_or("-")
    );

    // ==================== Folder Operations ====================

    println!("\n📁 Creating folder 'demo'...");
    let folder = adapter.create_folder("/", "demo", Exists::Rename).await?;
    println!("   ✅ Created at {}", folder.path);

    // ==================== File Operations ====================

    let source = std::env::temp_dir().join("cloudfs-demo.txt");
    std::fs::write(&source, b"Hello from the CloudFS client!")?;

    println!("\n📤 Uploading 'hello.txt'...");
    let progress: ProgressCallback = Arc::new(|p: TransferProgress| {
        if let Some(pct) = p.percentage() {
            println!("   {:.0}%", pct);
        }
    });
    let file = folder
        .upload("hello.txt", &source, Exists::Overwrite, Some(progress))
        .await?;
    println!("   ✅ Uploaded {} ({} bytes)", file.name, file.size);

    println!("\n📋 Listing {}...", folder.path);
    for item in folder.list(0, None).await? {
        println!("   - {} [{:?}]", item.name, item.kind);
    }

    println!("\n📥 Downloading 'hello.txt'...");
    let mut content = Vec::new();
    file.download(&mut content, None).await?;
    println!("   Content: {}", String::from_utf8_lossy(&content));

    // ==================== Sharing ====================

    println!("\n🔗 Sharing {}...", folder.path);
    let share = adapter.create_share([folder.path.as_str()], None).await?;
    println!(
        "   ✅ Share {} at {}",
        share.key,
        share.url.as_deref().unwrap_or("(no url)")
    );
    share.delete().await?;

    // ==================== Trash ====================

    println!("\n🗑️  Deleting {}...", file.path);
    file.delete(false, false).await?;

    for trashed in adapter.list_trash(None).await? {
        if trashed.name == "hello.txt" {
            adapter
                .restore(&trashed.path, None, RestoreMethod::Fail)
                .await?;
            println!("   ♻️  Restored {}", trashed.name);
        }
    }

    folder.delete(true, true).await?;
    println!("\n✨ Done");

    Ok(())
}
