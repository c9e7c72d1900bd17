use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::embeddings::OllamaEmbedder;
use crate::engine::RagEngine;
use crate::generation::OllamaGenerator;
use crate::server;
use crate::store::{Document, IndexStore};

/// Start the HTTP API server
#[inline]
pub async fn serve(port: Option<u16>) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let embedder = Arc::new(
        OllamaEmbedder::new(&config.ollama).context("Failed to create embedding client")?,
    );
    let generator = Arc::new(
        OllamaGenerator::new(&config.ollama).context("Failed to create generation client")?,
    );

    // The server starts either way; a missing backend only degrades builds
    // and queries until Ollama comes up.
    match embedder.list_models().await {
        Ok(models) => {
            info!(
                "Ollama connected at {}:{} serving {} models",
                config.ollama.host,
                config.ollama.port,
                models.len()
            );
            for model in [
                &config.ollama.embedding_model,
                &config.ollama.generation_model,
            ] {
                if !models.iter().any(|m| m == model) {
                    warn!("Model {} is not available on the Ollama server", model);
                    println!("⚠️  Model '{}' is not pulled on the Ollama server", model);
                }
            }
        }
        Err(e) => {
            warn!("Ollama is not reachable: {}", e);
            println!("Warning: Ollama may not be ready. Builds and queries will fail until it is.");
            println!("Use 'mailrag config' to update connection settings.");
        }
    }

    let store = IndexStore::open(config.index_dir()).await;
    let engine = Arc::new(RagEngine::new(embedder, generator, store, &config));

    let status = engine.status().await;
    if status.index_loaded {
        println!(
            "📚 Index loaded: {} documents (dimension {})",
            status.documents, status.dimension
        );
    } else {
        println!("📭 No index loaded yet. Run 'mailrag build' or POST /build-index first.");
    }

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    println!("🌐 mailrag API listening on http://{}", addr);
    println!("📊 Use 'mailrag status' to check connectivity and index state");
    println!("Press Ctrl+C to stop the server");

    axum::serve(listener, server::router(engine))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\n📴 Received interrupt signal, shutting down...");
            }
        })
        .await
        .context("Server error")?;

    println!("✅ Shutdown complete");
    Ok(())
}

/// Build the retrieval index from a JSON batch of emails
#[inline]
pub async fn build_index(input: &Path) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let documents: Vec<Document> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {} as an email batch", input.display()))?;

    println!(
        "📦 Loaded {} documents from {}",
        documents.len(),
        input.display()
    );

    let embedder = Arc::new(
        OllamaEmbedder::new(&config.ollama).context("Failed to create embedding client")?,
    );
    let generator = Arc::new(
        OllamaGenerator::new(&config.ollama).context("Failed to create generation client")?,
    );
    let store = IndexStore::open(config.index_dir()).await;
    let engine = RagEngine::new(embedder, generator, store, &config);

    match engine.build(documents).await {
        Ok(summary) => {
            println!("✅ Index built successfully!");
            println!("  Generation: {}", summary.generation);
            println!("  Documents: {}", summary.documents);
            println!("  Dimension: {}", summary.dimension);
            Ok(())
        }
        Err(e) => {
            error!("Index build failed: {}", e);
            println!("❌ Build failed: {}", e);
            Err(e.into())
        }
    }
}

/// Write a default configuration file if none exists
#[inline]
pub fn init_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let path = config.config_file_path();

    if path.exists() {
        println!("📄 Configuration already exists at {}", path.display());
        println!("Use 'mailrag config --show' to inspect it.");
        return Ok(());
    }

    config.save().context("Failed to write configuration file")?;
    println!("✅ Wrote default configuration to {}", path.display());
    println!("Edit it, or set OLLAMA_URL / OLLAMA_MODEL to override the backend.");
    Ok(())
}

/// Print the active configuration as TOML
#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("📄 Configuration file: {}", config.config_file_path().display());
    println!("🗂️  Index directory: {}", config.index_dir().display());
    println!();

    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

/// Show connectivity and index status
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("📊 mailrag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaEmbedder::new(&config.ollama) {
        Ok(embedder) => match embedder.list_models().await {
            Ok(models) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                for (label, model) in [
                    ("Embedding model", &config.ollama.embedding_model),
                    ("Generation model", &config.ollama.generation_model),
                ] {
                    if models.iter().any(|m| m == model) {
                        println!("   ✅ {}: {}", label, model);
                    } else {
                        println!("   ⚠️  {}: {} (not pulled)", label, model);
                    }
                }
                println!("   🔢 Batch Size: {}", config.ollama.batch_size);
            }
            Err(e) => {
                println!("   ❌ Ollama: Failed to connect - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {}", e);
        }
    }

    println!();
    println!("🗂️  Index Status:");
    let store = IndexStore::open(config.index_dir()).await;
    match store.current().await {
        Some(generation) => {
            println!("   ✅ Generation: {}", generation.id);
            println!("   📄 Documents: {}", generation.document_count());
            println!("   🔢 Dimension: {}", generation.dimension());
            println!("   📋 Embedding model: {}", generation.embedding_model);
            println!(
                "   🕒 Built: {}",
                generation.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if generation.embedding_model != config.ollama.embedding_model {
                println!(
                    "   ⚠️  Index was built with a different embedding model; rebuild before querying"
                );
            }
        }
        None => {
            println!("   📭 No index built yet");
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'mailrag build --input <emails.json>' to build the index");
    println!("   • Use 'mailrag serve' to start the HTTP API");
    println!("   • POST /chat with a session_id and question to ask about your email");

    Ok(())
}
