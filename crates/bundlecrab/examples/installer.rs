use bundlecrab::{DirAssetStore, InstallDirs, InstallationCoordinator, ModelCatalog};
use bundlecrab_core::protocol::InstallEvent;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;

// Usage: installer <asset-root> <catalog.toml> <model-name> [--reinstall]
#[async_std::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(asset_root), Some(catalog_path), Some(model_name)) =
        (args.next(), args.next(), args.next())
    else {
        anyhow::bail!("usage: installer <asset-root> <catalog.toml> <model-name> [--reinstall]");
    };
    let reinstall = args.any(|a| a == "--reinstall");

    let dirs = InstallDirs::from_env()?;
    let mut catalog = ModelCatalog::new();
    catalog.load_file(&PathBuf::from(catalog_path))?;
    if catalog.load_file_if_exists(&dirs.manifest_path())? {
        println!("Applied user manifest {:?}", dirs.manifest_path());
    }

    let spec = catalog
        .resolve(&model_name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Model '{}' not found in catalog", model_name))?;

    let store = Arc::new(DirAssetStore::new(asset_root));
    let coordinator = InstallationCoordinator::from_env(store)?;

    if reinstall {
        println!("--- Reinstalling {} ---", spec.name);
        let outcome = coordinator.reinstall(&spec).await?;
        println!("{:?}", outcome);
        return Ok(());
    }

    println!("--- Installing {} into {:?} ---", spec.name, dirs.models_dir());
    let mut events = coordinator.install_stream(spec);
    while let Some(event) = events.next().await {
        match event {
            InstallEvent::Started(name) => println!("Started install of {}", name),
            InstallEvent::Skipped(name) => println!("{} is already installed", name),
            InstallEvent::FileStarted(file) => println!("Copying {}", file),
            InstallEvent::FileReused(file) => println!("Keeping existing {}", file),
            InstallEvent::Progress { filename, bytes } => {
                print!("\r{}: {} MiB", filename, bytes / (1024 * 1024));
                let _ = std::io::Write::flush(&mut std::io::stdout());
            }
            InstallEvent::FileComplete { filename, bytes } => {
                println!("\r{} done ({} bytes)", filename, bytes)
            }
            InstallEvent::Complete(name) => println!("Successfully installed {}", name),
            InstallEvent::Error(err) => eprintln!("\nInstall error: {}", err),
        }
    }

    Ok(())
}
