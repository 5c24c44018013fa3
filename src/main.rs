use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tilesampler::raster::RasterLibrary;
use tilesampler::{Config, Driver, DriverResult, IoOptions, TileKey};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tilesampler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let elevation = args.iter().any(|arg| arg == "--elevation" || arg == "-e");
    let tiles = args
        .iter()
        .filter(|arg| !arg.starts_with('-'))
        .map(|arg| parse_tile(arg))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if tiles.is_empty() {
        bail!("Usage: tilesampler [--elevation] z/x/y [z/x/y ...]");
    }

    let config = Config::load()?;
    let library = raster_library()?;
    let driver = Arc::new(Driver::open(
        library.as_ref(),
        "tilesampler",
        &config.source,
        config.tile_size,
        &IoOptions::default(),
    )?);
    tracing::info!("Rendering {} tiles from {:?}", tiles.len(), driver.options());

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    let jobs = tiles.into_iter().map(|(z, x, y)| {
        let driver = driver.clone();
        let config = config.clone();
        async move {
            let key = driver.profile().tile_key(z, x, y);
            if !driver.intersects(&key) {
                tracing::debug!("Tile {}/{}/{} is outside the data", z, x, y);
                return Ok::<(), anyhow::Error>(());
            }

            // Raster reads block, keep them off the runtime threads
            let render_config = config.clone();
            let rendered = tokio::task::spawn_blocking(move || render_tile(&driver, &key, &render_config, elevation))
                .await
                .context("Task join error")?;

            match rendered {
                Ok((bytes, extension)) => {
                    let path = tile_path(&config.output_dir, (z, x, y), extension);
                    tokio::fs::write(&path, bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("Wrote {}", path.display());
                    Ok(())
                }
                Err(e) if e.is_recoverable() => {
                    tracing::debug!("Skipping tile {}/{}/{}: {}", z, x, y, e);
                    Ok(())
                }
                Err(e) => Err(anyhow::Error::new(e).context(format!("Tile {}/{}/{}", z, x, y))),
            }
        }
    });

    futures::future::try_join_all(jobs).await?;
    Ok(())
}

fn render_tile(
    driver: &Driver,
    key: &TileKey,
    config: &Config,
    elevation: bool,
) -> DriverResult<(Vec<u8>, &'static str)> {
    let io = IoOptions::default();
    if elevation {
        let heightfield = driver.create_heightfield(key, config.tile_size, &io)?;
        Ok((heightfield.to_le_bytes(), "f32"))
    } else {
        let format = config.raster_format();
        let image = driver.create_image(key, config.tile_size, &io)?;
        Ok((image.encode(format)?, format.extension()))
    }
}

fn parse_tile(arg: &str) -> anyhow::Result<(u32, u64, u64)> {
    let parts: Vec<&str> = arg.split('/').collect();
    let [z, x, y] = parts.as_slice() else {
        bail!("Invalid tile '{}', expected z/x/y", arg);
    };
    Ok((
        z.parse().with_context(|| format!("Invalid level in '{}'", arg))?,
        x.parse().with_context(|| format!("Invalid column in '{}'", arg))?,
        y.parse().with_context(|| format!("Invalid row in '{}'", arg))?,
    ))
}

fn tile_path(output_dir: &std::path::Path, (z, x, y): (u32, u64, u64), extension: &str) -> PathBuf {
    output_dir.join(format!("{}_{}_{}.{}", z, x, y, extension))
}

#[cfg(feature = "gdal-support")]
fn raster_library() -> anyhow::Result<Box<dyn RasterLibrary>> {
    Ok(Box::new(tilesampler::raster::gdal::GdalLibrary))
}

#[cfg(not(feature = "gdal-support"))]
fn raster_library() -> anyhow::Result<Box<dyn RasterLibrary>> {
    bail!(
        "Reading raster files requires the 'gdal-support' feature. \
        Build with: cargo build --features gdal-support"
    )
}
