//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - title: Desk Lamp
//!     price: 24.99
//!     description: A bright lamp for late nights.
//!     image: images/desk-lamp.png
//! ```
//!
//! Image paths are relative to the YAML file. Each image is copied into the
//! storefront image directory (`STOREFRONT_IMAGES_DIR`, default `images`).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use bazaar_core::Email;
use bazaar_storefront::db::{self, ProductRepository, RepositoryError, UserRepository};
use bazaar_storefront::services::validation::validate_product;
use bazaar_storefront::services::{ImageStore, UploadError};

/// Errors that stop seeding before any product is inserted.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("No user with email {0}")]
    UnknownOwner(String),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Root of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<SeedProduct>,
}

/// One product entry.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub title: String,
    pub price: SeedPrice,
    pub description: String,
    pub image: PathBuf,
}

/// Prices may be written as YAML numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SeedPrice {
    Number(serde_yaml::Number),
    Text(String),
}

impl SeedPrice {
    fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Guess an upload content type from the file extension.
fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Insert every product in `file_path`, owned by the user with `owner_email`.
///
/// Invalid entries are logged and skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the owner does
/// not exist, or the database is unreachable.
pub async fn products(file_path: &str, owner_email: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    let owner_email =
        Email::parse(owner_email).map_err(|_| SeedError::InvalidEmail(owner_email.to_owned()))?;
    let database_url = super::database_url().ok_or(SeedError::MissingDatabaseUrl)?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let owner = UserRepository::new(&pool)
        .get_by_email(&owner_email)
        .await?
        .ok_or_else(|| SeedError::UnknownOwner(owner_email.to_string()))?;

    let images_dir = std::env::var("STOREFRONT_IMAGES_DIR").unwrap_or_else(|_| "images".to_owned());
    let images = ImageStore::new(images_dir);
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let repo = ProductRepository::new(&pool);

    let mut inserted = 0_usize;
    let mut failures = Vec::new();

    for entry in &seed.products {
        let input = match validate_product(&entry.title, &entry.price.as_text(), &entry.description) {
            Ok(input) => input,
            Err(errors) => {
                let message = errors.first_message().unwrap_or("invalid").to_owned();
                failures.push((entry.title.clone(), message));
                continue;
            }
        };

        let image_path = base_dir.join(&entry.image);
        let stored = match store_image(&images, &image_path).await {
            Ok(name) => name,
            Err(e) => {
                failures.push((entry.title.clone(), e.to_string()));
                continue;
            }
        };

        repo.create(owner.id, &input, &stored).await?;
        inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    if !failures.is_empty() {
        error!("  Skipped: {}", failures.len());
        for (title, reason) in &failures {
            error!("    - {title}: {reason}");
        }
    }

    Ok(())
}

async fn store_image(images: &ImageStore, path: &Path) -> Result<String, UploadError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image");
    images.save(name, content_type_for(path), &bytes).await
}
