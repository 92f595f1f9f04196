//! Catalog types and the read-only accessor over the catalog JSON document.
//!
//! The document is fetched once (local file or `http(s)://` URL) and cached for
//! the rest of the session.  Nothing in this module mutates it.

use std::future::Future;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("song {song_id} is listed under album {album_id} but claims album {claimed}")]
    ForeignSong {
        song_id: String,
        album_id: String,
        claimed: String,
    },
    #[error("duplicate album id {0}")]
    DuplicateAlbum(String),
    #[error("catalog document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    /// URI of the audio file handed to the decoding resource.
    pub audio_file: String,
    pub album_id: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    /// Length in seconds, when the catalog knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlbumType {
    #[serde(rename = "single")]
    Single,
    #[serde(rename = "EP")]
    Ep,
    #[serde(rename = "album")]
    Album,
    #[serde(rename = "mixtape")]
    Mixtape,
    #[serde(rename = "podcast")]
    Podcast,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Album {
    pub album_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub album_type: AlbumType,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub cover: String,
    /// Ordered; this order is the next/previous traversal order.
    #[serde(default)]
    pub songs: Vec<Song>,
    pub date: NaiveDate,
}

impl Album {
    /// Index of `song_id` in the track list.
    pub fn position_of(&self, song_id: &str) -> Option<usize> {
        self.songs.iter().position(|s| s.song_id == song_id)
    }

    pub fn song(&self, song_id: &str) -> Option<&Song> {
        self.songs.iter().find(|s| s.song_id == song_id)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for song in &self.songs {
            if song.album_id != self.album_id {
                return Err(CatalogError::ForeignSong {
                    song_id: song.song_id.clone(),
                    album_id: self.album_id.clone(),
                    claimed: song.album_id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The whole catalog document, held in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub albums: Vec<Album>,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

impl Catalog {
    pub fn new(albums: Vec<Album>, artists: Vec<Artist>) -> Result<Self, CatalogError> {
        let catalog = Self { albums, artists };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn parse(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for album in &self.albums {
            if !seen.insert(album.album_id.as_str()) {
                return Err(CatalogError::DuplicateAlbum(album.album_id.clone()));
            }
            album.validate()?;
        }
        Ok(())
    }

    pub fn album(&self, album_id: &str) -> Option<&Album> {
        self.albums.iter().find(|a| a.album_id == album_id)
    }

    /// Looks through the top-level artist list first, then album and song credits.
    pub fn artist(&self, artist_id: &str) -> Option<&Artist> {
        self.artists
            .iter()
            .chain(self.albums.iter().flat_map(|a| a.artists.iter()))
            .chain(
                self.albums
                    .iter()
                    .flat_map(|a| a.songs.iter())
                    .flat_map(|s| s.artists.iter()),
            )
            .find(|a| a.artist_id == artist_id)
    }
}

// ── accessor ──────────────────────────────────────────────────────────────────

/// Async, side-effect-free lookups into the catalog.
pub trait CatalogAccessor: Send + Sync {
    fn get_album_by_id(&self, album_id: &str) -> impl Future<Output = Option<Album>> + Send;
    fn get_albums(&self) -> impl Future<Output = Vec<Album>> + Send;
    fn get_artist_by_id(&self, artist_id: &str) -> impl Future<Output = Option<Artist>> + Send;
}

impl CatalogAccessor for Catalog {
    async fn get_album_by_id(&self, album_id: &str) -> Option<Album> {
        self.album(album_id).cloned()
    }

    async fn get_albums(&self) -> Vec<Album> {
        self.albums.clone()
    }

    async fn get_artist_by_id(&self, artist_id: &str) -> Option<Artist> {
        self.artist(artist_id).cloned()
    }
}

/// Loads the catalog document on first use and serves every later lookup from
/// memory.  A failed load is logged and served as an empty catalog.
pub struct CachedCatalog {
    source: String,
    cell: OnceCell<Catalog>,
}

impl CachedCatalog {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            cell: OnceCell::new(),
        }
    }

    pub async fn catalog(&self) -> &Catalog {
        self.cell
            .get_or_init(|| async {
                match load_catalog(&self.source).await {
                    Ok(c) => {
                        info!(
                            "Loaded catalog from {}: {} albums, {} artists",
                            self.source,
                            c.albums.len(),
                            c.artists.len()
                        );
                        c
                    }
                    Err(e) => {
                        warn!("Failed to load catalog from {}: {:#}", self.source, e);
                        Catalog::default()
                    }
                }
            })
            .await
    }
}

impl CatalogAccessor for CachedCatalog {
    async fn get_album_by_id(&self, album_id: &str) -> Option<Album> {
        self.catalog().await.album(album_id).cloned()
    }

    async fn get_albums(&self) -> Vec<Album> {
        self.catalog().await.albums.clone()
    }

    async fn get_artist_by_id(&self, artist_id: &str) -> Option<Artist> {
        self.catalog().await.artist(artist_id).cloned()
    }
}

// ── loaders ───────────────────────────────────────────────────────────────────

pub async fn load_catalog(source: &str) -> anyhow::Result<Catalog> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_catalog_url(source).await
    } else {
        load_catalog_file(Path::new(source)).await
    }
}

pub async fn load_catalog_file(path: &Path) -> anyhow::Result<Catalog> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(Catalog::parse(&content)?)
}

async fn fetch_catalog_url(url: &str) -> anyhow::Result<Catalog> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }
    let text = response.text().await?;
    Ok(Catalog::parse(&text)?)
}
