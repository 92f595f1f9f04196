use nowplaying_proto::catalog::{CachedCatalog, CatalogAccessor};
use std::io::Write;

const DOC: &str = r#"{
    "albums": [
        {
            "album_id": "spring-showcase",
            "name": "Spring Showcase",
            "type": "album",
            "artists": [{"artist_id": "ensemble", "name": "Youth Ensemble"}],
            "cover": "/covers/spring.jpg",
            "date": "2024-04-20",
            "songs": [
                {"song_id": "overture", "title": "Overture", "audio_file": "/audio/overture.mp3", "album_id": "spring-showcase"},
                {"song_id": "finale", "title": "Finale", "audio_file": "/audio/finale.mp3", "album_id": "spring-showcase", "duration": 240.0}
            ]
        },
        {
            "album_id": "voices",
            "name": "Voices",
            "type": "podcast",
            "cover": "/covers/voices.jpg",
            "date": "2024-06-01",
            "songs": []
        }
    ],
    "artists": [{"artist_id": "ensemble", "name": "Youth Ensemble", "profile_picture": "/img/ensemble.png"}]
}"#;

#[tokio::test]
async fn cached_catalog_reads_file_once() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(DOC.as_bytes()).unwrap();
    let path = file.path().display().to_string();

    let catalog = CachedCatalog::new(path);
    assert_eq!(catalog.get_albums().await.len(), 2);

    // Later edits to the file are not observed: the document is cached.
    std::fs::write(file.path(), r#"{"albums": [], "artists": []}"#).unwrap();
    let album = catalog.get_album_by_id("spring-showcase").await.unwrap();
    assert_eq!(album.songs.len(), 2);
    assert_eq!(album.position_of("finale"), Some(1));

    let artist = catalog.get_artist_by_id("ensemble").await.unwrap();
    assert_eq!(artist.profile_picture.as_deref(), Some("/img/ensemble.png"));
}

#[tokio::test]
async fn missing_file_serves_empty_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = CachedCatalog::new(dir.path().join("nope.json").display().to_string());
    assert!(catalog.get_albums().await.is_empty());
    assert!(catalog.get_album_by_id("spring-showcase").await.is_none());
}
