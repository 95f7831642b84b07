pub mod api;
pub mod config;
pub mod store;
pub mod transport;
#[cfg(feature = "async-transport")]
pub mod transport_axum;

use routing::StoreAlias;
use store::{PhotoRecord, RoutedCatalog, Season, StoreError};

/// Writes the sample catalog through the routing gate. With no request in
/// flight the writes land wherever current-context resolution points:
/// process-wide override first, then the default alias.
pub fn seed_sample_photos(catalog: &mut RoutedCatalog) -> Result<(StoreAlias, usize), StoreError> {
    let alias = catalog.router().alias_for_write();
    let samples = sample_photos();
    let count = samples.len();
    for record in samples {
        catalog.insert_photo(record)?;
    }
    Ok((alias, count))
}

fn sample_photos() -> Vec<PhotoRecord> {
    vec![
        PhotoRecord {
            photo_id: "seed-riverside-dawn".to_string(),
            title: "Dawn mist on the riverside".to_string(),
            season: Season::Spring,
            zone: "riverside".to_string(),
            tags: vec!["dawn".to_string(), "mist".to_string()],
            uploaded_at_unix: None,
        },
        PhotoRecord {
            photo_id: "seed-harbor-dusk".to_string(),
            title: "Harbor lights at dusk".to_string(),
            season: Season::Summer,
            zone: "harbor".to_string(),
            tags: vec!["dusk".to_string()],
            uploaded_at_unix: None,
        },
        PhotoRecord {
            photo_id: "seed-oldtown-leaves".to_string(),
            title: "Falling leaves in the old town".to_string(),
            season: Season::Autumn,
            zone: "old-town".to_string(),
            tags: vec!["leaves".to_string(), "alley".to_string()],
            uploaded_at_unix: None,
        },
        PhotoRecord {
            photo_id: "seed-riverside-snow".to_string(),
            title: "First snow over the river".to_string(),
            season: Season::Winter,
            zone: "riverside".to_string(),
            tags: vec!["snow".to_string()],
            uploaded_at_unix: None,
        },
    ]
}
