use std::collections::BTreeMap;

use routing::{StoreAlias, StoreRouter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
            Self::Winter => "winter",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spring" => Some(Self::Spring),
            "summer" => Some(Self::Summer),
            "autumn" => Some(Self::Autumn),
            "winter" => Some(Self::Winter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub photo_id: String,
    pub title: String,
    pub season: Season,
    pub zone: String,
    pub tags: Vec<String>,
    pub uploaded_at_unix: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Validation(&'static str),
    DuplicatePhoto(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoFilter {
    pub season: Option<Season>,
    pub zone: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoStore {
    photos: BTreeMap<String, PhotoRecord>,
}

impl PhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: PhotoRecord) -> Result<(), StoreError> {
        validate_photo(&record)?;
        if self.photos.contains_key(&record.photo_id) {
            return Err(StoreError::DuplicatePhoto(record.photo_id));
        }
        self.photos.insert(record.photo_id.clone(), record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn get(&self, photo_id: &str) -> Option<&PhotoRecord> {
        self.photos.get(photo_id)
    }

    pub fn filtered(&self, filter: &PhotoFilter) -> Vec<PhotoRecord> {
        self.photos
            .values()
            .filter(|photo| filter.season.is_none_or(|season| photo.season == season))
            .filter(|photo| {
                filter
                    .zone
                    .as_deref()
                    .is_none_or(|zone| photo.zone.eq_ignore_ascii_case(zone))
            })
            .filter(|photo| {
                filter
                    .tag
                    .as_deref()
                    .is_none_or(|tag| photo.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            })
            .cloned()
            .collect()
    }
}

fn validate_photo(record: &PhotoRecord) -> Result<(), StoreError> {
    if record.photo_id.trim().is_empty() {
        return Err(StoreError::Validation("photo_id must not be empty"));
    }
    if record.title.trim().is_empty() {
        return Err(StoreError::Validation("title must not be empty"));
    }
    if record.zone.trim().is_empty() {
        return Err(StoreError::Validation("zone must not be empty"));
    }
    if record.tags.iter().any(|tag| tag.trim().is_empty()) {
        return Err(StoreError::Validation("tags must not contain empty entries"));
    }
    Ok(())
}

/// One backing store per alias; every access asks the router which store the
/// current unit of work resolves to.
#[derive(Debug, Clone)]
pub struct RoutedCatalog {
    router: StoreRouter,
    primary: PhotoStore,
    secondary: PhotoStore,
}

impl RoutedCatalog {
    pub fn new(router: StoreRouter) -> Self {
        Self {
            router,
            primary: PhotoStore::new(),
            secondary: PhotoStore::new(),
        }
    }

    pub fn router(&self) -> &StoreRouter {
        &self.router
    }

    pub fn store(&self, alias: StoreAlias) -> &PhotoStore {
        match alias {
            StoreAlias::Primary => &self.primary,
            StoreAlias::Secondary => &self.secondary,
        }
    }

    fn store_mut(&mut self, alias: StoreAlias) -> &mut PhotoStore {
        match alias {
            StoreAlias::Primary => &mut self.primary,
            StoreAlias::Secondary => &mut self.secondary,
        }
    }

    pub fn insert_photo(&mut self, record: PhotoRecord) -> Result<(StoreAlias, usize), StoreError> {
        let alias = self.router.alias_for_write();
        let store = self.store_mut(alias);
        store.insert(record)?;
        Ok((alias, store.len()))
    }

    pub fn list_photos(&self, filter: &PhotoFilter) -> (StoreAlias, Vec<PhotoRecord>) {
        let alias = self.router.alias_for_read();
        (alias, self.store(alias).filtered(filter))
    }
}
