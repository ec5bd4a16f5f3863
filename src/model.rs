use serde::{Deserialize, Serialize};

/// Placeholder for fields the source tables never carry explicitly.
pub const UNKNOWN: &str = "Unknown";

pub type SiteId = i64;

/// A site as produced by the harvester, before any store has given it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_code: String,
    pub name: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub site_type: String,
    pub status: String,
    pub wiki_url: String,
}

impl SiteRecord {
    /// Check the coordinate invariants, returning a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        check_latitude(self.latitude)?;
        check_longitude(self.longitude)
    }
}

/// A stored site. Serialized flat: `id` sits next to the record fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    #[serde(flatten)]
    pub record: SiteRecord,
}

impl Site {
    pub fn new(id: SiteId, record: SiteRecord) -> Self {
        Self { id, record }
    }
}

/// Partial update: only `Some` fields are merged into the stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wiki_url: Option<String>,
}

impl SitePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(lat) = self.latitude {
            check_latitude(lat)?;
        }
        if let Some(lon) = self.longitude {
            check_longitude(lon)?;
        }
        Ok(())
    }

    /// Merge the supplied fields into `record`, leaving the rest untouched.
    pub fn apply(&self, record: &mut SiteRecord) {
        fn merge<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        merge(&mut record.site_code, &self.site_code);
        merge(&mut record.name, &self.name);
        merge(&mut record.state, &self.state);
        merge(&mut record.latitude, &self.latitude);
        merge(&mut record.longitude, &self.longitude);
        merge(&mut record.description, &self.description);
        merge(&mut record.site_type, &self.site_type);
        merge(&mut record.status, &self.status);
        merge(&mut record.wiki_url, &self.wiki_url);
    }
}

fn check_latitude(lat: f64) -> Result<(), String> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(format!("latitude {} outside [-90, 90]", lat))
    }
}

fn check_longitude(lon: f64) -> Result<(), String> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(format!("longitude {} outside [-180, 180]", lon))
    }
}

// ── External wire shape ──

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// How a site is exposed outside the storage layer: coordinates nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteView {
    pub id: SiteId,
    pub site_code: String,
    pub name: String,
    pub state: String,
    pub coordinates: LatLng,
    pub description: String,
    pub site_type: String,
    pub status: String,
    pub wiki_url: String,
}

impl From<&Site> for SiteView {
    fn from(site: &Site) -> Self {
        let r = &site.record;
        Self {
            id: site.id,
            site_code: r.site_code.clone(),
            name: r.name.clone(),
            state: r.state.clone(),
            coordinates: LatLng {
                lat: r.latitude,
                lng: r.longitude,
            },
            description: r.description.clone(),
            site_type: r.site_type.clone(),
            status: r.status.clone(),
            wiki_url: r.wiki_url.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample(code: &str, name: &str, state: &str) -> SiteRecord {
    SiteRecord {
        site_code: code.to_string(),
        name: name.to_string(),
        state: state.to_string(),
        latitude: 40.5,
        longitude: -74.25,
        description: format!("{} launch area", name),
        site_type: UNKNOWN.to_string(),
        status: UNKNOWN.to_string(),
        wiki_url: "https://en.wikipedia.org/wiki/List_of_Nike_missile_sites".to_string(),
    }
}
