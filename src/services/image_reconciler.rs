//! Image relation reconciliation for the opportunity update path.
//!
//! The admin UI always sends the complete desired image list. Given that list and
//! the images currently attached, [`reconcile`] decides what to disconnect, what to
//! connect, and which inline images must be created first. It performs no writes;
//! the caller applies the resulting [`ReconciliationPlan`] inside its transaction.

use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::storage::file_info_from_url;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Client-side image identifier. The admin UI marks images without a stored
/// identifier with `-1`; older payloads send `null` or an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageIdentifier {
    #[default]
    Unset,
    Id(ImageId),
}

impl ImageIdentifier {
    pub fn id(&self) -> Option<&ImageId> {
        match self {
            ImageIdentifier::Unset => None,
            ImageIdentifier::Id(id) => Some(id),
        }
    }
}

impl<'de> Deserialize<'de> for ImageIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        match raw {
            None | Some(Value::Null) => Ok(ImageIdentifier::Unset),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) if i >= 0 => Ok(ImageIdentifier::Id(ImageId::new(i.to_string()))),
                Some(_) => Ok(ImageIdentifier::Unset),
                None => Err(serde::de::Error::custom(format!("invalid image id: {}", n))),
            },
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "-1" {
                    Ok(ImageIdentifier::Unset)
                } else {
                    Ok(ImageIdentifier::Id(ImageId::new(trimmed)))
                }
            }
            Some(other) => Err(serde::de::Error::custom(format!("invalid image id: {}", other))),
        }
    }
}

/// One entry of the desired image list, as the admin UI sends it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedImage {
    #[serde(default)]
    pub id: ImageIdentifier,
    pub url: Option<String>,
    pub name: Option<String>,
    pub size: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub mime: Option<String>,
    pub ext: Option<String>,
    pub alternative_text: Option<String>,
    pub caption: Option<String>,
}

impl SubmittedImage {
    pub fn usable_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    fn identity_key(&self) -> Option<IdentityKey> {
        if let Some(url) = self.usable_url() {
            return Some(IdentityKey::Url(url.to_string()));
        }
        self.id.id().map(|id| IdentityKey::Id(id.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Url(String),
    Id(ImageId),
}

/// An image currently attached to the entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingImage {
    pub id: ImageId,
    pub url: String,
}

/// A complete image record ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    /// Numeric id the upload plugin assigned, kept for provenance
    pub strapi_id: Option<i32>,
    pub url: String,
    pub bucket: Option<String>,
    pub folder_path: String,
    pub filename: String,
    pub size: f64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub mime: String,
    pub ext: String,
    pub alt: Option<String>,
    pub caption: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("image has neither a url nor an id")]
    MissingIdentity,

    #[error("image is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("image url does not name a storage object: {0}")]
    InvalidUrl(String),
}

impl TryFrom<&SubmittedImage> for NewImage {
    type Error = TransformError;

    fn try_from(image: &SubmittedImage) -> Result<Self, Self::Error> {
        let url = image.usable_url().ok_or(TransformError::MissingField("url"))?;
        let info = file_info_from_url(Some(url));
        let Some(filename) = info.filename else {
            return Err(TransformError::InvalidUrl(url.to_string()));
        };

        let size = image
            .size
            .filter(|s| s.is_finite() && *s >= 0.0)
            .ok_or(TransformError::MissingField("size"))?;
        let mime = non_blank(image.mime.as_deref()).ok_or(TransformError::MissingField("mime"))?;
        let ext = non_blank(image.ext.as_deref()).ok_or(TransformError::MissingField("ext"))?;

        Ok(NewImage {
            strapi_id: image.id.id().and_then(|id| id.as_str().parse().ok()),
            url: url.to_string(),
            bucket: info.bucket,
            folder_path: info.folder_path.unwrap_or_default(),
            filename,
            size,
            width: image.width,
            height: image.height,
            mime,
            ext,
            alt: non_blank(image.alternative_text.as_deref()),
            caption: non_blank(image.caption.as_deref()),
            is_public: true,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(str::to_string)
}

/// A submitted entry that could not be used
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFailure {
    /// Position in the submitted list
    pub index: usize,
    pub url: Option<String>,
    pub reason: TransformError,
}

impl ImageFailure {
    fn new(index: usize, image: &SubmittedImage, reason: TransformError) -> Self {
        Self {
            index,
            url: image.usable_url().map(str::to_string),
            reason,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub to_disconnect: Vec<ImageId>,
    pub to_connect: Vec<ImageId>,
    pub to_create: Vec<NewImage>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_disconnect.is_empty() && self.to_connect.is_empty() && self.to_create.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    /// `None` when there is nothing to apply
    pub plan: Option<ReconciliationPlan>,
    pub failures: Vec<ImageFailure>,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct LookupError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl LookupError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("image id lookup failed: {0}")]
    IdLookup(#[source] LookupError),

    #[error("image url lookup failed: {0}")]
    UrlLookup(#[source] LookupError),
}

/// Store queries the reconciler needs. Implementations run on the caller's
/// connection so lookups see the same transaction the plan is applied in.
#[async_trait]
pub trait ImageLookup: Send {
    /// Which of `ids` exist in the store
    async fn existing_ids(&mut self, ids: &[ImageId]) -> Result<HashSet<ImageId>, LookupError>;

    /// Stored images whose url is one of `urls`, keyed by url
    async fn find_by_urls(&mut self, urls: &[String]) -> Result<HashMap<String, ImageId>, LookupError>;
}

pub async fn reconcile<L>(
    submitted: &[SubmittedImage],
    existing: &[ExistingImage],
    lookup: &mut L,
) -> Result<ReconcileOutcome, ReconcileError>
where
    L: ImageLookup + ?Sized,
{
    let mut failures = Vec::new();

    // Later entries replace earlier ones with the same identity
    let mut unique: IndexMap<IdentityKey, (usize, &SubmittedImage)> = IndexMap::new();
    for (index, image) in submitted.iter().enumerate() {
        match image.identity_key() {
            Some(key) => {
                unique.insert(key, (index, image));
            }
            None => {
                tracing::warn!(index, "Skipping image without url or id");
                failures.push(ImageFailure::new(index, image, TransformError::MissingIdentity));
            }
        }
    }

    let mut identified: Vec<ImageId> = Vec::new();
    let mut unidentified: Vec<(usize, &SubmittedImage, String)> = Vec::new();
    for (index, image) in unique.into_values() {
        match (&image.id, image.usable_url()) {
            (ImageIdentifier::Id(id), _) => identified.push(id.clone()),
            (ImageIdentifier::Unset, Some(url)) => unidentified.push((index, image, url.to_string())),
            // Keyed by url or id, so one of the two is always present
            (ImageIdentifier::Unset, None) => {}
        }
    }

    let mut to_connect: IndexSet<ImageId> = IndexSet::new();

    if !identified.is_empty() {
        let found = lookup
            .existing_ids(&identified)
            .await
            .map_err(ReconcileError::IdLookup)?;
        for id in identified {
            if found.contains(&id) {
                to_connect.insert(id);
            } else {
                tracing::debug!(image_id = %id, "Dropping stale image reference");
            }
        }
    }

    let mut to_create = Vec::new();
    if !unidentified.is_empty() {
        let urls: Vec<String> = unidentified.iter().map(|(_, _, url)| url.clone()).collect();
        let matched = lookup
            .find_by_urls(&urls)
            .await
            .map_err(ReconcileError::UrlLookup)?;
        for (index, image, url) in unidentified {
            if let Some(id) = matched.get(&url) {
                tracing::debug!(image_id = %id, url = %url, "Connecting stored image by url");
                to_connect.insert(id.clone());
                continue;
            }
            match NewImage::try_from(image) {
                Ok(record) => to_create.push(record),
                Err(reason) => {
                    tracing::warn!(index, url = %url, error = %reason, "Skipping image that cannot be stored");
                    failures.push(ImageFailure::new(index, image, reason));
                }
            }
        }
    }

    let mut to_disconnect: IndexSet<ImageId> = IndexSet::new();
    for image in existing {
        if to_disconnect.insert(image.id.clone()) {
            tracing::debug!(image_id = %image.id, url = %image.url, "Detaching current image");
        }
    }

    let plan = ReconciliationPlan {
        to_disconnect: to_disconnect.into_iter().collect(),
        to_connect: to_connect.into_iter().collect(),
        to_create,
    };
    tracing::debug!(
        disconnect = plan.to_disconnect.len(),
        connect = plan.to_connect.len(),
        create = plan.to_create.len(),
        failures = failures.len(),
        "Reconciled image relation"
    );

    Ok(ReconcileOutcome {
        plan: if plan.is_empty() { None } else { Some(plan) },
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct MemoryImages {
        ids: HashSet<ImageId>,
        urls: HashMap<String, ImageId>,
        fail: bool,
        id_lookups: usize,
        url_lookups: usize,
    }

    #[derive(Debug, Error)]
    #[error("store offline")]
    struct Offline;

    impl MemoryImages {
        fn with(ids: &[&str], urls: &[(&str, &str)]) -> Self {
            Self {
                ids: ids.iter().map(|id| ImageId::from(*id)).collect(),
                urls: urls.iter().map(|(u, id)| (u.to_string(), ImageId::from(*id))).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ImageLookup for MemoryImages {
        async fn existing_ids(&mut self, ids: &[ImageId]) -> Result<HashSet<ImageId>, LookupError> {
            self.id_lookups += 1;
            if self.fail {
                return Err(LookupError::new(Offline));
            }
            Ok(ids.iter().filter(|id| self.ids.contains(*id)).cloned().collect())
        }

        async fn find_by_urls(&mut self, urls: &[String]) -> Result<HashMap<String, ImageId>, LookupError> {
            self.url_lookups += 1;
            if self.fail {
                return Err(LookupError::new(Offline));
            }
            Ok(urls
                .iter()
                .filter_map(|u| self.urls.get(u).map(|id| (u.clone(), id.clone())))
                .collect())
        }
    }

    fn by_id(id: &str) -> SubmittedImage {
        SubmittedImage { id: ImageIdentifier::Id(ImageId::from(id)), ..Default::default() }
    }

    fn inline(url: &str) -> SubmittedImage {
        SubmittedImage {
            url: Some(url.to_string()),
            size: Some(100.0),
            width: Some(10),
            height: Some(10),
            mime: Some("image/jpeg".to_string()),
            ext: Some(".jpg".to_string()),
            ..Default::default()
        }
    }

    fn existing(ids: &[&str]) -> Vec<ExistingImage> {
        ids.iter()
            .map(|id| ExistingImage {
                id: ImageId::from(*id),
                url: format!("https://storage.googleapis.com/bucket/images/{}.jpg", id),
            })
            .collect()
    }

    fn ids(values: &[&str]) -> Vec<ImageId> {
        values.iter().map(|v| ImageId::from(*v)).collect()
    }

    fn sorted(mut v: Vec<ImageId>) -> Vec<ImageId> {
        v.sort();
        v
    }

    #[test]
    fn identifier_sentinels_deserialize_as_unset() {
        for raw in [json!(-1), json!("-1"), json!(null), json!(""), json!("  ")] {
            let image: SubmittedImage = serde_json::from_value(json!({ "id": raw })).unwrap();
            assert_eq!(image.id, ImageIdentifier::Unset, "{:?}", raw);
        }
        let missing: SubmittedImage = serde_json::from_value(json!({ "url": "x" })).unwrap();
        assert_eq!(missing.id, ImageIdentifier::Unset);

        let numeric: SubmittedImage = serde_json::from_value(json!({ "id": 42 })).unwrap();
        assert_eq!(numeric.id, ImageIdentifier::Id(ImageId::from("42")));
        let text: SubmittedImage = serde_json::from_value(json!({ "id": "img-7" })).unwrap();
        assert_eq!(text.id, ImageIdentifier::Id(ImageId::from("img-7")));

        assert!(serde_json::from_value::<SubmittedImage>(json!({ "id": true })).is_err());
    }

    #[test]
    fn transforms_inline_image() {
        let mut image = inline("https://storage.googleapis.com/bucket/images/opp/new.jpg");
        image.alternative_text = Some("".to_string());
        image.caption = Some("Harbor at dusk".to_string());
        let record = NewImage::try_from(&image).unwrap();
        assert_eq!(record.bucket.as_deref(), Some("bucket"));
        assert_eq!(record.folder_path, "images/opp");
        assert_eq!(record.filename, "new.jpg");
        assert_eq!(record.alt, None);
        assert_eq!(record.caption.as_deref(), Some("Harbor at dusk"));
        assert!(record.is_public);
        assert_eq!(record.strapi_id, None);

        let mut no_mime = image.clone();
        no_mime.mime = None;
        assert_eq!(NewImage::try_from(&no_mime), Err(TransformError::MissingField("mime")));
    }

    #[tokio::test]
    async fn mixed_submission_scenario() {
        let mut store = MemoryImages::with(&["a", "b"], &[]);
        let submitted = vec![by_id("a"), inline("http://x/new.jpg")];

        let outcome = reconcile(&submitted, &existing(&["a", "b"]), &mut store).await.unwrap();
        let plan = outcome.plan.unwrap();
        assert_eq!(plan.to_disconnect, ids(&["a", "b"]));
        assert_eq!(plan.to_connect, ids(&["a"]));
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].url, "http://x/new.jpg");
        assert_eq!(plan.to_create[0].filename, "new.jpg");
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn empty_submission_disconnects_everything() {
        let mut store = MemoryImages::default();
        let outcome = reconcile(&[], &existing(&["a", "b"]), &mut store).await.unwrap();
        let plan = outcome.plan.unwrap();
        assert_eq!(plan.to_disconnect, ids(&["a", "b"]));
        assert!(plan.to_connect.is_empty());
        assert!(plan.to_create.is_empty());
        assert_eq!(store.id_lookups + store.url_lookups, 0);
    }

    #[tokio::test]
    async fn nothing_to_do_yields_no_plan() {
        let mut store = MemoryImages::default();
        let outcome = reconcile(&[], &[], &mut store).await.unwrap();
        assert!(outcome.plan.is_none());
    }

    #[tokio::test]
    async fn sentinel_without_url_is_a_failure() {
        let mut store = MemoryImages::default();
        let submitted: Vec<SubmittedImage> = serde_json::from_value(json!([{ "id": -1 }])).unwrap();
        let outcome = reconcile(&submitted, &[], &mut store).await.unwrap();
        assert!(outcome.plan.is_none());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 0);
        assert_eq!(outcome.failures[0].reason, TransformError::MissingIdentity);
    }

    #[tokio::test]
    async fn stale_ids_are_dropped() {
        let mut store = MemoryImages::with(&["a"], &[]);
        let submitted = vec![by_id("a"), by_id("gone")];
        let plan = reconcile(&submitted, &[], &mut store).await.unwrap().plan.unwrap();
        assert_eq!(plan.to_connect, ids(&["a"]));
        assert!(plan.to_create.is_empty());
    }

    #[tokio::test]
    async fn same_url_collapses_to_last_entry() {
        let mut store = MemoryImages::with(&["1", "2"], &[]);
        let url = "https://storage.googleapis.com/bucket/images/a.jpg";
        let mut first = inline(url);
        first.id = ImageIdentifier::Id(ImageId::from("1"));
        let mut second = inline(url);
        second.id = ImageIdentifier::Id(ImageId::from("2"));

        let plan = reconcile(&[first, second], &[], &mut store).await.unwrap().plan.unwrap();
        assert_eq!(plan.to_connect, ids(&["2"]));
    }

    #[tokio::test]
    async fn connects_are_never_repeated() {
        let mut store = MemoryImages::with(&["a"], &[("https://storage.googleapis.com/bucket/c.jpg", "a")]);
        // Two urls carrying the same id, plus a bare url resolving to that id
        let mut one = inline("https://storage.googleapis.com/bucket/a.jpg");
        one.id = ImageIdentifier::Id(ImageId::from("a"));
        let mut two = inline("https://storage.googleapis.com/bucket/b.jpg");
        two.id = ImageIdentifier::Id(ImageId::from("a"));
        let three = inline("https://storage.googleapis.com/bucket/c.jpg");

        let plan = reconcile(&[one, two, three, by_id("a")], &[], &mut store)
            .await
            .unwrap()
            .plan
            .unwrap();
        assert_eq!(plan.to_connect, ids(&["a"]));
        assert!(plan.to_create.is_empty());
    }

    #[tokio::test]
    async fn url_match_connects_and_miss_creates() {
        let known = "https://storage.googleapis.com/bucket/known.jpg";
        let fresh = "https://storage.googleapis.com/bucket/fresh.jpg";
        let mut store = MemoryImages::with(&[], &[(known, "k")]);

        let plan = reconcile(&[inline(known), inline(fresh)], &[], &mut store)
            .await
            .unwrap()
            .plan
            .unwrap();
        assert_eq!(plan.to_connect, ids(&["k"]));
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].url, fresh);
    }

    #[tokio::test]
    async fn permuted_input_gives_same_sets() {
        let urls = [
            "https://storage.googleapis.com/bucket/1.jpg",
            "https://storage.googleapis.com/bucket/2.jpg",
            "https://storage.googleapis.com/bucket/3.jpg",
        ];
        let forward: Vec<SubmittedImage> = vec![inline(urls[0]), by_id("x"), inline(urls[1]), inline(urls[2])];
        let backward: Vec<SubmittedImage> = forward.iter().rev().cloned().collect();

        let mut store = MemoryImages::with(&["x"], &[(urls[1], "two")]);
        let a = reconcile(&forward, &existing(&["x"]), &mut store).await.unwrap().plan.unwrap();
        let b = reconcile(&backward, &existing(&["x"]), &mut store).await.unwrap().plan.unwrap();

        assert_eq!(sorted(a.to_connect), sorted(b.to_connect));
        let mut created_a: Vec<String> = a.to_create.into_iter().map(|r| r.url).collect();
        let mut created_b: Vec<String> = b.to_create.into_iter().map(|r| r.url).collect();
        created_a.sort();
        created_b.sort();
        assert_eq!(created_a, created_b);
        assert_eq!(a.to_disconnect, b.to_disconnect);
    }

    #[tokio::test]
    async fn disconnect_covers_all_existing() {
        let mut store = MemoryImages::with(&["a", "c"], &[]);
        let outcome = reconcile(&[by_id("c")], &existing(&["a", "b", "c"]), &mut store)
            .await
            .unwrap();
        assert_eq!(outcome.plan.unwrap().to_disconnect, ids(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn duplicate_attachments_disconnect_once() {
        let mut store = MemoryImages::default();
        let mut current = existing(&["a", "b"]);
        current.push(ExistingImage { id: ImageId::from("a"), url: "https://cdn.example.com/a-copy.jpg".to_string() });
        let outcome = reconcile(&[], &current, &mut store).await.unwrap();
        assert_eq!(outcome.plan.unwrap().to_disconnect, ids(&["a", "b"]));
    }

    #[tokio::test]
    async fn transform_failures_do_not_abort() {
        let mut store = MemoryImages::default();
        let mut broken = inline("https://storage.googleapis.com/bucket/broken.png");
        broken.ext = None;
        let good = inline("https://storage.googleapis.com/bucket/good.jpg");

        let outcome = reconcile(&[broken, good], &[], &mut store).await.unwrap();
        let plan = outcome.plan.unwrap();
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 0);
        assert_eq!(outcome.failures[0].reason, TransformError::MissingField("ext"));
    }

    #[tokio::test]
    async fn lookup_failure_is_fatal() {
        let mut store = MemoryImages { fail: true, ..Default::default() };
        let err = reconcile(&[by_id("a")], &existing(&["a"]), &mut store).await.unwrap_err();
        assert!(matches!(err, ReconcileError::IdLookup(_)));

        let mut store = MemoryImages { fail: true, ..Default::default() };
        let err = reconcile(&[inline("https://storage.googleapis.com/bucket/a.jpg")], &[], &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::UrlLookup(_)));
    }
}
