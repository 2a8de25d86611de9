//! Image records as listed by the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Creates a new image ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Visibility of an image in the catalog.
///
/// Only `public` is special-cased by the retention rules. The catalog's
/// `shared` and `community` visibilities deserialize as [`Visibility::Private`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Visibility {
    /// Visible to every project; always retained.
    Public,
    /// Subject to the retention rules.
    #[default]
    Private,
}

impl Visibility {
    /// Returns the visibility as the catalog spells it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    /// Parses a visibility string. Anything other than `public` is private.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("public") {
            Self::Public
        } else {
            Self::Private
        }
    }

    /// Returns `true` for [`Visibility::Public`].
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

impl From<String> for Visibility {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A virtual-machine image record.
///
/// Images are read-only inputs to a cleanup run. `tags` keeps the catalog's
/// order because tag iteration order is observable in tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Unique identifier.
    pub id: ImageId,
    /// Catalog name; images of one CI job share a name.
    #[serde(default)]
    pub name: String,
    /// Free-form tags, usually commit ids and branch names.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Catalog visibility.
    #[serde(default)]
    pub visibility: Visibility,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether the catalog refuses to delete the image.
    #[serde(default)]
    pub protected: bool,
    /// Whether the image is hidden from default listings.
    #[serde(default)]
    pub hidden: bool,
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Custom catalog properties, such as `os_distro` or build metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Image {
    /// Creates a private, untagged image.
    #[must_use]
    pub fn new(id: impl Into<ImageId>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            tags: Vec::new(),
            visibility: Visibility::Private,
            created_at,
            protected: false,
            hidden: false,
            owner: None,
            properties: BTreeMap::new(),
        }
    }

    /// Sets the image name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the visibility.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Sets the protected flag.
    #[must_use]
    pub const fn with_protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Sets the hidden flag.
    #[must_use]
    pub const fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Sets the owning project.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets one custom property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the image is public.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.visibility.is_public()
    }

    /// Returns `true` if the image carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
