//! Catalog query and update descriptors.

use super::{ImageId, Visibility};

/// Filter applied when listing images.
///
/// Every field narrows the listing; an empty filter matches all images the
/// credentials can see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFilter {
    /// Owning project.
    pub owner: Option<String>,
    /// Exact image name.
    pub name: Option<String>,
    /// Exact image id.
    pub id: Option<ImageId>,
}

impl ImageFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            owner: None,
            name: None,
            id: None,
        }
    }

    /// Restricts the listing to one owner.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Restricts the listing to one exact name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the listing to one id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ImageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns true if the filter is empty (matches all).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.owner.is_none() && self.name.is_none() && self.id.is_none()
    }

    /// Returns `true` if `image` passes every populated field.
    #[must_use]
    pub fn matches(&self, image: &super::Image) -> bool {
        self.owner
            .as_ref()
            .is_none_or(|owner| image.owner.as_ref() == Some(owner))
            && self.name.as_ref().is_none_or(|name| &image.name == name)
            && self.id.as_ref().is_none_or(|id| &image.id == id)
    }
}

/// Partial update of image attributes.
///
/// `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageUpdate {
    /// New visibility.
    pub visibility: Option<Visibility>,
    /// New protected flag.
    pub protected: Option<bool>,
    /// New hidden flag.
    pub hidden: Option<bool>,
}

impl ImageUpdate {
    /// Creates an update that changes nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            visibility: None,
            protected: None,
            hidden: None,
        }
    }

    /// Sets the visibility.
    #[must_use]
    pub const fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Sets the protected flag.
    #[must_use]
    pub const fn protected(mut self, protected: bool) -> Self {
        self.protected = Some(protected);
        self
    }

    /// Sets the hidden flag.
    #[must_use]
    pub const fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    /// Returns `true` if the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.visibility.is_none() && self.protected.is_none() && self.hidden.is_none()
    }

    /// Applies the update to an in-memory image.
    pub fn apply_to(&self, image: &mut super::Image) {
        if let Some(visibility) = self.visibility {
            image.visibility = visibility;
        }
        if let Some(protected) = self.protected {
            image.protected = protected;
        }
        if let Some(hidden) = self.hidden {
            image.hidden = hidden;
        }
    }
}
