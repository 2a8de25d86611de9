//! Promotion of one image to public.
//!
//! Publishing makes the chosen image the only public image of its name:
//! every other image with the same name is demoted to private, unprotected,
//! and not hidden.

use crate::catalog::ImageCatalog;
use crate::models::{Image, ImageFilter, ImageId, ImageUpdate, Visibility};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// What a publication changes.
#[derive(Debug, Clone, Serialize)]
pub struct PublicationPlan {
    /// Image to make public.
    pub target: Image,
    /// Other images with the target's name, all of which get demoted.
    pub siblings: Vec<Image>,
    /// Protected flag set on the target.
    pub protected: bool,
    /// Hidden flag set on the target.
    pub hidden: bool,
}

impl PublicationPlan {
    /// Siblings that currently stand out: protected, visible, or public.
    ///
    /// This is the list a dry run announces.
    #[must_use]
    pub fn notable_demotions(&self) -> Vec<&Image> {
        self.siblings
            .iter()
            .filter(|image| image.protected || !image.hidden || image.is_public())
            .collect()
    }

    /// Update applied to every sibling.
    #[must_use]
    pub const fn demotion() -> ImageUpdate {
        ImageUpdate::new()
            .visibility(Visibility::Private)
            .protected(false)
            .hidden(false)
    }

    /// Returns a human-readable summary of the plan.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "publish {} ('{}', protected={}, hidden={}) and demote {} other image(s)",
            self.target.id,
            self.target.name,
            self.protected,
            self.hidden,
            self.siblings.len()
        )
    }
}

/// Publishes images by id.
pub struct PublicationService {
    catalog: Arc<dyn ImageCatalog>,
    owner: Option<String>,
    protected: bool,
    hidden: bool,
}

impl PublicationService {
    /// Creates a publication service.
    #[must_use]
    pub fn new(catalog: Arc<dyn ImageCatalog>) -> Self {
        Self {
            catalog,
            owner: None,
            protected: false,
            hidden: false,
        }
    }

    /// Restricts lookups to images owned by `owner`.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Marks the published image protected.
    #[must_use]
    pub const fn with_protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Marks the published image hidden.
    #[must_use]
    pub const fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    fn owner_filter(&self) -> ImageFilter {
        match &self.owner {
            Some(owner) => ImageFilter::new().with_owner(owner.clone()),
            None => ImageFilter::new(),
        }
    }

    /// Computes what publishing `id` would change. Makes no changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the image does not exist, or the
    /// catalog's error if listing fails.
    #[instrument(name = "keeper.publication.plan", skip(self), fields(image_id = %id))]
    pub fn plan(&self, id: &ImageId) -> Result<PublicationPlan> {
        let target = self
            .catalog
            .get_image(id)?
            .filter(|image| self.owner_filter().matches(image))
            .ok_or_else(|| Error::InvalidInput(format!("image {id} not found")))?;

        let siblings = self
            .catalog
            .list_images(&self.owner_filter().with_name(target.name.clone()))?
            .into_iter()
            .filter(|image| &image.id != id)
            .collect();

        Ok(PublicationPlan {
            target,
            siblings,
            protected: self.protected,
            hidden: self.hidden,
        })
    }

    /// Applies `plan`: demotes the siblings, then sets protected, visibility,
    /// and hidden on the target, each as its own request.
    ///
    /// # Errors
    ///
    /// Returns the first catalog error; earlier updates are not rolled back.
    #[instrument(name = "keeper.publication.apply", skip_all, fields(image_id = %plan.target.id))]
    pub fn apply(&self, plan: &PublicationPlan) -> Result<()> {
        let demotion = PublicationPlan::demotion();
        for sibling in &plan.siblings {
            self.catalog.update_image(&sibling.id, &demotion)?;
            info!(image_id = %sibling.id, "Demoted image");
        }

        let target = &plan.target.id;
        self.catalog
            .update_image(target, &ImageUpdate::new().protected(plan.protected))?;
        self.catalog
            .update_image(target, &ImageUpdate::new().visibility(Visibility::Public))?;
        self.catalog
            .update_image(target, &ImageUpdate::new().hidden(plan.hidden))?;

        metrics::counter!("keeper_images_published_total").increment(1);
        info!(image_id = %target, demoted = plan.siblings.len(), "Published image");
        Ok(())
    }
}
