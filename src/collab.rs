//! Collaborator seams: resource resolution and font registration.
//!
//! The converter never performs IO itself. Images and font availability are
//! delegated through these traits so embedders plug in their own loaders; the
//! bundled defaults make a converter usable with zero setup.

use crate::cascade::Cascade;

/// Dimensions of a successfully decoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub width_px: u32,
    pub height_px: u32,
}

/// Outcome of a failed resource resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceError {
    /// The resource does not exist; the element is skipped with a warning.
    NotFound,
    /// The resource exists but could not be loaded; aborts the conversion.
    Failed(String),
}

/// Resolves external resources referenced by the markup.
pub trait ResourceResolver {
    /// Resolve and decode the image at `src`. The current cascade is passed
    /// so resolvers can honor style-dependent lookups.
    fn resolve_image(&mut self, src: &str, style: &Cascade)
        -> Result<DecodedImage, ResourceError>;
}

/// Answers whether a font family name is available for use.
pub trait FontProvider {
    fn is_font_registered(&self, name: &str) -> bool;
}

/// Default resolver: every resource is missing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResources;

impl ResourceResolver for NoResources {
    fn resolve_image(
        &mut self,
        _src: &str,
        _style: &Cascade,
    ) -> Result<DecodedImage, ResourceError> {
        Err(ResourceError::NotFound)
    }
}

/// Default provider: every family is considered registered.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllFonts;

impl FontProvider for AllFonts {
    fn is_font_registered(&self, _name: &str) -> bool {
        true
    }
}

/// Pick the first registered family from a comma-separated alternatives list.
///
/// Quotes around individual names are stripped before the registration check.
pub fn pick_registered_family<F: FontProvider + ?Sized>(
    provider: &F,
    comma_list: &str,
) -> Option<String> {
    for candidate in comma_list.split(',') {
        let name = candidate.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if name.is_empty() {
            continue;
        }
        if provider.is_font_registered(name) {
            return Some(name.to_string());
        }
    }
    None
}
