//! Core identifier and geometry types.
//!
//! Inset types live in two identifier spaces:
//! - [`InsetType`] is the dense internal index (`0..InsetType::COUNT`) used for
//!   O(1) per-type storage.
//! - [`InsetTypes`] is the public bitmask used to combine several types into a
//!   single request.
//!
//! The mapping between the two is exact and total: every internal type has
//! exactly one public bit, and every public bit maps back to one internal type.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// ============================================================================
// Inset Types
// ============================================================================

/// Dense internal index of an inset type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsetType {
    StatusBars = 0,
    NavigationBars = 1,
    CaptionBar = 2,
    Ime = 3,
}

impl InsetType {
    /// Number of internal inset types.
    pub const COUNT: usize = 4;

    /// All internal types in index order.
    pub const ALL: [Self; Self::COUNT] =
        [Self::StatusBars, Self::NavigationBars, Self::CaptionBar, Self::Ime];

    /// Returns the dense storage index of this type.
    #[must_use]
    pub const fn index(self) -> usize { self as usize }

    /// Returns the internal type for a storage index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::StatusBars),
            1 => Some(Self::NavigationBars),
            2 => Some(Self::CaptionBar),
            3 => Some(Self::Ime),
            _ => None,
        }
    }

    /// Returns the public bit for this type.
    #[must_use]
    pub const fn to_public(self) -> InsetTypes {
        match self {
            Self::StatusBars => InsetTypes::STATUS_BARS,
            Self::NavigationBars => InsetTypes::NAVIGATION_BARS,
            Self::CaptionBar => InsetTypes::CAPTION_BAR,
            Self::Ime => InsetTypes::IME,
        }
    }

    /// Whether the type is visible when the remote authority has not said otherwise.
    #[must_use]
    pub const fn default_visibility(self) -> bool { !matches!(self, Self::Ime) }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StatusBars => "statusBars",
            Self::NavigationBars => "navigationBars",
            Self::CaptionBar => "captionBar",
            Self::Ime => "ime",
        }
    }
}

impl fmt::Display for InsetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

bitflags! {
    /// Public bitmask of inset types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InsetTypes: u32 {
        const STATUS_BARS = 1 << 0;
        const NAVIGATION_BARS = 1 << 1;
        const CAPTION_BAR = 1 << 2;
        const IME = 1 << 3;
        const SYSTEM_BARS = Self::STATUS_BARS.bits()
            | Self::NAVIGATION_BARS.bits()
            | Self::CAPTION_BAR.bits();
    }
}

impl InsetTypes {
    /// Iterates the internal types contained in this mask, in index order.
    pub fn internal_types(self) -> impl Iterator<Item = InsetType> {
        InsetType::ALL.into_iter().filter(move |ty| self.contains(ty.to_public()))
    }

    /// Returns whether the given internal type is part of this mask.
    #[must_use]
    pub const fn has(self, ty: InsetType) -> bool { self.contains(ty.to_public()) }
}

impl From<InsetType> for InsetTypes {
    fn from(ty: InsetType) -> Self { ty.to_public() }
}

impl FromIterator<InsetType> for InsetTypes {
    fn from_iter<I: IntoIterator<Item = InsetType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |acc, ty| acc | ty.to_public())
    }
}

impl fmt::Display for InsetTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for ty in self.internal_types() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(ty.name())?;
            first = false;
        }
        Ok(())
    }
}

// ============================================================================
// Geometry Types
// ============================================================================

/// An integer rectangle described by its edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Create a new rectangle from its edges.
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    #[must_use]
    pub const fn width(&self) -> i32 { self.right - self.left }

    #[must_use]
    pub const fn height(&self) -> i32 { self.bottom - self.top }

    /// Whether the rectangle has no area.
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.left >= self.right || self.top >= self.bottom }

    /// Returns the overlap of two rectangles, or `None` when they do not intersect.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let result = Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!result.is_empty()).then_some(result)
    }

    /// Returns a copy moved by the given offset.
    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }
}

/// Per-edge inset amounts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Insets {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Insets {
    pub const NONE: Self = Self::new(0, 0, 0, 0);

    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        )
    }

    #[must_use]
    pub const fn with_bottom(self, bottom: i32) -> Self {
        Self::new(self.left, self.top, self.right, bottom)
    }

    /// Returns the single edge these insets are attached to.
    #[must_use]
    pub const fn side(&self) -> InsetSide {
        if self.left == 0 && self.top == 0 && self.right == 0 && self.bottom == 0 {
            return InsetSide::Floating;
        }
        if self.left != 0 {
            InsetSide::Left
        } else if self.top != 0 {
            InsetSide::Top
        } else if self.right != 0 {
            InsetSide::Right
        } else {
            InsetSide::Bottom
        }
    }

    /// Returns the amount on the given side.
    #[must_use]
    pub const fn on_side(&self, side: InsetSide) -> i32 {
        match side {
            InsetSide::Left => self.left,
            InsetSide::Top => self.top,
            InsetSide::Right => self.right,
            InsetSide::Bottom => self.bottom,
            InsetSide::Floating => 0,
        }
    }
}

/// The window edge an inset source is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InsetSide {
    Left,
    Top,
    Right,
    Bottom,
    /// Zero insets: the source does not consume any edge.
    Floating,
}

// ============================================================================
// Animation Kinds
// ============================================================================

/// Kind of a running animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimationKind {
    /// System-driven animation that ends with the types shown.
    Show,
    /// System-driven animation that ends with the types hidden.
    Hide,
    /// Animation driven frame by frame by a user listener.
    User,
}

impl AnimationKind {
    /// Whether a request of this kind asks the consumer to show.
    #[must_use]
    pub const fn requests_show(self) -> bool { matches!(self, Self::Show | Self::User) }
}

/// How the host lays out the changing types before the first frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutDuringAnimation {
    /// Laid out as if the animating types are fully shown.
    Shown,
    /// Laid out as if the animating types are fully hidden.
    Hidden,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_public_mapping_is_total() {
        for ty in InsetType::ALL {
            let public = ty.to_public();
            assert_eq!(public.bits().count_ones(), 1);
            assert_eq!(public.internal_types().collect::<Vec<_>>(), vec![ty]);
            assert_eq!(InsetType::from_index(ty.index()), Some(ty));
        }
        assert_eq!(InsetType::from_index(InsetType::COUNT), None);
        assert_eq!(InsetTypes::all().internal_types().count(), InsetType::COUNT);
    }

    #[test]
    fn test_system_bars_mask() {
        let types: Vec<_> = InsetTypes::SYSTEM_BARS.internal_types().collect();
        assert_eq!(
            types,
            vec![InsetType::StatusBars, InsetType::NavigationBars, InsetType::CaptionBar]
        );
        assert!(!InsetTypes::SYSTEM_BARS.has(InsetType::Ime));
    }

    #[test]
    fn test_types_from_iterator() {
        let types: InsetTypes = [InsetType::Ime, InsetType::StatusBars].into_iter().collect();
        assert_eq!(types, InsetTypes::IME | InsetTypes::STATUS_BARS);
    }

    #[test]
    fn test_types_display() {
        assert_eq!(InsetTypes::empty().to_string(), "none");
        assert_eq!((InsetTypes::IME | InsetTypes::STATUS_BARS).to_string(), "statusBars|ime");
    }

    #[test]
    fn test_rect_intersect() {
        let a = Rect::new(0, 0, 100, 100);
        assert_eq!(a.intersect(&Rect::new(50, 50, 150, 150)), Some(Rect::new(50, 50, 100, 100)));
        assert_eq!(a.intersect(&Rect::new(100, 0, 200, 100)), None);
    }

    #[test]
    fn test_insets_side() {
        assert_eq!(Insets::NONE.side(), InsetSide::Floating);
        assert_eq!(Insets::new(0, 50, 0, 0).side(), InsetSide::Top);
        assert_eq!(Insets::new(0, 0, 0, 80).side(), InsetSide::Bottom);
        assert_eq!(Insets::new(10, 0, 0, 0).side(), InsetSide::Left);
        assert_eq!(Insets::new(0, 0, 0, 80).on_side(InsetSide::Bottom), 80);
    }

    #[test]
    fn test_animation_kind_requests_show() {
        assert!(AnimationKind::Show.requests_show());
        assert!(AnimationKind::User.requests_show());
        assert!(!AnimationKind::Hide.requests_show());
    }
}
