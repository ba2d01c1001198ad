//! Inset snapshots and the three-way snapshot store.
//!
//! An [`InsetsState`] is an ordered set of [`InsetsSource`]s keyed by internal
//! type index plus the display frame. The [`SnapshotStore`] keeps three of
//! them side by side:
//! - `local`: the live view mutated by the controller,
//! - `last_dispatched`: the last snapshot pushed by the remote authority,
//! - `requested`: the last (partial) snapshot sent back to the authority.
//!
//! Keeping them apart lets the controller tell "the server changed something"
//! from "we changed something locally", which drive different reconciliation.

use serde::{Deserialize, Serialize};

use crate::types::{InsetSide, InsetType, InsetTypes, Insets, Rect};

// ============================================================================
// Inset Source
// ============================================================================

/// Geometry and visibility of one inset type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsetsSource {
    /// The inset type this source describes.
    pub ty: InsetType,
    /// Frame of the source in display coordinates.
    pub frame: Rect,
    /// Frame the user can see, when it differs from `frame`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_frame: Option<Rect>,
    /// Whether the source is currently visible.
    pub visible: bool,
}

impl InsetsSource {
    /// Creates a source with the type's default visibility and an empty frame.
    #[must_use]
    pub const fn new(ty: InsetType) -> Self {
        Self {
            ty,
            frame: Rect::new(0, 0, 0, 0),
            visible_frame: None,
            visible: ty.default_visibility(),
        }
    }

    #[must_use]
    pub const fn with_frame(mut self, frame: Rect) -> Self {
        self.frame = frame;
        self
    }

    #[must_use]
    pub const fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    #[must_use]
    pub const fn with_visible_frame(mut self, visible_frame: Option<Rect>) -> Self {
        self.visible_frame = visible_frame;
        self
    }

    /// Whether user-driven animations may control this source.
    ///
    /// A source whose visible frame is explicitly empty cannot be animated
    /// by the user.
    #[must_use]
    pub fn is_user_controllable(&self) -> bool {
        self.visible_frame.is_none_or(|frame| !frame.is_empty())
    }

    /// Calculates the insets this source applies to `relative_frame`.
    ///
    /// A source spanning the full width attaches to the top or bottom edge,
    /// one spanning the full height attaches to the left or right edge.
    /// Anything else contributes no insets.
    #[must_use]
    pub fn calculate_insets(&self, relative_frame: &Rect, ignore_visibility: bool) -> Insets {
        if !ignore_visibility && !self.visible {
            return Insets::NONE;
        }
        let Some(overlap) = self.frame.intersect(relative_frame) else {
            return Insets::NONE;
        };

        if overlap.width() == relative_frame.width() {
            if overlap.top == relative_frame.top {
                return Insets::new(0, overlap.height(), 0, 0);
            }
            if overlap.bottom == relative_frame.bottom {
                return Insets::new(0, 0, 0, overlap.height());
            }
        } else if overlap.height() == relative_frame.height() {
            if overlap.left == relative_frame.left {
                return Insets::new(overlap.width(), 0, 0, 0);
            }
            if overlap.right == relative_frame.right {
                return Insets::new(0, 0, overlap.width(), 0);
            }
        }
        Insets::NONE
    }

    /// Equality that optionally ignores the frame of an invisible IME.
    #[must_use]
    pub fn equals(&self, other: &Self, exclude_invisible_ime_frames: bool) -> bool {
        if self.ty != other.ty || self.visible != other.visible {
            return false;
        }
        if exclude_invisible_ime_frames && !self.visible && self.ty == InsetType::Ime {
            return true;
        }
        self.frame == other.frame && self.visible_frame == other.visible_frame
    }
}

// ============================================================================
// Inset State
// ============================================================================

/// A snapshot of every known inset source plus the display frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsetsState {
    pub display_frame: Rect,
    sources: [Option<InsetsSource>; InsetType::COUNT],
}

impl InsetsState {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Creates a snapshot with the given display frame and sources.
    #[must_use]
    pub fn with_sources(
        display_frame: Rect,
        sources: impl IntoIterator<Item = InsetsSource>,
    ) -> Self {
        let mut state = Self { display_frame, ..Self::default() };
        for source in sources {
            state.add_source(source);
        }
        state
    }

    /// Returns the source for a type, if present.
    #[must_use]
    pub const fn peek_source(&self, ty: InsetType) -> Option<&InsetsSource> {
        self.sources[ty.index()].as_ref()
    }

    /// Returns the source for a type, creating a default one if absent.
    pub fn source_mut(&mut self, ty: InsetType) -> &mut InsetsSource {
        self.sources[ty.index()].get_or_insert_with(|| InsetsSource::new(ty))
    }

    /// Returns a copy of the source, or a default source if absent.
    #[must_use]
    pub fn source_or_default(&self, ty: InsetType) -> InsetsSource {
        self.peek_source(ty).copied().unwrap_or_else(|| InsetsSource::new(ty))
    }

    /// Visibility of a source, falling back to the type's default.
    #[must_use]
    pub fn source_or_default_visibility(&self, ty: InsetType) -> bool {
        self.peek_source(ty).map_or_else(|| ty.default_visibility(), |source| source.visible)
    }

    /// Inserts or replaces the source for its type.
    pub fn add_source(&mut self, source: InsetsSource) {
        self.sources[source.ty.index()] = Some(source);
    }

    /// Removes the source for a type.
    pub fn remove_source(&mut self, ty: InsetType) { self.sources[ty.index()] = None; }

    /// Iterates present sources in index order.
    pub fn sources(&self) -> impl Iterator<Item = &InsetsSource> { self.sources.iter().flatten() }

    /// Replaces this snapshot with a copy of another.
    pub fn set(&mut self, other: &Self) { self.clone_from(other); }

    /// Calculates merged insets of the visible sources of `types` relative to `frame`.
    #[must_use]
    pub fn calculate_insets(&self, frame: &Rect, types: InsetTypes) -> Insets {
        self.sources()
            .filter(|source| types.has(source.ty))
            .map(|source| source.calculate_insets(frame, false))
            .fold(Insets::NONE, Insets::max)
    }

    /// Returns the types that cannot be controlled from a window with `frame`.
    ///
    /// A type is uncontrollable when the window does not span the display along
    /// the axis of the side the type is attached to.
    #[must_use]
    pub fn calculate_uncontrollable_types_from_frame(&self, frame: &Rect) -> InsetTypes {
        self.sources()
            .filter(|source| {
                let side = source.calculate_insets(frame, true).side();
                !self.can_control_side(frame, side)
            })
            .map(|source| source.ty)
            .collect()
    }

    fn can_control_side(&self, frame: &Rect, side: InsetSide) -> bool {
        match side {
            InsetSide::Left | InsetSide::Right => {
                frame.left == self.display_frame.left && frame.right == self.display_frame.right
            }
            InsetSide::Top | InsetSide::Bottom => {
                frame.top == self.display_frame.top && frame.bottom == self.display_frame.bottom
            }
            InsetSide::Floating => true,
        }
    }

    /// Compares two snapshots, optionally ignoring the caption bar and the
    /// frame of an invisible IME.
    #[must_use]
    pub fn equals(
        &self,
        other: &Self,
        excluding_caption: bool,
        exclude_invisible_ime_frames: bool,
    ) -> bool {
        if self.display_frame != other.display_frame {
            return false;
        }
        InsetType::ALL.into_iter().all(|ty| {
            if excluding_caption && ty == InsetType::CaptionBar {
                return true;
            }
            match (self.peek_source(ty), other.peek_source(ty)) {
                (None, None) => true,
                (Some(a), Some(b)) => a.equals(b, exclude_invisible_ime_frames),
                _ => false,
            }
        })
    }
}

// ============================================================================
// Snapshot Store
// ============================================================================

/// The three concurrently-held snapshots owned by the controller.
#[derive(Clone, Debug, Default)]
pub struct SnapshotStore {
    local: InsetsState,
    last_dispatched: InsetsState,
    requested: InsetsState,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// The live, locally mutated snapshot.
    #[must_use]
    pub const fn local(&self) -> &InsetsState { &self.local }

    pub const fn local_mut(&mut self) -> &mut InsetsState { &mut self.local }

    /// The last snapshot received from the remote authority.
    #[must_use]
    pub const fn last_dispatched(&self) -> &InsetsState { &self.last_dispatched }

    /// The last snapshot sent to the remote authority.
    #[must_use]
    pub const fn requested(&self) -> &InsetsState { &self.requested }

    /// The live snapshot alongside the last dispatched one.
    pub const fn local_and_dispatched_mut(&mut self) -> (&mut InsetsState, &InsetsState) {
        (&mut self.local, &self.last_dispatched)
    }

    /// Whether a pushed snapshot differs from what we already hold.
    ///
    /// `caption_unchanged` reports whether the locally tracked caption height
    /// still matches the live caption source.
    #[must_use]
    pub fn is_new_push(&self, pushed: &InsetsState, caption_unchanged: bool) -> bool {
        let state_changed = !self.local.equals(pushed, true, false) || !caption_unchanged;
        state_changed || self.last_dispatched != *pushed
    }

    /// Whether the local snapshot diverges from the authority's last push.
    #[must_use]
    pub fn local_diverges_from_dispatched(&self) -> bool {
        !self.local.equals(&self.last_dispatched, true, true)
    }

    /// Records a pushed snapshot as the last dispatched one.
    pub fn record_dispatched(&mut self, pushed: &InsetsState) { self.last_dispatched.set(pushed); }

    /// Copies the local source of `ty` into the requested snapshot when they
    /// differ, and reports whether the authority needs to hear about `ty`.
    pub fn sync_requested_source(&mut self, ty: InsetType) -> bool {
        let local = self.local.source_or_default(ty);
        let mut changed = false;
        if self.requested.peek_source(ty) != Some(&local) {
            self.requested.add_source(local);
            changed = true;
        }
        if self.last_dispatched.peek_source(ty) != Some(&local) {
            changed = true;
        }
        changed
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY: Rect = Rect::new(0, 0, 1080, 2340);

    fn status_bar() -> InsetsSource {
        InsetsSource::new(InsetType::StatusBars).with_frame(Rect::new(0, 0, 1080, 80))
    }

    fn nav_bar() -> InsetsSource {
        InsetsSource::new(InsetType::NavigationBars).with_frame(Rect::new(0, 2214, 1080, 2340))
    }

    #[test]
    fn test_source_calculate_insets_sides() {
        assert_eq!(status_bar().calculate_insets(&DISPLAY, false), Insets::new(0, 80, 0, 0));
        assert_eq!(nav_bar().calculate_insets(&DISPLAY, false), Insets::new(0, 0, 0, 126));

        let left = InsetsSource::new(InsetType::NavigationBars).with_frame(Rect::new(0, 0, 40, 2340));
        assert_eq!(left.calculate_insets(&DISPLAY, false), Insets::new(40, 0, 0, 0));
    }

    #[test]
    fn test_source_calculate_insets_respects_visibility() {
        let hidden = status_bar().with_visible(false);
        assert_eq!(hidden.calculate_insets(&DISPLAY, false), Insets::NONE);
        assert_eq!(hidden.calculate_insets(&DISPLAY, true), Insets::new(0, 80, 0, 0));
    }

    #[test]
    fn test_source_outside_frame_has_no_insets() {
        let frame = Rect::new(0, 500, 1080, 1000);
        assert_eq!(status_bar().calculate_insets(&frame, false), Insets::NONE);
    }

    #[test]
    fn test_user_controllable() {
        assert!(status_bar().is_user_controllable());
        let blocked = status_bar().with_visible_frame(Some(Rect::default()));
        assert!(!blocked.is_user_controllable());
    }

    #[test]
    fn test_state_merged_insets() {
        let state = InsetsState::with_sources(DISPLAY, [status_bar(), nav_bar()]);
        assert_eq!(state.calculate_insets(&DISPLAY, InsetTypes::all()), Insets::new(0, 80, 0, 126));
        assert_eq!(
            state.calculate_insets(&DISPLAY, InsetTypes::STATUS_BARS),
            Insets::new(0, 80, 0, 0)
        );
    }

    #[test]
    fn test_uncontrollable_types_from_frame() {
        let state = InsetsState::with_sources(DISPLAY, [status_bar(), nav_bar()]);
        assert!(state.calculate_uncontrollable_types_from_frame(&DISPLAY).is_empty());

        // A window shorter than the display cannot drive the top bar it touches;
        // the navigation bar does not intersect it at all and stays floating.
        let short = Rect::new(0, 0, 1080, 1200);
        let blocked = state.calculate_uncontrollable_types_from_frame(&short);
        assert!(blocked.contains(InsetTypes::STATUS_BARS));
        assert!(!blocked.contains(InsetTypes::NAVIGATION_BARS));
    }

    #[test]
    fn test_equals_excluding_caption() {
        let caption = InsetsSource::new(InsetType::CaptionBar).with_frame(Rect::new(0, 0, 1080, 40));
        let a = InsetsState::with_sources(DISPLAY, [status_bar()]);
        let b = InsetsState::with_sources(DISPLAY, [status_bar(), caption]);
        assert!(!a.equals(&b, false, false));
        assert!(a.equals(&b, true, false));
    }

    #[test]
    fn test_equals_excluding_invisible_ime_frames() {
        let ime = InsetsSource::new(InsetType::Ime).with_visible(false);
        let a = InsetsState::with_sources(DISPLAY, [ime.with_frame(Rect::new(0, 1500, 1080, 2340))]);
        let b = InsetsState::with_sources(DISPLAY, [ime]);
        assert!(!a.equals(&b, false, false));
        assert!(a.equals(&b, false, true));
    }

    #[test]
    fn test_store_sync_requested_source() {
        let mut store = SnapshotStore::new();
        store.local_mut().add_source(status_bar());
        store.record_dispatched(&InsetsState::with_sources(DISPLAY, [status_bar()]));

        assert!(store.sync_requested_source(InsetType::StatusBars));
        assert_eq!(store.requested().peek_source(InsetType::StatusBars), Some(&status_bar()));
        // Nothing left to resend once requested and dispatched agree with local.
        assert!(!store.sync_requested_source(InsetType::StatusBars));
    }

    #[test]
    fn test_store_detects_push() {
        let mut store = SnapshotStore::new();
        let pushed = InsetsState::with_sources(DISPLAY, [status_bar()]);
        assert!(store.is_new_push(&pushed, true));

        store.local_mut().set(&pushed);
        store.record_dispatched(&pushed);
        assert!(!store.is_new_push(&pushed, true));
        assert!(store.is_new_push(&pushed, false));
    }
}
