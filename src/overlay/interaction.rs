//! Arbitration of layer visibility, lock, hover and drag state.
//!
//! Every flag the renderer looks at lives here so that the composite
//! behaviours (combined toggle, hover suppression, drag-to-place, lock and
//! hide policy) are resolved in one place with explicit snapshot rules:
//!
//! * the combined toggle owns one snapshot, written when it hides;
//! * hover suppression owns a second snapshot, written when hover starts;
//! * on unhover the hover snapshot is restored as-is, even if the combined
//!   toggle ran while hovering (the combined toggle only acts on live flags).

use crate::overlay::geometry::Point;

pub const ORIGIN_MARKER_DIAMETER: f64 = 25.0;
pub const ORIGIN_MARKER_HOVER_DIAMETER: f64 = 30.0;
/// Distance from the origin within which the pointer hovers the marker.
pub const ORIGIN_HIT_RADIUS: f64 = ORIGIN_MARKER_HOVER_DIAMETER / 2.0;
/// Distance from the origin within which a held button hides the OS cursor.
pub const CURSOR_HIDE_RADIUS: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerVisibility {
    pub crosshair: bool,
    pub border: bool,
    pub gap: bool,
}

impl LayerVisibility {
    pub const ALL: Self = Self {
        crosshair: true,
        border: true,
        gap: true,
    };
    pub const NONE: Self = Self {
        crosshair: false,
        border: false,
        gap: false,
    };

    pub fn any(self) -> bool {
        self.crosshair || self.border || self.gap
    }
}

impl Default for LayerVisibility {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayFlags {
    pub layers: LayerVisibility,
    pub coordinate_text: bool,
    pub origin: bool,
    pub locked: bool,
    pub hovering: bool,
    pub dragging: bool,
    pub mouse_down: bool,
}

impl Default for OverlayFlags {
    fn default() -> Self {
        Self {
            layers: LayerVisibility::ALL,
            coordinate_text: true,
            origin: true,
            locked: false,
            hovering: false,
            dragging: false,
            mouse_down: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinedToggle {
    Hidden,
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    Shown,
    Hidden,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresencePolicy {
    /// When false, every hide/show entry point clears the lock.
    pub keep_locked_on_hide: bool,
    pub hide_when_settings_open: bool,
}

impl Default for PresencePolicy {
    fn default() -> Self {
        Self {
            keep_locked_on_hide: true,
            hide_when_settings_open: true,
        }
    }
}

/// Side effects the engine has to carry out after an interaction update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionEffects {
    pub drag_started: bool,
    pub drag_ended: bool,
    /// The origin must be moved onto the pointer.
    pub origin_moved: bool,
    pub layers_changed: bool,
    /// New OS cursor visibility, when it changed.
    pub cursor_visible: Option<bool>,
    /// New click-through state of the surface, when it changed.
    pub click_through: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct InteractionState {
    flags: OverlayFlags,
    enabled: bool,
    policy: PresencePolicy,
    combined_snapshot: LayerVisibility,
    hover_snapshot: Option<LayerVisibility>,
    press_point: Option<Point>,
    restore_after_settings: bool,
    cursor_hidden: bool,
    click_through: bool,
}

impl InteractionState {
    pub fn new(flags: OverlayFlags, policy: PresencePolicy) -> Self {
        Self {
            flags: OverlayFlags {
                hovering: false,
                dragging: false,
                mouse_down: false,
                ..flags
            },
            enabled: true,
            policy,
            combined_snapshot: LayerVisibility::ALL,
            hover_snapshot: None,
            press_point: None,
            restore_after_settings: false,
            cursor_hidden: false,
            click_through: true,
        }
    }

    pub fn flags(&self) -> OverlayFlags {
        self.flags
    }

    /// Layer flags as the user configured them, ignoring a transient hover
    /// suppression. This is what gets persisted.
    pub fn persistent_layers(&self) -> LayerVisibility {
        self.hover_snapshot.unwrap_or(self.flags.layers)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_locked(&self) -> bool {
        self.flags.locked
    }

    pub fn policy(&self) -> PresencePolicy {
        self.policy
    }

    pub fn cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    pub fn click_through(&self) -> bool {
        self.click_through
    }

    pub fn magnifier_visible(&self) -> bool {
        self.flags.dragging && self.flags.hovering
    }

    pub fn is_hover_suppressed(&self) -> bool {
        self.hover_snapshot.is_some()
    }

    /// While hover suppression holds the layers hidden, the new values land
    /// in the hover snapshot and show up once the hover ends.
    pub fn set_layers(&mut self, layers: LayerVisibility) {
        match self.hover_snapshot.as_mut() {
            Some(saved) => *saved = layers,
            None => self.flags.layers = layers,
        }
    }

    pub fn set_coordinate_text(&mut self, shown: bool) {
        self.flags.coordinate_text = shown;
    }

    pub fn toggle_coordinate_text(&mut self) -> bool {
        self.flags.coordinate_text = !self.flags.coordinate_text;
        self.flags.coordinate_text
    }

    /// Hides all three line layers when any of them is visible, otherwise
    /// restores what the last hide saw.
    pub fn toggle_combined(&mut self) -> CombinedToggle {
        if self.flags.layers.any() {
            self.combined_snapshot = self.flags.layers;
            self.flags.layers = LayerVisibility::NONE;
            CombinedToggle::Hidden
        } else {
            self.flags.layers = self.combined_snapshot;
            CombinedToggle::Restored
        }
    }

    pub fn set_origin_shown(&mut self, shown: bool) -> InteractionEffects {
        self.flags.origin = shown;
        if shown {
            InteractionEffects::default()
        } else {
            self.end_interaction()
        }
    }

    pub fn toggle_origin(&mut self) -> InteractionEffects {
        self.set_origin_shown(!self.flags.origin)
    }

    /// Explicit hover notification. Ignored while dragging, so the marker
    /// keeps its hover look for the whole drag.
    pub fn set_hovering(&mut self, hovering: bool, mouse_down: bool) -> bool {
        if self.flags.dragging {
            return false;
        }
        self.flags.hovering = hovering && self.flags.origin;
        self.settle_hover_suppression(mouse_down)
    }

    /// Feeds one pointer sample. `origin_local` is the origin in the same
    /// local space as `local`.
    pub fn update_pointer(
        &mut self,
        local: Point,
        origin_local: Point,
        mouse_down: bool,
    ) -> InteractionEffects {
        let mut effects = InteractionEffects::default();
        let was_down = self.flags.mouse_down;
        self.flags.mouse_down = mouse_down;
        let hit = self.flags.origin && local.distance_to(origin_local) <= ORIGIN_HIT_RADIUS;

        if self.flags.dragging {
            if mouse_down {
                effects.origin_moved = true;
            } else {
                self.flags.dragging = false;
                self.press_point = None;
                effects.drag_ended = true;
                effects.layers_changed |= self.set_hovering(hit, mouse_down);
            }
        } else {
            if !mouse_down {
                self.press_point = None;
            }
            // A pending press keeps the hover it started on.
            if self.press_point.is_none() && hit != self.flags.hovering {
                effects.layers_changed |= self.set_hovering(hit, mouse_down);
            }
            if mouse_down && !was_down && self.flags.hovering {
                self.press_point = Some(local);
            }
            if let Some(press) = self.press_point {
                if local != press {
                    self.flags.dragging = true;
                    self.flags.hovering = true;
                    effects.drag_started = true;
                    effects.origin_moved = true;
                }
            }
        }
        // Covers a hover that ended while the button was still held.
        effects.layers_changed |= self.settle_hover_suppression(mouse_down);

        let origin_now = if effects.origin_moved { local } else { origin_local };
        let cursor_hidden = mouse_down && local.distance_to(origin_now) <= CURSOR_HIDE_RADIUS;
        if cursor_hidden != self.cursor_hidden {
            self.cursor_hidden = cursor_hidden;
            effects.cursor_visible = Some(!cursor_hidden);
        }
        self.refresh_click_through(&mut effects);
        effects
    }

    /// Ends hover and drag immediately, restoring any suppressed layers.
    pub fn end_interaction(&mut self) -> InteractionEffects {
        let mut effects = InteractionEffects {
            drag_ended: self.flags.dragging,
            ..InteractionEffects::default()
        };
        self.flags.dragging = false;
        self.flags.hovering = false;
        self.press_point = None;
        if let Some(saved) = self.hover_snapshot.take() {
            self.flags.layers = saved;
            effects.layers_changed = true;
        }
        if self.cursor_hidden {
            self.cursor_hidden = false;
            effects.cursor_visible = Some(true);
        }
        self.refresh_click_through(&mut effects);
        effects
    }

    pub fn toggle_lock(&mut self) -> (bool, InteractionEffects) {
        let effects = self.set_locked(!self.flags.locked);
        (self.flags.locked, effects)
    }

    /// Engaging the lock ends any hover or drag, since no further pointer
    /// samples reach the state machine until it is released.
    pub fn set_locked(&mut self, locked: bool) -> InteractionEffects {
        let engaging = locked && !self.flags.locked;
        self.flags.locked = locked;
        if engaging {
            self.end_interaction()
        } else {
            InteractionEffects::default()
        }
    }

    pub fn show(&mut self) -> PresenceChange {
        let change = if self.enabled {
            PresenceChange::Unchanged
        } else {
            PresenceChange::Shown
        };
        self.enabled = true;
        self.apply_lock_policy();
        change
    }

    pub fn hide(&mut self) -> (PresenceChange, InteractionEffects) {
        let change = if self.enabled {
            PresenceChange::Hidden
        } else {
            PresenceChange::Unchanged
        };
        self.enabled = false;
        self.apply_lock_policy();
        (change, self.end_interaction())
    }

    pub fn toggle_presence(&mut self) -> (PresenceChange, InteractionEffects) {
        if self.enabled {
            self.hide()
        } else {
            (self.show(), InteractionEffects::default())
        }
    }

    pub fn set_keep_locked_on_hide(&mut self, keep: bool) {
        self.policy.keep_locked_on_hide = keep;
        if !self.enabled {
            self.apply_lock_policy();
        }
    }

    pub fn set_hide_when_settings_open(&mut self, hide: bool) {
        self.policy.hide_when_settings_open = hide;
        if !hide {
            self.restore_after_settings = false;
        }
    }

    pub fn settings_opened(&mut self) -> (PresenceChange, InteractionEffects) {
        if !self.policy.hide_when_settings_open {
            return (PresenceChange::Unchanged, InteractionEffects::default());
        }
        if self.enabled {
            self.restore_after_settings = true;
            self.hide()
        } else {
            self.restore_after_settings = false;
            (PresenceChange::Unchanged, InteractionEffects::default())
        }
    }

    pub fn settings_closed(&mut self) -> PresenceChange {
        if self.restore_after_settings && !self.enabled {
            self.restore_after_settings = false;
            self.show()
        } else {
            PresenceChange::Unchanged
        }
    }

    fn apply_lock_policy(&mut self) {
        if !self.policy.keep_locked_on_hide {
            self.flags.locked = false;
        }
    }

    fn settle_hover_suppression(&mut self, mouse_down: bool) -> bool {
        if mouse_down {
            return false;
        }
        let engaged = self.flags.hovering || self.flags.dragging;
        match (engaged, self.hover_snapshot) {
            (true, None) => {
                self.hover_snapshot = Some(self.flags.layers);
                self.flags.layers = LayerVisibility::NONE;
                true
            }
            (false, Some(saved)) => {
                self.flags.layers = saved;
                self.hover_snapshot = None;
                true
            }
            _ => false,
        }
    }

    fn refresh_click_through(&mut self, effects: &mut InteractionEffects) {
        let click_through = !(self.flags.hovering || self.flags.dragging);
        if click_through != self.click_through {
            self.click_through = click_through;
            effects.click_through = Some(click_through);
        }
    }
}

impl Default for InteractionState {
    fn default() -> Self {
        Self::new(OverlayFlags::default(), PresencePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: Point = Point::new(500.0, 500.0);

    fn partial() -> LayerVisibility {
        LayerVisibility {
            crosshair: true,
            border: false,
            gap: true,
        }
    }

    fn state_with(layers: LayerVisibility) -> InteractionState {
        let mut state = InteractionState::default();
        state.set_layers(layers);
        state
    }

    #[test]
    fn combined_toggle_twice_restores_layers() {
        let mut state = state_with(partial());
        assert_eq!(state.toggle_combined(), CombinedToggle::Hidden);
        assert_eq!(state.flags().layers, LayerVisibility::NONE);
        assert_eq!(state.toggle_combined(), CombinedToggle::Restored);
        assert_eq!(state.flags().layers, partial());
    }

    #[test]
    fn combined_toggle_from_all_hidden_start_shows_everything() {
        let mut state = state_with(LayerVisibility::NONE);
        assert_eq!(state.toggle_combined(), CombinedToggle::Restored);
        assert_eq!(state.flags().layers, LayerVisibility::ALL);
    }

    #[test]
    fn hover_hides_layers_and_unhover_restores_them() {
        let mut state = state_with(partial());
        let effects = state.update_pointer(Point::new(505.0, 505.0), ORIGIN, false);
        assert!(effects.layers_changed);
        assert_eq!(effects.click_through, Some(false));
        assert!(state.flags().hovering);
        assert_eq!(state.flags().layers, LayerVisibility::NONE);
        assert_eq!(state.persistent_layers(), partial());

        let effects = state.update_pointer(Point::new(700.0, 700.0), ORIGIN, false);
        assert!(effects.layers_changed);
        assert_eq!(effects.click_through, Some(true));
        assert_eq!(state.flags().layers, partial());
    }

    #[test]
    fn hover_snapshot_wins_over_combined_toggle_during_hover() {
        let mut state = state_with(partial());
        state.set_hovering(true, false);
        assert_eq!(state.flags().layers, LayerVisibility::NONE);

        // Live flags are all hidden, so the combined toggle restores its own snapshot.
        assert_eq!(state.toggle_combined(), CombinedToggle::Restored);
        assert_eq!(state.flags().layers, LayerVisibility::ALL);

        state.set_hovering(false, false);
        assert_eq!(state.flags().layers, partial());
    }

    #[test]
    fn hover_entered_with_button_down_does_not_suppress_until_release() {
        let mut state = state_with(LayerVisibility::ALL);
        state.update_pointer(Point::new(900.0, 900.0), ORIGIN, true);
        state.update_pointer(Point::new(501.0, 501.0), ORIGIN, true);
        assert!(state.flags().hovering);
        assert_eq!(state.flags().layers, LayerVisibility::ALL);
        assert!(!state.flags().dragging, "press started off the marker");

        state.update_pointer(Point::new(501.0, 501.0), ORIGIN, false);
        assert_eq!(state.flags().layers, LayerVisibility::NONE);
    }

    #[test]
    fn press_and_move_on_marker_drags_origin() {
        let mut state = state_with(LayerVisibility::ALL);
        state.update_pointer(Point::new(500.0, 500.0), ORIGIN, false);
        let press = state.update_pointer(Point::new(500.0, 500.0), ORIGIN, true);
        assert!(!press.drag_started);
        assert_eq!(press.cursor_visible, Some(false));

        let moved = state.update_pointer(Point::new(520.0, 480.0), ORIGIN, true);
        assert!(moved.drag_started && moved.origin_moved);
        assert!(state.magnifier_visible());

        let origin = Point::new(520.0, 480.0);
        let far = state.update_pointer(Point::new(640.0, 380.0), origin, true);
        assert!(far.origin_moved && !far.drag_started);
        assert!(state.cursor_hidden());

        let released = state.update_pointer(Point::new(640.0, 380.0), Point::new(640.0, 380.0), false);
        assert!(released.drag_ended);
        assert_eq!(released.cursor_visible, Some(true));
        assert!(state.flags().hovering, "origin is under the pointer after the drag");
        assert_eq!(state.flags().layers, LayerVisibility::NONE);

        state.update_pointer(Point::new(100.0, 100.0), Point::new(640.0, 380.0), false);
        assert_eq!(state.flags().layers, LayerVisibility::ALL);
    }

    #[test]
    fn cursor_visibility_tracks_radius_while_button_is_held() {
        let mut state = InteractionState::default();
        state.set_origin_shown(false);
        let near = state.update_pointer(Point::new(510.0, 500.0), ORIGIN, true);
        assert_eq!(near.cursor_visible, Some(false));
        let away = state.update_pointer(Point::new(530.0, 500.0), ORIGIN, true);
        assert_eq!(away.cursor_visible, Some(true));
        let back = state.update_pointer(Point::new(514.0, 500.0), ORIGIN, true);
        assert_eq!(back.cursor_visible, Some(false));
        let released = state.update_pointer(Point::new(514.0, 500.0), ORIGIN, false);
        assert_eq!(released.cursor_visible, Some(true));
    }

    #[test]
    fn hiding_origin_mid_drag_ends_drag_and_restores_layers() {
        let mut state = state_with(partial());
        state.update_pointer(ORIGIN, ORIGIN, false);
        state.update_pointer(ORIGIN, ORIGIN, true);
        state.update_pointer(Point::new(510.0, 500.0), ORIGIN, true);
        assert!(state.flags().dragging);

        let effects = state.toggle_origin();
        assert!(effects.drag_ended);
        assert!(!state.flags().dragging && !state.flags().hovering);
        assert_eq!(state.flags().layers, partial());
    }

    #[test]
    fn lock_is_cleared_on_hide_and_show_only_without_keep_policy() {
        let mut keep = InteractionState::default();
        keep.set_locked(true);
        keep.hide();
        assert!(keep.is_locked());
        keep.show();
        assert!(keep.is_locked());

        let mut release = InteractionState::new(
            OverlayFlags::default(),
            PresencePolicy {
                keep_locked_on_hide: false,
                hide_when_settings_open: true,
            },
        );
        release.set_locked(true);
        let (change, _) = release.hide();
        assert_eq!(change, PresenceChange::Hidden);
        assert!(!release.is_locked());
    }

    #[test]
    fn locking_mid_drag_ends_drag_and_restores_cursor() {
        let mut state = state_with(partial());
        state.update_pointer(ORIGIN, ORIGIN, false);
        state.update_pointer(ORIGIN, ORIGIN, true);
        state.update_pointer(Point::new(510.0, 500.0), ORIGIN, true);
        assert!(state.flags().dragging);
        assert!(state.cursor_hidden());

        let (locked, effects) = state.toggle_lock();
        assert!(locked);
        assert!(effects.drag_ended);
        assert_eq!(effects.cursor_visible, Some(true));
        assert_eq!(effects.click_through, Some(true));
        assert!(!state.flags().dragging && !state.flags().hovering);
        assert_eq!(state.flags().layers, partial());

        let (locked, effects) = state.toggle_lock();
        assert!(!locked);
        assert_eq!(effects, InteractionEffects::default());
    }

    #[test]
    fn layers_set_during_hover_apply_after_unhover() {
        let mut state = state_with(LayerVisibility::ALL);
        state.set_hovering(true, false);
        assert_eq!(state.flags().layers, LayerVisibility::NONE);

        state.set_layers(partial());
        assert_eq!(state.flags().layers, LayerVisibility::NONE);
        assert_eq!(state.persistent_layers(), partial());

        state.set_hovering(false, false);
        assert_eq!(state.flags().layers, partial());
    }

    #[test]
    fn dropping_keep_policy_while_hidden_unlocks() {
        let mut state = InteractionState::default();
        state.set_locked(true);
        state.hide();
        state.set_keep_locked_on_hide(false);
        assert!(!state.is_locked());
    }

    #[test]
    fn settings_window_hides_and_restores_visible_overlay() {
        let mut state = InteractionState::default();
        let (change, _) = state.settings_opened();
        assert_eq!(change, PresenceChange::Hidden);
        assert_eq!(state.settings_closed(), PresenceChange::Shown);
        assert!(state.is_enabled());

        state.hide();
        let (change, _) = state.settings_opened();
        assert_eq!(change, PresenceChange::Unchanged);
        assert_eq!(state.settings_closed(), PresenceChange::Unchanged);
        assert!(!state.is_enabled());
    }
}
