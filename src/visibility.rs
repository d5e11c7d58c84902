//! Visibility modes and the per-mode stacking rules.

use std::{fmt, str::FromStr, time::Duration};

use crate::{
    DockError,
    window::{ActiveWindow, StackOracle, WindowId, WindowStackQuery},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VisibilityMode {
    #[default]
    BelowActive,
    BelowMaximized,
    LetWindowsCover,
    WindowsGoBelow,
    AutoHide,
    AlwaysVisible,
}

impl VisibilityMode {
    pub const ALL: [VisibilityMode; 6] = [
        VisibilityMode::BelowActive,
        VisibilityMode::BelowMaximized,
        VisibilityMode::LetWindowsCover,
        VisibilityMode::WindowsGoBelow,
        VisibilityMode::AutoHide,
        VisibilityMode::AlwaysVisible,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VisibilityMode::BelowActive => "below-active",
            VisibilityMode::BelowMaximized => "below-maximized",
            VisibilityMode::LetWindowsCover => "let-windows-cover",
            VisibilityMode::WindowsGoBelow => "windows-go-below",
            VisibilityMode::AutoHide => "auto-hide",
            VisibilityMode::AlwaysVisible => "always-visible",
        }
    }

    pub fn update_interval(self, intervals: &Intervals) -> Duration {
        match self {
            VisibilityMode::AutoHide => intervals.auto_hide,
            _ => intervals.normal,
        }
    }

    /// Modes whose stacking follows the active window.
    pub fn tracks_active_window(self) -> bool {
        matches!(
            self,
            VisibilityMode::BelowActive | VisibilityMode::BelowMaximized
        )
    }
}

impl fmt::Display for VisibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisibilityMode {
    type Err = DockError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '-' | '_' | ' '))
            .map(|ch| ch.to_ascii_lowercase())
            .collect();

        VisibilityMode::ALL
            .into_iter()
            .find(|mode| mode.name().replace('-', "") == normalized)
            .ok_or_else(|| {
                DockError::Config(format!(
                    "invalid visibility mode `{raw}` (expected one of below-active, \
                     below-maximized, let-windows-cover, windows-go-below, auto-hide, \
                     always-visible)"
                ))
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intervals {
    pub normal: Duration,
    pub auto_hide: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            normal: Duration::from_millis(1500),
            auto_hide: Duration::from_millis(2500),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementAction {
    Raise,
    Lower,
    PinAbove,
    PinBelow,
}

/// Dock-side inputs to a decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DockFlags {
    pub hovered: bool,
    pub in_attention: bool,
    pub disable_hiding: bool,
    pub auto_hidden: bool,
}

/// Window-manager-side inputs to a decision. Implementations answer lazily
/// so that a branch only pays for the queries it reads.
pub trait StackFacts {
    fn dock_is_on_top(&self) -> bool;
    fn dock_is_normal(&self) -> bool;
    fn dock_is_covered(&self) -> bool;
    fn dock_is_covering(&self) -> bool;
    fn active_window(&self) -> Option<ActiveWindow>;
}

pub struct DockStackFacts<'a, Q: ?Sized> {
    oracle: StackOracle<'a, Q>,
    dock: WindowId,
    active: Option<ActiveWindow>,
}

impl<'a, Q: WindowStackQuery + ?Sized> DockStackFacts<'a, Q> {
    pub fn new(oracle: StackOracle<'a, Q>, dock: WindowId) -> Self {
        let active = oracle.active_window();
        Self {
            oracle,
            dock,
            active,
        }
    }
}

impl<Q: WindowStackQuery + ?Sized> StackFacts for DockStackFacts<'_, Q> {
    fn dock_is_on_top(&self) -> bool {
        self.oracle.is_on_top(self.dock)
    }

    fn dock_is_normal(&self) -> bool {
        self.oracle.is_normal(self.dock)
    }

    fn dock_is_covered(&self) -> bool {
        self.oracle.dock_is_covered()
    }

    fn dock_is_covering(&self) -> bool {
        self.oracle.dock_is_covering()
    }

    fn active_window(&self) -> Option<ActiveWindow> {
        self.active
    }
}

pub fn decide(
    mode: VisibilityMode,
    flags: DockFlags,
    facts: &impl StackFacts,
) -> Option<PlacementAction> {
    match mode {
        VisibilityMode::BelowActive => below_active(flags, facts, false),
        VisibilityMode::BelowMaximized => below_active(flags, facts, true),
        VisibilityMode::LetWindowsCover => let_windows_cover(flags, facts),
        VisibilityMode::AutoHide => auto_hide(flags),
        VisibilityMode::WindowsGoBelow | VisibilityMode::AlwaysVisible => None,
    }
}

fn below_active(
    flags: DockFlags,
    facts: &impl StackFacts,
    require_maximized: bool,
) -> Option<PlacementAction> {
    let active = facts.active_window();
    let desktop_is_active = active.is_some_and(|active| active.is_desktop);
    let triggered = active.is_some_and(|active| {
        !active.is_desktop
            && active.intersects_dock
            && (!require_maximized || active.is_maximized)
    });

    if triggered {
        if facts.dock_is_on_top() {
            if !flags.hovered && !flags.in_attention && !flags.disable_hiding {
                return Some(PlacementAction::Lower);
            }
        } else if flags.in_attention {
            return Some(PlacementAction::Raise);
        }
        return None;
    }

    // The maximized requirement only gates hiding; recovering from being
    // covered applies to every active window.
    if facts.dock_is_normal() {
        if !desktop_is_active && facts.dock_is_covered() {
            return Some(PlacementAction::Raise);
        }
        return Some(PlacementAction::PinAbove);
    }

    None
}

fn let_windows_cover(flags: DockFlags, facts: &impl StackFacts) -> Option<PlacementAction> {
    if !flags.hovered && facts.dock_is_on_top() {
        if facts.dock_is_covering() {
            return (!flags.disable_hiding).then_some(PlacementAction::Lower);
        }
        return Some(PlacementAction::PinBelow);
    }

    if flags.in_attention && !facts.dock_is_on_top() {
        if facts.dock_is_covered() {
            return Some(PlacementAction::Raise);
        }
        return Some(PlacementAction::PinAbove);
    }

    None
}

fn auto_hide(flags: DockFlags) -> Option<PlacementAction> {
    if flags.in_attention && flags.auto_hidden {
        return Some(PlacementAction::Raise);
    }
    if !flags.hovered && !flags.disable_hiding {
        return Some(PlacementAction::Lower);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone, Copy)]
    struct Facts {
        on_top: bool,
        on_bottom: bool,
        covered: bool,
        covering: bool,
        active: Option<ActiveWindow>,
    }

    impl StackFacts for Facts {
        fn dock_is_on_top(&self) -> bool {
            self.on_top
        }

        fn dock_is_normal(&self) -> bool {
            !self.on_top && !self.on_bottom
        }

        fn dock_is_covered(&self) -> bool {
            self.covered
        }

        fn dock_is_covering(&self) -> bool {
            self.covering
        }

        fn active_window(&self) -> Option<ActiveWindow> {
            self.active
        }
    }

    fn active(maximized: bool, intersects: bool) -> Option<ActiveWindow> {
        Some(ActiveWindow {
            id: WindowId(7),
            is_desktop: false,
            is_maximized: maximized,
            intersects_dock: intersects,
        })
    }

    #[test]
    fn mode_names_round_trip_and_accept_legacy_spelling() {
        for mode in VisibilityMode::ALL {
            assert_eq!(mode.name().parse::<VisibilityMode>().unwrap(), mode);
        }
        assert_eq!(
            "LetWindowsCover".parse::<VisibilityMode>().unwrap(),
            VisibilityMode::LetWindowsCover
        );
        assert!("sometimes".parse::<VisibilityMode>().is_err());
    }

    #[test]
    fn auto_hide_uses_the_longer_interval() {
        let intervals = Intervals::default();
        assert_eq!(
            VisibilityMode::AutoHide.update_interval(&intervals),
            Duration::from_millis(2500)
        );
        assert_eq!(
            VisibilityMode::LetWindowsCover.update_interval(&intervals),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn below_active_lowers_for_intersecting_active_window() {
        let facts = Facts {
            on_top: true,
            active: active(false, true),
            ..Facts::default()
        };
        let flags = DockFlags::default();
        assert_eq!(
            decide(VisibilityMode::BelowActive, flags, &facts),
            Some(PlacementAction::Lower)
        );

        for flags in [
            DockFlags { hovered: true, ..flags },
            DockFlags { in_attention: true, ..flags },
            DockFlags { disable_hiding: true, ..flags },
        ] {
            assert_eq!(decide(VisibilityMode::BelowActive, flags, &facts), None);
        }
    }

    #[test]
    fn below_active_raises_lowered_dock_for_attention() {
        let facts = Facts {
            active: active(false, true),
            ..Facts::default()
        };
        let flags = DockFlags {
            in_attention: true,
            ..DockFlags::default()
        };
        assert_eq!(
            decide(VisibilityMode::BelowActive, flags, &facts),
            Some(PlacementAction::Raise)
        );
        assert_eq!(
            decide(VisibilityMode::BelowActive, DockFlags::default(), &facts),
            None
        );
    }

    #[test]
    fn below_active_recovers_normal_dock() {
        let mut facts = Facts {
            covered: true,
            active: active(false, false),
            ..Facts::default()
        };
        assert_eq!(
            decide(VisibilityMode::BelowActive, DockFlags::default(), &facts),
            Some(PlacementAction::Raise)
        );

        facts.covered = false;
        assert_eq!(
            decide(VisibilityMode::BelowActive, DockFlags::default(), &facts),
            Some(PlacementAction::PinAbove)
        );

        facts.covered = true;
        facts.active = Some(ActiveWindow {
            is_desktop: true,
            ..active(false, true).unwrap()
        });
        assert_eq!(
            decide(VisibilityMode::BelowActive, DockFlags::default(), &facts),
            Some(PlacementAction::PinAbove)
        );

        facts.on_bottom = true;
        assert_eq!(
            decide(VisibilityMode::BelowActive, DockFlags::default(), &facts),
            None
        );
    }

    #[test]
    fn below_maximized_only_hides_for_maximized_windows() {
        let mut facts = Facts {
            on_top: true,
            active: active(false, true),
            ..Facts::default()
        };
        assert_eq!(
            decide(VisibilityMode::BelowMaximized, DockFlags::default(), &facts),
            None
        );

        facts.active = active(true, true);
        assert_eq!(
            decide(VisibilityMode::BelowMaximized, DockFlags::default(), &facts),
            Some(PlacementAction::Lower)
        );

        // a covered normal dock is raised even when nothing is maximized
        facts.on_top = false;
        facts.covered = true;
        facts.active = active(false, true);
        assert_eq!(
            decide(VisibilityMode::BelowMaximized, DockFlags::default(), &facts),
            Some(PlacementAction::Raise)
        );
    }

    #[test]
    fn let_windows_cover_lowers_or_pins_below() {
        let mut facts = Facts {
            on_top: true,
            covering: true,
            ..Facts::default()
        };
        assert_eq!(
            decide(VisibilityMode::LetWindowsCover, DockFlags::default(), &facts),
            Some(PlacementAction::Lower)
        );
        let menu_open = DockFlags {
            disable_hiding: true,
            ..DockFlags::default()
        };
        assert_eq!(decide(VisibilityMode::LetWindowsCover, menu_open, &facts), None);

        facts.covering = false;
        assert_eq!(
            decide(VisibilityMode::LetWindowsCover, DockFlags::default(), &facts),
            Some(PlacementAction::PinBelow)
        );
    }

    #[test]
    fn let_windows_cover_brings_back_dock_for_attention() {
        let mut facts = Facts {
            on_bottom: true,
            covered: true,
            ..Facts::default()
        };
        let flags = DockFlags {
            in_attention: true,
            ..DockFlags::default()
        };
        assert_eq!(
            decide(VisibilityMode::LetWindowsCover, flags, &facts),
            Some(PlacementAction::Raise)
        );
        facts.covered = false;
        assert_eq!(
            decide(VisibilityMode::LetWindowsCover, flags, &facts),
            Some(PlacementAction::PinAbove)
        );
    }

    #[test]
    fn auto_hide_prefers_raise_for_attention() {
        let facts = Facts::default();
        let flags = DockFlags {
            in_attention: true,
            auto_hidden: true,
            ..DockFlags::default()
        };
        assert_eq!(
            decide(VisibilityMode::AutoHide, flags, &facts),
            Some(PlacementAction::Raise)
        );
        assert_eq!(
            decide(VisibilityMode::AutoHide, DockFlags::default(), &facts),
            Some(PlacementAction::Lower)
        );
        let hovered = DockFlags {
            hovered: true,
            ..DockFlags::default()
        };
        assert_eq!(decide(VisibilityMode::AutoHide, hovered, &facts), None);
    }

    #[test]
    fn pinned_modes_never_act() {
        let facts = Facts {
            covered: true,
            covering: true,
            active: active(true, true),
            ..Facts::default()
        };
        for mode in [VisibilityMode::WindowsGoBelow, VisibilityMode::AlwaysVisible] {
            assert_eq!(decide(mode, DockFlags::default(), &facts), None);
        }
    }
}
