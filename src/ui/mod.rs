//! Debug-mode user interface
//!
//! Panels edit state in place and return actions the app applies after the
//! egui pass (saving files, resetting the camera, reshaping the warp mesh).

mod patch_panel;
mod settings_panel;
mod warp_panel;

pub use patch_panel::PatchPanel;
pub use settings_panel::{SettingsPanel, StatusInfo};
pub use warp_panel::{draw_warp_points, WarpPanel};

use winit::event::WindowEvent;

/// Pipeline addressed by a patch action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget {
    Pre,
    Post,
}

impl PatchTarget {
    pub fn title(&self) -> &'static str {
        match self {
            PatchTarget::Pre => "Pre Processing",
            PatchTarget::Post => "Post Processing",
        }
    }
}

/// Actions returned by the panels
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    SaveSettings,
    SavePatch(PatchTarget),
    SaveWarp,
    ResetWarp,
    /// New control grid size, columns then rows
    ResizeWarp(usize, usize),
    ResetCamera,
}

/// Whether a window event should reach egui
///
/// While the overlay is hidden only window-state events pass, so pointer and
/// key input never accumulates for panels nobody can see.
pub fn overlay_accepts(event: &WindowEvent, overlay_visible: bool) -> bool {
    overlay_visible
        || matches!(
            event,
            WindowEvent::Resized(_)
                | WindowEvent::ScaleFactorChanged { .. }
                | WindowEvent::ModifiersChanged(_)
        )
}
