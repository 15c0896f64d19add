//! OakvvoodGrid - depth-driven deformable grid projection
//!
//! A depth camera feeds two effects pipelines. A grid mesh is displaced by a
//! reduced copy of the processed depth image, textured with the processed
//! image plus guide lines, rendered through an orbit camera into a canvas and
//! projected through a warp/blend stage.

pub mod app;
pub mod config;
pub mod depth;
pub mod device;
pub mod grid;
pub mod patches;
pub mod render;
pub mod sequencer;
pub mod ui;
pub mod warp;

pub use app::App;
