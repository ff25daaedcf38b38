//! # UI Module
//!
//! This module contains the UI components of the heatmap window.

pub mod heatmap_view;
pub mod main_display;
