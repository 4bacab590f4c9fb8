//! # UI Module
//!
//! This module contains the UI components of the keyHearing window.

pub mod cent_meter;
pub mod main_display;
