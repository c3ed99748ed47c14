use crate::protocol::{ViewingAreaModel, ViewingAreaUpdate};

use super::InteractableArea;

/// Area with a shared video player. The video is dropped when the last
/// viewer leaves.
#[derive(Debug, Clone)]
pub struct ViewingArea {
    base: InteractableArea,
    video: Option<String>,
    is_playing: bool,
    elapsed_time_sec: f64,
}

impl ViewingArea {
    pub fn new(base: InteractableArea) -> Self {
        Self {
            base,
            video: None,
            is_playing: false,
            elapsed_time_sec: 0.0,
        }
    }

    pub fn base(&self) -> &InteractableArea {
        &self.base
    }

    pub(super) fn base_mut(&mut self) -> &mut InteractableArea {
        &mut self.base
    }

    pub fn video(&self) -> Option<&str> {
        self.video.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn elapsed_time_sec(&self) -> f64 {
        self.elapsed_time_sec
    }

    pub fn apply_update(&mut self, update: &ViewingAreaUpdate) {
        self.video = update.video.clone();
        self.is_playing = update.is_playing;
        self.elapsed_time_sec = update.elapsed_time_sec;
    }

    pub(super) fn clear_video(&mut self) {
        self.video = None;
    }

    pub fn to_model(&self) -> ViewingAreaModel {
        ViewingAreaModel {
            id: self.base.id().clone(),
            occupants: self.base.occupants().to_vec(),
            video: self.video.clone(),
            is_playing: self.is_playing,
            elapsed_time_sec: self.elapsed_time_sec,
        }
    }
}
