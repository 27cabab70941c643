//! Form-wizard state container.
//!
//! Holds everything the three wizard steps collect and enforces that the
//! current step never runs ahead of the data it depends on.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::{
    DesignVariation, Orientation, TailorField, TailorForm, TryOnResult, UploadedImage,
};

pub const DEFAULT_COLOR: &str = "#000000";

/// Sequential wizard stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardStep {
    Design,
    TryOn,
    Order,
}

impl WizardStep {
    pub const ALL: [WizardStep; 3] = [WizardStep::Design, WizardStep::TryOn, WizardStep::Order];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Out-of-range indices clamp to the last step.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn label(self) -> &'static str {
        match self {
            WizardStep::Design => "Design",
            WizardStep::TryOn => "Try-On",
            WizardStep::Order => "Order",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum WizardError {
    #[error("Cannot open the {requested} step yet: {reason}")]
    StepLocked {
        requested: WizardStep,
        reason: &'static str,
    },

    #[error("No {orientation} design variation with id '{id}'")]
    UnknownVariation { id: String, orientation: Orientation },
}

/// All per-session wizard data.
#[derive(Debug)]
pub struct WizardState {
    pub(crate) front_drawing: Option<UploadedImage>,
    pub(crate) back_drawing: Option<UploadedImage>,
    pub(crate) description: String,
    pub(crate) color: String,
    pub(crate) variations: Vec<DesignVariation>,
    pub(crate) selected_front: Option<String>,
    pub(crate) selected_back: Option<String>,
    pub(crate) person_image: Option<UploadedImage>,
    pub(crate) clothing_image: Option<UploadedImage>,
    pub(crate) try_on_result: Option<TryOnResult>,
    pub(crate) tailor_form: TailorForm,
    pub(crate) step: WizardStep,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            front_drawing: None,
            back_drawing: None,
            description: String::new(),
            color: DEFAULT_COLOR.to_string(),
            variations: Vec::new(),
            selected_front: None,
            selected_back: None,
            person_image: None,
            clothing_image: None,
            try_on_result: None,
            tailor_form: TailorForm::default(),
            step: WizardStep::Design,
        }
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn front_drawing(&self) -> Option<&UploadedImage> {
        self.front_drawing.as_ref()
    }

    pub fn back_drawing(&self) -> Option<&UploadedImage> {
        self.back_drawing.as_ref()
    }

    pub fn person_image(&self) -> Option<&UploadedImage> {
        self.person_image.as_ref()
    }

    pub fn clothing_image(&self) -> Option<&UploadedImage> {
        self.clothing_image.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn variations(&self) -> &[DesignVariation] {
        &self.variations
    }

    pub fn selected_front(&self) -> Option<&DesignVariation> {
        self.selected(self.selected_front.as_deref())
    }

    pub fn selected_back(&self) -> Option<&DesignVariation> {
        self.selected(self.selected_back.as_deref())
    }

    pub fn try_on_result(&self) -> Option<&TryOnResult> {
        self.try_on_result.as_ref()
    }

    pub fn tailor_form(&self) -> &TailorForm {
        &self.tailor_form
    }

    fn selected(&self, id: Option<&str>) -> Option<&DesignVariation> {
        let id = id?;
        self.variations.iter().find(|v| v.id == id)
    }

    // Image slots. Replacing or removing an image drops it, which revokes its
    // preview handle.

    pub fn set_front_drawing(&mut self, image: UploadedImage) {
        self.front_drawing = Some(image);
    }

    pub fn set_back_drawing(&mut self, image: UploadedImage) {
        self.back_drawing = Some(image);
    }

    pub fn set_person_image(&mut self, image: UploadedImage) {
        self.person_image = Some(image);
    }

    pub fn set_clothing_image(&mut self, image: UploadedImage) {
        self.clothing_image = Some(image);
    }

    pub fn remove_front_drawing(&mut self) -> bool {
        self.front_drawing.take().is_some()
    }

    pub fn remove_back_drawing(&mut self) -> bool {
        self.back_drawing.take().is_some()
    }

    pub fn remove_person_image(&mut self) -> bool {
        self.person_image.take().is_some()
    }

    pub fn remove_clothing_image(&mut self) -> bool {
        self.clothing_image.take().is_some()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    /// Replace the variation batch. Selections missing from the new batch are
    /// cleared and the step is pulled back if it lost its prerequisite.
    pub fn set_variations(&mut self, variations: Vec<DesignVariation>) {
        let keep = |selected: &mut Option<String>, orientation: Orientation| {
            if let Some(id) = selected.as_deref() {
                if !variations
                    .iter()
                    .any(|v| v.id == id && v.orientation == orientation)
                {
                    *selected = None;
                }
            }
        };
        keep(&mut self.selected_front, Orientation::Front);
        keep(&mut self.selected_back, Orientation::Back);
        self.variations = variations;
        self.clamp_step();
    }

    pub fn select_front(&mut self, id: &str) -> Result<(), WizardError> {
        self.ensure_variation(id, Orientation::Front)?;
        self.selected_front = Some(id.to_string());
        Ok(())
    }

    pub fn select_back(&mut self, id: &str) -> Result<(), WizardError> {
        self.ensure_variation(id, Orientation::Back)?;
        self.selected_back = Some(id.to_string());
        Ok(())
    }

    fn ensure_variation(&self, id: &str, orientation: Orientation) -> Result<(), WizardError> {
        if self
            .variations
            .iter()
            .any(|v| v.id == id && v.orientation == orientation)
        {
            Ok(())
        } else {
            Err(WizardError::UnknownVariation {
                id: id.to_string(),
                orientation,
            })
        }
    }

    /// Replace the current try-on result wholesale.
    pub fn set_try_on_result(&mut self, result: TryOnResult) {
        self.try_on_result = Some(result);
    }

    pub fn update_tailor_field(&mut self, field: TailorField, value: impl Into<String>) {
        self.tailor_form.set(field, value);
    }

    /// Highest step whose prerequisites are present.
    pub fn max_reachable_step(&self) -> WizardStep {
        if self.selected_front().is_none() {
            WizardStep::Design
        } else if self.try_on_result.is_none() {
            WizardStep::TryOn
        } else {
            WizardStep::Order
        }
    }

    pub fn go_to(&mut self, step: WizardStep) -> Result<(), WizardError> {
        if step > self.max_reachable_step() {
            let reason = if self.selected_front().is_none() {
                "select a front design first"
            } else {
                "generate a try-on first"
            };
            return Err(WizardError::StepLocked {
                requested: step,
                reason,
            });
        }
        debug!(from = %self.step, to = %step, "Wizard step changed");
        self.step = step;
        Ok(())
    }

    pub fn next(&mut self) -> Result<WizardStep, WizardError> {
        let next = WizardStep::from_index(self.step.index() + 1);
        self.go_to(next)?;
        Ok(self.step)
    }

    pub fn back(&mut self) -> WizardStep {
        self.step = WizardStep::from_index(self.step.index().saturating_sub(1));
        self.step
    }

    pub(crate) fn clamp_step(&mut self) {
        self.step = self.step.min(self.max_reachable_step());
    }

    /// Drop everything, releasing every preview handle.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::PreviewRegistry;

    fn variation(id: &str, orientation: Orientation) -> DesignVariation {
        DesignVariation {
            id: id.to_string(),
            image_url: format!("https://img.example/{id}.png"),
            orientation,
            description: String::new(),
        }
    }

    fn image(registry: &PreviewRegistry) -> UploadedImage {
        UploadedImage::new(registry, "a.png", "image/png", vec![0; 4]).unwrap()
    }

    #[test]
    fn test_steps_require_prerequisites() {
        let mut state = WizardState::new();
        assert!(matches!(
            state.go_to(WizardStep::TryOn),
            Err(WizardError::StepLocked { .. })
        ));

        state.set_variations(vec![
            variation("front_1", Orientation::Front),
            variation("back_1", Orientation::Back),
        ]);
        assert!(state.select_front("back_1").is_err());
        state.select_front("front_1").unwrap();
        assert_eq!(state.next().unwrap(), WizardStep::TryOn);
        assert!(state.next().is_err());

        state.set_try_on_result(TryOnResult::now("data:image/png;base64,AAAA"));
        assert_eq!(state.next().unwrap(), WizardStep::Order);
        assert_eq!(state.back(), WizardStep::TryOn);
    }

    #[test]
    fn test_new_batch_clears_stale_selection_and_step() {
        let mut state = WizardState::new();
        state.set_variations(vec![variation("front_1", Orientation::Front)]);
        state.select_front("front_1").unwrap();
        state.go_to(WizardStep::TryOn).unwrap();

        state.set_variations(vec![variation("front_9", Orientation::Front)]);
        assert!(state.selected_front().is_none());
        assert_eq!(state.step(), WizardStep::Design);
    }

    #[test]
    fn test_replacing_and_resetting_releases_previews() {
        let registry = PreviewRegistry::new();
        let mut state = WizardState::new();
        state.set_front_drawing(image(&registry));
        state.set_back_drawing(image(&registry));
        assert_eq!(registry.live_count(), 2);

        state.set_front_drawing(image(&registry));
        assert_eq!(registry.live_count(), 2);

        assert!(state.remove_back_drawing());
        assert!(!state.remove_back_drawing());
        assert_eq!(registry.live_count(), 1);

        state.set_person_image(image(&registry));
        state.set_description("Tea dress");
        state.reset();
        assert_eq!(registry.live_count(), 0);
        assert_eq!(state.color(), DEFAULT_COLOR);
        assert!(state.description().is_empty());
    }
}
