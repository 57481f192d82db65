use super::CategorizedInstruction;
use crate::error::ApiError;
use crate::settings::InstructionLimits;

/// Instructions the next comparison will send: picked candidates from the
/// last roll followed by manually typed ones.
#[derive(Debug, Clone)]
pub struct InstructionSelection {
    limits: InstructionLimits,
    generated: Vec<CategorizedInstruction>,
    picked: Vec<String>,
    manual: Vec<String>,
}

impl InstructionSelection {
    pub fn new(limits: InstructionLimits) -> Self {
        Self {
            limits,
            generated: Vec::new(),
            picked: Vec::new(),
            manual: Vec::new(),
        }
    }

    pub fn generated(&self) -> &[CategorizedInstruction] {
        &self.generated
    }

    pub fn picked(&self) -> &[String] {
        &self.picked
    }

    pub fn manual(&self) -> &[String] {
        &self.manual
    }

    /// A new roll replaces the candidates and drops previous picks.
    pub fn replace_generated(&mut self, generated: Vec<CategorizedInstruction>) {
        self.generated = generated;
        self.picked.clear();
    }

    /// Picks or unpicks candidate `index`; returns whether it is now picked.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ApiError> {
        let candidate = self.generated.get(index).ok_or_else(|| {
            ApiError::validation(format!(
                "no generated instruction #{} (have {})",
                index + 1,
                self.generated.len()
            ))
        })?;
        let text = candidate.instruction.clone();
        if let Some(position) = self.picked.iter().position(|item| *item == text) {
            self.picked.remove(position);
            return Ok(false);
        }
        if self.picked.len() >= self.limits.max_selected {
            return Err(ApiError::validation(format!(
                "Maximum {} instructions allowed",
                self.limits.max_selected
            )));
        }
        self.ensure_room()?;
        self.picked.push(text);
        Ok(true)
    }

    pub fn add_manual(&mut self, instruction: &str) -> Result<(), ApiError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(ApiError::validation("instruction is empty"));
        }
        if instruction.chars().count() > self.limits.max_length {
            return Err(ApiError::validation(format!(
                "Instruction must be {} characters or less",
                self.limits.max_length
            )));
        }
        self.ensure_room()?;
        self.manual.push(instruction.to_string());
        Ok(())
    }

    pub fn remove_manual(&mut self, index: usize) -> Result<String, ApiError> {
        if index >= self.manual.len() {
            return Err(ApiError::validation(format!(
                "no manual instruction #{} (have {})",
                index + 1,
                self.manual.len()
            )));
        }
        Ok(self.manual.remove(index))
    }

    pub fn clear(&mut self) {
        self.picked.clear();
        self.manual.clear();
    }

    pub fn active(&self) -> Vec<String> {
        self.picked.iter().chain(self.manual.iter()).cloned().collect()
    }

    fn ensure_room(&self) -> Result<(), ApiError> {
        if self.picked.len() + self.manual.len() >= self.limits.max_count {
            return Err(ApiError::validation(format!(
                "at most {} custom instructions can be active",
                self.limits.max_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::InstructionCategory;

    fn candidates() -> Vec<CategorizedInstruction> {
        ["Pirate voice", "Emoji storm", "Board-room tone", "Bullet points", "Haiku"]
            .iter()
            .enumerate()
            .map(|(index, text)| CategorizedInstruction {
                category: if index % 2 == 0 {
                    InstructionCategory::Fun
                } else {
                    InstructionCategory::Business
                },
                instruction: text.to_string(),
            })
            .collect()
    }

    fn selection() -> InstructionSelection {
        let mut selection = InstructionSelection::new(InstructionLimits::default());
        selection.replace_generated(candidates());
        selection
    }

    #[test]
    fn toggle_picks_and_unpicks() {
        let mut selection = selection();
        assert!(selection.toggle(1).unwrap());
        assert!(selection.toggle(0).unwrap());
        assert_eq!(selection.picked(), ["Emoji storm", "Pirate voice"]);
        assert!(!selection.toggle(1).unwrap());
        assert_eq!(selection.picked(), ["Pirate voice"]);
    }

    #[test]
    fn fifth_pick_is_rejected() {
        let mut selection = selection();
        for index in 0..4 {
            selection.toggle(index).unwrap();
        }
        let err = selection.toggle(4).unwrap_err();
        assert_eq!(err, ApiError::validation("Maximum 4 instructions allowed"));
        assert_eq!(selection.picked().len(), 4);
    }

    #[test]
    fn active_lists_picked_before_manual() {
        let mut selection = selection();
        selection.add_manual("  Keep names untranslated ").unwrap();
        selection.toggle(2).unwrap();
        assert_eq!(
            selection.active(),
            vec!["Board-room tone".to_string(), "Keep names untranslated".to_string()]
        );
    }

    #[test]
    fn manual_instructions_respect_length_and_count() {
        let limits = InstructionLimits {
            max_length: 10,
            max_count: 2,
            max_selected: 4,
        };
        let mut selection = InstructionSelection::new(limits);
        assert!(selection.add_manual("   ").is_err());
        assert!(selection.add_manual("far too long for it").is_err());
        selection.add_manual("one").unwrap();
        selection.add_manual("two").unwrap();
        assert!(selection.add_manual("three").is_err());
        assert_eq!(selection.remove_manual(0).unwrap(), "one");
        assert!(selection.remove_manual(5).is_err());
    }

    #[test]
    fn new_roll_clears_picks_but_keeps_manual() {
        let mut selection = selection();
        selection.toggle(0).unwrap();
        selection.add_manual("Stay polite").unwrap();
        selection.replace_generated(candidates());
        assert!(selection.picked().is_empty());
        assert_eq!(selection.active(), vec!["Stay polite".to_string()]);
        assert!(selection.toggle(9).is_err());
    }
}
