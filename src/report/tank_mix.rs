//! Tank-mixing sequence: ordered steps with products and notes

use crate::error::{Result, SoilError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankMixItem {
    pub id: String,
    /// 1-based position, kept contiguous
    pub sequence: u32,
    pub product_description: String,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

static DEFAULT_STEPS: &[(&str, &str)] = &[
    ("More soluble Solids", "May require several minutes of good agitation"),
    ("Liquid Solutions", "Make sure previous inputs are fully dissolved before adding."),
    (
        "MMS (Micronized Mineral Solutions)",
        "Pre-mix well before adding slowly to the tank under constant agitation. Maintain constant agitation to prevent settling.",
    ),
    ("Spray Oil", "Spreader/sticker/penetrant. Essential for success of foliar sprays."),
    (
        "Microbial Products",
        "Always add microbes to the spray tank last after the other ingredients have been diluted.",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankMixSequence {
    items: Vec<TankMixItem>,
    #[serde(skip)]
    next_id: u64,
}

impl Default for TankMixSequence {
    fn default() -> Self {
        let mut sequence = TankMixSequence {
            items: Vec::with_capacity(DEFAULT_STEPS.len()),
            next_id: 0,
        };
        for (description, notes) in DEFAULT_STEPS {
            sequence.add(description, notes);
        }
        sequence
    }
}

impl TankMixSequence {
    pub fn items(&self) -> &[TankMixItem] {
        &self.items
    }

    /// Append a step and return its id
    pub fn add(&mut self, description: &str, notes: &str) -> String {
        self.next_id += 1;
        let id = format!("t{}", self.next_id);
        self.items.push(TankMixItem {
            id: id.clone(),
            sequence: 0,
            product_description: description.to_string(),
            products: Vec::new(),
            notes: notes.to_string(),
        });
        self.resequence();
        id
    }

    pub fn remove(&mut self, id: &str) -> Result<TankMixItem> {
        let index = self.position(id)?;
        let item = self.items.remove(index);
        self.resequence();
        Ok(item)
    }

    /// Returns false when the step is already first
    pub fn move_up(&mut self, id: &str) -> Result<bool> {
        let index = self.position(id)?;
        if index == 0 {
            return Ok(false);
        }
        self.items.swap(index - 1, index);
        self.resequence();
        Ok(true)
    }

    /// Returns false when the step is already last
    pub fn move_down(&mut self, id: &str) -> Result<bool> {
        let index = self.position(id)?;
        if index + 1 >= self.items.len() {
            return Ok(false);
        }
        self.items.swap(index, index + 1);
        self.resequence();
        Ok(true)
    }

    pub fn set_products(&mut self, id: &str, products: Vec<String>) -> Result<()> {
        let index = self.position(id)?;
        self.items[index].products = products;
        Ok(())
    }

    pub fn set_notes(&mut self, id: &str, notes: &str) -> Result<()> {
        let index = self.position(id)?;
        self.items[index].notes = notes.to_string();
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| SoilError::InvalidInput(format!("no tank-mix step '{}'", id)))
    }

    fn resequence(&mut self) {
        for (i, item) in self.items.iter_mut().enumerate() {
            item.sequence = i as u32 + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptions(seq: &TankMixSequence) -> Vec<&str> {
        seq.items().iter().map(|i| i.product_description.as_str()).collect()
    }

    fn sequences(seq: &TankMixSequence) -> Vec<u32> {
        seq.items().iter().map(|i| i.sequence).collect()
    }

    #[test]
    fn test_defaults() {
        let seq = TankMixSequence::default();
        assert_eq!(seq.items().len(), 5);
        assert_eq!(sequences(&seq), vec![1, 2, 3, 4, 5]);
        assert_eq!(seq.items()[4].product_description, "Microbial Products");
        assert!(seq.items()[3].notes.starts_with("Spreader/sticker/penetrant"));
    }

    #[test]
    fn test_moves_resequence() {
        let mut seq = TankMixSequence::default();
        let oil = seq.items()[3].id.clone();
        assert!(seq.move_up(&oil).unwrap());
        assert_eq!(descriptions(&seq)[2], "Spray Oil");
        assert_eq!(sequences(&seq), vec![1, 2, 3, 4, 5]);

        let first = seq.items()[0].id.clone();
        assert!(!seq.move_up(&first).unwrap());
        let last = seq.items()[4].id.clone();
        assert!(!seq.move_down(&last).unwrap());
    }

    #[test]
    fn test_add_remove_resequence() {
        let mut seq = TankMixSequence::default();
        let second = seq.items()[1].id.clone();
        seq.remove(&second).unwrap();
        assert_eq!(sequences(&seq), vec![1, 2, 3, 4]);

        let wetting = seq.add("Wetting Agent", "");
        assert_eq!(seq.items().last().unwrap().sequence, 5);
        seq.set_products(&wetting, vec!["Agent X".into()]).unwrap();
        assert_eq!(seq.items()[4].products, vec!["Agent X"]);

        assert!(seq.remove("missing").is_err());
    }
}
