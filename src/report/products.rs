//! Product recommendation lists per application stage

use crate::error::{Result, SoilError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStage {
    SeedTreatment,
    SoilDrench,
    FoliarSpray,
    PreFloweringFoliar,
    NutritionalFoliar,
}

impl ProductStage {
    pub const ALL: &'static [ProductStage] = &[
        ProductStage::SeedTreatment,
        ProductStage::SoilDrench,
        ProductStage::FoliarSpray,
        ProductStage::PreFloweringFoliar,
        ProductStage::NutritionalFoliar,
    ];

    pub fn display_text(&self) -> &'static str {
        match self {
            ProductStage::SeedTreatment => "Seed Treatment",
            ProductStage::SoilDrench => "Soil Drench",
            ProductStage::FoliarSpray => "Foliar Spray",
            ProductStage::PreFloweringFoliar => "Pre-Flowering Foliar",
            ProductStage::NutritionalFoliar => "Nutritional Foliar",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub id: String,
    pub product: String,
    /// Free text, e.g. "3-4"
    pub rate: String,
    pub unit: String,
}

/// Partial edit of a product item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductLists {
    #[serde(default)]
    pub seed_treatment: Vec<ProductItem>,
    #[serde(default)]
    pub soil_drench: Vec<ProductItem>,
    #[serde(default)]
    pub foliar_spray: Vec<ProductItem>,
    #[serde(default)]
    pub pre_flowering_foliar: Vec<ProductItem>,
    #[serde(default)]
    pub nutritional_foliar: Vec<ProductItem>,
    #[serde(skip)]
    next_id: u64,
}

impl ProductLists {
    pub fn list(&self, stage: ProductStage) -> &[ProductItem] {
        match stage {
            ProductStage::SeedTreatment => &self.seed_treatment,
            ProductStage::SoilDrench => &self.soil_drench,
            ProductStage::FoliarSpray => &self.foliar_spray,
            ProductStage::PreFloweringFoliar => &self.pre_flowering_foliar,
            ProductStage::NutritionalFoliar => &self.nutritional_foliar,
        }
    }

    fn list_mut(&mut self, stage: ProductStage) -> &mut Vec<ProductItem> {
        match stage {
            ProductStage::SeedTreatment => &mut self.seed_treatment,
            ProductStage::SoilDrench => &mut self.soil_drench,
            ProductStage::FoliarSpray => &mut self.foliar_spray,
            ProductStage::PreFloweringFoliar => &mut self.pre_flowering_foliar,
            ProductStage::NutritionalFoliar => &mut self.nutritional_foliar,
        }
    }

    /// Append a product and return its id
    pub fn add(&mut self, stage: ProductStage, product: &str, rate: &str, unit: &str) -> Result<String> {
        if product.trim().is_empty() {
            return Err(SoilError::InvalidInput("product name is empty".to_string()));
        }
        self.next_id += 1;
        let id = format!("p{}", self.next_id);
        self.list_mut(stage).push(ProductItem {
            id: id.clone(),
            product: product.trim().to_string(),
            rate: rate.trim().to_string(),
            unit: unit.trim().to_string(),
        });
        Ok(id)
    }

    pub fn remove(&mut self, stage: ProductStage, id: &str) -> Result<ProductItem> {
        let list = self.list_mut(stage);
        let index = list
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| SoilError::InvalidInput(format!("no product '{}' in {}", id, stage.display_text())))?;
        Ok(list.remove(index))
    }

    pub fn update(&mut self, stage: ProductStage, id: &str, update: ProductUpdate) -> Result<()> {
        let item = self
            .list_mut(stage)
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| SoilError::InvalidInput(format!("no product '{}' in {}", id, stage.display_text())))?;
        if let Some(product) = update.product {
            item.product = product;
        }
        if let Some(rate) = update.rate {
            item.rate = rate;
        }
        if let Some(unit) = update.unit {
            item.unit = unit;
        }
        Ok(())
    }

    /// Every product name across all stages, without duplicates
    pub fn product_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for &stage in ProductStage::ALL {
            for item in self.list(stage) {
                if !names.contains(&item.product) {
                    names.push(item.product.clone());
                }
            }
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        ProductStage::ALL.iter().all(|&s| self.list(s).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_update_remove() {
        let mut lists = ProductLists::default();
        let id = lists.add(ProductStage::SeedTreatment, "Root Starter", "3-4", "L/tonne of seed").unwrap();
        lists.add(ProductStage::FoliarSpray, "Kelp Extract", "2", "L/ha").unwrap();

        lists
            .update(ProductStage::SeedTreatment, &id, ProductUpdate { rate: Some("5".into()), ..Default::default() })
            .unwrap();
        assert_eq!(lists.seed_treatment[0].rate, "5");
        assert_eq!(lists.product_names(), vec!["Root Starter", "Kelp Extract"]);

        // wrong stage
        assert!(lists.remove(ProductStage::SoilDrench, &id).is_err());
        let removed = lists.remove(ProductStage::SeedTreatment, &id).unwrap();
        assert_eq!(removed.product, "Root Starter");
        assert!(lists.seed_treatment.is_empty());
        assert!(!lists.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut lists = ProductLists::default();
        let a = lists.add(ProductStage::SoilDrench, "A", "1", "L/ha").unwrap();
        lists.remove(ProductStage::SoilDrench, &a).unwrap();
        let b = lists.add(ProductStage::SoilDrench, "B", "1", "L/ha").unwrap();
        assert_ne!(a, b);
        assert!(lists.add(ProductStage::SoilDrench, "  ", "1", "L/ha").is_err());
    }
}
