//! Catalog collaborator types: units, items with unit conversions, warehouses and bins.
//!
//! The stock engine treats these as read-only inputs. The only write path is the
//! new-item inbound, which creates an [`Item`] together with its opening stock.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::amount::in_range;
use millerp_core::{BinId, CompanyId, DomainError, DomainResult, Entity, ItemId, UnitId, WarehouseId};

/// Unit of measure (e.g. KG, TON, PCS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub code: String,
    pub name: String,
}

impl Entity for Unit {
    type Id = UnitId;

    fn id(&self) -> UnitId {
        self.id
    }
}

/// Alternate unit for an item: `1 unit == factor base units`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub unit_id: UnitId,
    pub factor: Decimal,
}

/// Catalog item. Stock is always tracked in `base_unit_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    pub base_unit_id: UnitId,
    #[serde(default)]
    pub conversions: Vec<UnitConversion>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

impl Item {
    pub fn new(
        id: ItemId,
        sku: impl Into<String>,
        name: impl Into<String>,
        base_unit_id: UnitId,
        conversions: Vec<UnitConversion>,
    ) -> DomainResult<Self> {
        let item = Self {
            id,
            sku: sku.into().trim().to_string(),
            name: name.into(),
            base_unit_id,
            conversions,
            active: true,
        };
        item.validate()?;
        Ok(item)
    }

    /// Checks applied to every item entering the catalog, created or seeded.
    pub fn validate(&self) -> DomainResult<()> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        for c in &self.conversions {
            if c.factor <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "conversion factor for unit {} must be positive",
                    c.unit_id
                )));
            }
            if c.unit_id == self.base_unit_id && c.factor != Decimal::ONE {
                return Err(DomainError::validation(
                    "base unit conversion factor must be 1",
                ));
            }
        }
        Ok(())
    }

    /// Factor converting one `unit_id` into base units, if the item supports that unit.
    pub fn conversion_factor(&self, unit_id: UnitId) -> Option<Decimal> {
        if unit_id == self.base_unit_id {
            return Some(Decimal::ONE);
        }
        self.conversions
            .iter()
            .find(|c| c.unit_id == unit_id)
            .map(|c| c.factor)
    }

    pub fn to_base(&self, unit_id: UnitId, qty: Decimal) -> DomainResult<Decimal> {
        let factor = self.conversion_factor(unit_id).ok_or_else(|| {
            DomainError::validation(format!(
                "unit {unit_id} is not convertible for item {}",
                self.sku
            ))
        })?;
        in_range(qty.checked_mul(factor))
    }

    pub fn from_base(&self, unit_id: UnitId, qty_base: Decimal) -> DomainResult<Decimal> {
        let factor = self.conversion_factor(unit_id).ok_or_else(|| {
            DomainError::validation(format!(
                "unit {unit_id} is not convertible for item {}",
                self.sku
            ))
        })?;
        in_range(qty_base.checked_div(factor))
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::validation(format!("item {} is inactive", self.sku)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub company_id: CompanyId,
    /// Short code used in document numbers (e.g. "WH01").
    pub code: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> WarehouseId {
        self.id
    }
}

impl Warehouse {
    pub fn ensure_active(&self) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::validation(format!(
                "warehouse {} is inactive",
                self.code
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub id: BinId,
    pub warehouse_id: WarehouseId,
    pub code: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Entity for Bin {
    type Id = BinId;

    fn id(&self) -> BinId {
        self.id
    }
}

impl Bin {
    /// A bin is usable for a movement only when active and inside the movement's warehouse.
    pub fn ensure_usable_in(&self, warehouse_id: WarehouseId) -> DomainResult<()> {
        if self.warehouse_id != warehouse_id {
            return Err(DomainError::validation(format!(
                "bin {} does not belong to warehouse {warehouse_id}",
                self.code
            )));
        }
        if !self.active {
            return Err(DomainError::validation(format!("bin {} is inactive", self.code)));
        }
        Ok(())
    }
}

/// Physical stock location: a warehouse, optionally narrowed to one bin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockLocation {
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
}

impl StockLocation {
    pub fn new(warehouse_id: WarehouseId, bin_id: Option<BinId>) -> Self {
        Self {
            warehouse_id,
            bin_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sack_item() -> (Item, UnitId, UnitId) {
        let kg = UnitId::new();
        let sack = UnitId::new();
        let item = Item::new(
            ItemId::new(),
            "FERT-NPK",
            "NPK fertilizer",
            kg,
            vec![UnitConversion {
                unit_id: sack,
                factor: dec!(50),
            }],
        )
        .unwrap();
        (item, kg, sack)
    }

    #[test]
    fn converts_alternate_unit_to_base_and_back() {
        let (item, kg, sack) = sack_item();
        assert_eq!(item.to_base(kg, dec!(7)).unwrap(), dec!(7));
        assert_eq!(item.to_base(sack, dec!(3)).unwrap(), dec!(150));
        assert_eq!(item.from_base(sack, dec!(125)).unwrap(), dec!(2.5));
    }

    #[test]
    fn conversion_overflow_is_a_validation_error() {
        let (item, _, sack) = sack_item();
        let err = item.to_base(sack, Decimal::MAX).unwrap_err();
        assert_eq!(err, DomainError::validation("quantity out of range"));
    }

    #[test]
    fn seeded_item_with_zero_factor_fails_validation() {
        let (mut item, _, _) = sack_item();
        item.conversions[0].factor = Decimal::ZERO;
        assert!(matches!(item.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn unknown_unit_is_a_validation_error() {
        let (item, _, _) = sack_item();
        let err = item.to_base(UnitId::new(), dec!(1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("FERT-NPK")));
    }

    #[test]
    fn non_positive_factor_is_rejected() {
        let err = Item::new(
            ItemId::new(),
            "X",
            "X",
            UnitId::new(),
            vec![UnitConversion {
                unit_id: UnitId::new(),
                factor: dec!(0),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn bin_must_belong_to_warehouse() {
        let bin = Bin {
            id: BinId::new(),
            warehouse_id: WarehouseId::new(),
            code: "A-01".to_string(),
            active: true,
        };
        assert!(bin.ensure_usable_in(bin.warehouse_id).is_ok());
        assert!(bin.ensure_usable_in(WarehouseId::new()).is_err());
    }
}
