// 🔧 Item Type - What kind of billable/costable line an item is
//
// The same six types drive both nominal code rules and line items, so the
// enum lives here and is shared by both sides.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    /// Workshop labor (hours or fixed-price jobs)
    Labor,

    /// Parts fitted or sold
    Part,

    /// MOT test fee
    #[serde(rename = "MOT")]
    Mot,

    /// Purchase-order lines (stock, consumables, sublet)
    Purchase,

    /// Courtesy car charges
    CourtesyCar,

    /// Vehicle storage charges
    Storage,
}

impl ItemType {
    pub const ALL: [ItemType; 6] = [
        ItemType::Labor,
        ItemType::Part,
        ItemType::Mot,
        ItemType::Purchase,
        ItemType::CourtesyCar,
        ItemType::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Labor => "Labor",
            ItemType::Part => "Part",
            ItemType::Mot => "MOT",
            ItemType::Purchase => "Purchase",
            ItemType::CourtesyCar => "CourtesyCar",
            ItemType::Storage => "Storage",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown item type: {}", s))
    }
}

/// Deserialize an item type that may be blank while a rule is still being edited.
///
/// `""` and `null` both become `None`; any other unknown value is an error.
pub(crate) fn deserialize_optional_item_type<'de, D>(
    deserializer: D,
) -> Result<Option<ItemType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
