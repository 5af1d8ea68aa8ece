// Entity Models
//
// Reference data the engine reads but never mutates:
// - Item types shared by rules and line items
// - Nominal codes (ledger buckets) and their registry
// - Tax rates with a designated standard rate

pub mod item_type;
pub mod nominal_code;
pub mod tax_rate;

pub use item_type::ItemType;
pub use nominal_code::{NominalCode, NominalCodeRegistry};
pub use tax_rate::{TaxRate, TaxRateTable};
