use serde::{Deserialize, Serialize};

/// Shown in place of a field the backend could not extract.
pub const MISSING_VALUE: &str = "—";

/// Structured shipment fields returned by `/extract`. Every field is
/// independently nullable.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ShipmentRecord {
    #[serde(default)]
    pub shipment_id: Option<String>,
    #[serde(default)]
    pub shipper: Option<String>,
    #[serde(default)]
    pub consignee: Option<String>,
    #[serde(default)]
    pub pickup_datetime: Option<String>,
    #[serde(default)]
    pub delivery_datetime: Option<String>,
    #[serde(default)]
    pub equipment_type: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub carrier_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl FieldValue<'_> {
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(text) => text.to_string(),
            // f64's Display already drops a trailing ".0"
            FieldValue::Number(n) => n.to_string(),
        }
    }
}

pub fn format_field(value: Option<FieldValue<'_>>) -> String {
    match value {
        Some(v) => v.render(),
        None => MISSING_VALUE.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentRow {
    pub label: &'static str,
    pub value: String,
}

impl ShipmentRow {
    pub fn is_missing(&self) -> bool {
        self.value == MISSING_VALUE
    }
}

impl ShipmentRecord {
    pub fn fields(&self) -> [(&'static str, Option<FieldValue<'_>>); 11] {
        fn text(v: &Option<String>) -> Option<FieldValue<'_>> {
            v.as_deref().map(FieldValue::Text)
        }
        [
            ("Shipment ID", text(&self.shipment_id)),
            ("Shipper", text(&self.shipper)),
            ("Consignee", text(&self.consignee)),
            ("Pickup date/time", text(&self.pickup_datetime)),
            ("Delivery date/time", text(&self.delivery_datetime)),
            ("Equipment type", text(&self.equipment_type)),
            ("Mode", text(&self.mode)),
            ("Rate", self.rate.map(FieldValue::Number)),
            ("Currency", text(&self.currency)),
            ("Weight", text(&self.weight)),
            ("Carrier name", text(&self.carrier_name)),
        ]
    }

    pub fn rows(&self) -> Vec<ShipmentRow> {
        self.fields()
            .into_iter()
            .map(|(label, value)| ShipmentRow {
                label,
                value: format_field(value),
            })
            .collect()
    }

    /// Number of fields the backend actually filled in.
    pub fn present_count(&self) -> usize {
        self.fields().iter().filter(|(_, v)| v.is_some()).count()
    }
}
