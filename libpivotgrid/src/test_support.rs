//! Fixtures shared by the unit tests.
use pivotgrid_types::{
    AttributeDef, DataView, ExecutionDefinition, MeasureDef, ResultHeader, TotalDefinition,
    TotalType,
};

use crate::backend::{InMemoryBackend, Record};
use crate::data::GridRow;
use crate::structure::TableDescriptor;

pub(crate) const REVENUE_2023: &str = "c_year=2023|m_revenue";
pub(crate) const QUANTITY_2023: &str = "c_year=2023|m_quantity";
pub(crate) const REVENUE_2024: &str = "c_year=2024|m_revenue";
pub(crate) const QUANTITY_2024: &str = "c_year=2024|m_quantity";

pub(crate) fn attribute(local_id: &str, title: &str) -> AttributeDef {
    AttributeDef {
        local_id: local_id.to_string(),
        title: title.to_string(),
    }
}

pub(crate) fn measure(local_id: &str, title: &str, format: Option<&str>) -> MeasureDef {
    MeasureDef {
        local_id: local_id.to_string(),
        title: title.to_string(),
        format: format.map(str::to_string),
    }
}

pub(crate) fn total(total_type: TotalType, measure: &str, attribute: &str) -> TotalDefinition {
    TotalDefinition {
        total_type,
        measure_identifier: measure.to_string(),
        attribute_identifier: attribute.to_string(),
    }
}

/// Four (region, city) rows over the years 2023 and 2024.
pub(crate) fn sales_records() -> Vec<Record> {
    vec![
        Record::new()
            .attr("region", "East")
            .attr("city", "Boston")
            .attr("year", "2023")
            .measure("revenue", 100.)
            .measure("quantity", 1.),
        Record::new()
            .attr("region", "East")
            .attr("city", "Boston")
            .attr("year", "2024")
            .measure("revenue", 150.)
            .measure("quantity", 2.),
        Record::new()
            .attr("region", "East")
            .attr("city", "Cambridge")
            .attr("year", "2023")
            .measure("revenue", 80.)
            .measure("quantity", 3.),
        Record::new()
            .attr("region", "West")
            .attr("city", "Seattle")
            .attr("year", "2023")
            .measure("revenue", 200.)
            .measure("quantity", 4.),
        Record::new()
            .attr("region", "West")
            .attr("city", "Seattle")
            .attr("year", "2024")
            .measure("revenue", 50.)
            .measure("quantity", 5.),
        Record::new()
            .attr("region", "West")
            .attr("city", "Portland")
            .attr("year", "2024")
            .measure("revenue", 30.)
            .measure("quantity", 6.),
    ]
}

/// Region and city in rows, year and the measures in columns.
pub(crate) fn sales_definition() -> ExecutionDefinition {
    ExecutionDefinition::pivot(
        vec![
            attribute("region", "Region"),
            attribute("city", "City"),
            attribute("year", "Year"),
        ],
        vec![
            measure("revenue", "Revenue", Some("#,##0.00")),
            measure("quantity", "Quantity", None),
        ],
        &["region", "city"],
        &["year"],
    )
}

pub(crate) fn sales_backend() -> InMemoryBackend {
    InMemoryBackend::new(sales_records())
}

/// The whole result of `definition` over the sales records.
pub(crate) fn sales_view(definition: &ExecutionDefinition) -> DataView {
    sales_backend()
        .compute(definition)
        .expect("compute")
        .window([0, 0], [100, 100])
        .expect("window")
}

pub(crate) fn sales_descriptor() -> TableDescriptor {
    TableDescriptor::for_data_view(&sales_view(&sales_definition())).expect("descriptor")
}

/// Row with attribute elements for the given slice columns, used where only
/// grouping matters.
pub(crate) fn element_row(elements: &[(&str, &str)]) -> GridRow {
    let mut row = GridRow::default();
    for (col_id, element) in elements {
        row.fields.insert((*col_id).to_string(), (*element).to_string());
        row.header_item_map
            .insert((*col_id).to_string(), ResultHeader::element(*element, *element));
    }
    row
}
