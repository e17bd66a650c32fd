use super::*;
use serde_json::json;

fn sample_definition() -> ExecutionDefinition {
    ExecutionDefinition::pivot(
        vec![
            AttributeDef {
                local_id: "region".to_string(),
                title: "Region".to_string(),
            },
            AttributeDef {
                local_id: "year".to_string(),
                title: "Year".to_string(),
            },
        ],
        vec![MeasureDef {
            local_id: "revenue".to_string(),
            title: "Revenue".to_string(),
            format: Some("#,##0.00".to_string()),
        }],
        &["region"],
        &["year"],
    )
}

// ========================
// Width item format
// ========================

#[test]
fn attribute_width_item_parses() {
    let item: ColumnWidthItem = serde_json::from_value(json!({
        "attributeColumnWidthItem": {
            "attributeIdentifier": "region",
            "width": { "value": 120 }
        }
    }))
    .expect("attribute item");

    assert_eq!(
        item,
        ColumnWidthItem::Attribute {
            attribute_identifier: "region".to_string(),
            width: ColumnWidth::pixels(120.0),
        }
    );
}

#[test]
fn measure_item_kind_follows_locators() {
    let strong: ColumnWidthItem = serde_json::from_value(json!({
        "measureColumnWidthItem": {
            "width": { "value": 80, "allowGrowToFit": true },
            "locators": [
                { "attributeLocatorItem": { "attributeIdentifier": "year", "element": "y2020" } },
                { "measureLocatorItem": { "measureIdentifier": "revenue" } }
            ]
        }
    }))
    .expect("strong item");
    let weak: ColumnWidthItem = serde_json::from_value(json!({
        "measureColumnWidthItem": {
            "width": { "value": 90 },
            "locator": { "measureLocatorItem": { "measureIdentifier": "revenue" } }
        }
    }))
    .expect("weak item");
    let all: ColumnWidthItem = serde_json::from_value(json!({
        "measureColumnWidthItem": { "width": { "value": 70 } }
    }))
    .expect("all measures item");

    assert_eq!(
        strong,
        ColumnWidthItem::Measure {
            locators: vec![
                LocatorItem::attribute("year", "y2020"),
                LocatorItem::measure("revenue"),
            ],
            width: ColumnWidth::pixels(80.0).with_grow_to_fit(true),
        }
    );
    assert_eq!(
        weak,
        ColumnWidthItem::WeakMeasure {
            measure_identifier: "revenue".to_string(),
            width: ColumnWidth::pixels(90.0),
        }
    );
    assert_eq!(
        all,
        ColumnWidthItem::AllMeasures {
            width: ColumnWidth::pixels(70.0)
        }
    );
}

#[test]
fn missing_or_keyword_value_means_auto() {
    let absent: ColumnWidth = serde_json::from_value(json!({})).expect("absent");
    let keyword: ColumnWidth = serde_json::from_value(json!({ "value": "auto" })).expect("auto");

    assert!(absent.is_auto());
    assert!(keyword.is_auto());
    assert_eq!(
        serde_json::to_value(ColumnWidth::auto()).expect("serialize"),
        json!({ "value": "auto" })
    );
}

#[test]
fn weak_item_serializes_with_single_locator() {
    let item = ColumnWidthItem::WeakMeasure {
        measure_identifier: "revenue".to_string(),
        width: ColumnWidth::pixels(100.0),
    };

    assert_eq!(
        serde_json::to_value(&item).expect("serialize"),
        json!({
            "measureColumnWidthItem": {
                "width": { "value": 100.0 },
                "locator": { "measureLocatorItem": { "measureIdentifier": "revenue" } }
            }
        })
    );
}

#[test]
fn lenient_parse_drops_malformed_items() {
    let items = parse_column_width_items_lenient(&json!([
        { "attributeColumnWidthItem": { "attributeIdentifier": "region", "width": { "value": 100 } } },
        { "attributeColumnWidthItem": { "width": { "value": 100 } } },
        { "measureColumnWidthItem": { "width": { "value": -5 } } },
        { "measureColumnWidthItem": { "width": { "value": "wide" } } },
        { "measureColumnWidthItem": { "width": { "value": 50 }, "locators": [] } },
        { "measureColumnWidthItem": {
            "width": { "value": 50 },
            "locator": { "attributeLocatorItem": { "attributeIdentifier": "a", "element": "e" } }
        } },
        { "unknownColumnWidthItem": {} },
        { "sliceMeasureColumnWidthItem": { "width": { "value": 140 } } }
    ]));

    assert_eq!(
        items,
        vec![
            ColumnWidthItem::Attribute {
                attribute_identifier: "region".to_string(),
                width: ColumnWidth::pixels(100.0),
            },
            ColumnWidthItem::SliceMeasure {
                width: ColumnWidth::pixels(140.0)
            },
        ]
    );
}

#[test]
fn lenient_parse_of_non_list_is_empty() {
    assert!(parse_column_width_items_lenient(&json!({ "widths": [] })).is_empty());
}

// ========================
// Definitions and data views
// ========================

#[test]
fn definition_round_trip() {
    let definition = sample_definition()
        .with_sorts(vec![SortItem::AttributeSortItem {
            attribute_identifier: "region".to_string(),
            direction: SortDirection::Desc,
            aggregation: None,
        }])
        .with_totals(vec![TotalDefinition {
            total_type: TotalType::Sum,
            measure_identifier: "revenue".to_string(),
            attribute_identifier: "region".to_string(),
        }]);

    let encoded = ron::ser::to_string(&definition).expect("serialize definition");
    let decoded: ExecutionDefinition = ron::de::from_str(&encoded).expect("deserialize");

    assert_eq!(definition, decoded);
}

#[test]
fn transposing_moves_measure_group_to_rows() {
    let definition = sample_definition().transposed();

    assert!(definition.is_transposed());
    assert_eq!(
        definition.dimensions[0].items,
        vec![
            DimensionItem::Attribute("region".to_string()),
            DimensionItem::MeasureGroup
        ]
    );
    assert_eq!(
        definition.dimensions[1].items,
        vec![DimensionItem::Attribute("year".to_string())]
    );
}

#[test]
fn total_header_key_and_name() {
    let header = ResultHeader::total(TotalType::Med);

    assert_eq!(header.element_key().as_deref(), Some("!med"));
    assert_eq!(header.display_name(), Some("Median"));
    assert_eq!(ResultHeader::MeasureHeaderItem { order: 0 }.element_key(), None);
}

#[test]
fn validate_reports_ragged_data() {
    let view = DataView {
        definition: sample_definition(),
        offset: [0, 0],
        count: [1, 1],
        total_count: [1, 1],
        headers: [
            vec![vec![ResultHeader::element("r/east", "East")]],
            vec![
                vec![ResultHeader::element("y/2020", "2020")],
                vec![ResultHeader::MeasureHeaderItem { order: 0 }],
            ],
        ],
        data: vec![vec![Some(1.0), Some(2.0)]],
        totals: vec![],
    };

    assert_eq!(
        view.validate(),
        Err(DataViewError::DataWidth {
            row: 0,
            expected: 1,
            actual: 2
        })
    );
}
