use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pivotgrid_types::{
    BackendError, ExecutionDefinition, ResultHeader, SortDirection, SortItem, TotalType,
};

use super::*;
use crate::backend::{InMemoryBackend, Record};
use crate::host::{GridHost, MemoryGridHost};
use crate::structure::{SortModelItem, TableDescriptor};
use crate::test_support::*;

// ========================
// Rows
// ========================

#[test]
fn rows_carry_header_names_and_raw_values() {
    let view = sales_view(&sales_definition());
    let descriptor = TableDescriptor::for_data_view(&view).expect("descriptor");

    let rows = create_rows(&view, &descriptor);

    assert_eq!(rows.len(), 4);
    let boston = &rows[0];
    assert_eq!(boston.field("s_region"), Some("East"));
    assert_eq!(boston.field("s_city"), Some("Boston"));
    assert_eq!(boston.field(REVENUE_2023), Some("100"));
    assert_eq!(boston.field(QUANTITY_2024), Some("2"));
    assert_eq!(boston.row_type, RowType::Normal);
    assert_eq!(
        boston.header_item_map.get(REVENUE_2023),
        Some(&ResultHeader::MeasureHeaderItem { order: 0 })
    );
    assert_eq!(
        boston.header_item_map.get("s_city"),
        Some(&ResultHeader::element("Boston", "Boston"))
    );

    // Cambridge has no 2024 facts
    assert_eq!(rows[1].field(REVENUE_2024), Some(""));
}

#[test]
fn raw_values_use_shortest_text() {
    assert_eq!(raw_value_text(None), "");
    assert_eq!(raw_value_text(Some(100.)), "100");
    assert_eq!(raw_value_text(Some(1.5)), "1.5");
    assert_eq!(raw_value_text(Some(-0.25)), "-0.25");
}

#[test]
fn subtotal_rows_are_typed_and_styled() {
    let definition = sales_definition().with_totals(vec![
        total(TotalType::Sum, "revenue", "region"),
        total(TotalType::Sum, "revenue", "city"),
    ]);
    let view = sales_view(&definition);
    let descriptor = TableDescriptor::for_data_view(&view).expect("descriptor");

    let rows = create_rows(&view, &descriptor);

    assert_eq!(rows.len(), 6);
    let east_subtotal = &rows[2];
    assert_eq!(east_subtotal.row_type, RowType::Subtotal);
    assert_eq!(east_subtotal.subtotal_style, Some(SubtotalStyle::Even));
    assert_eq!(east_subtotal.field("s_region"), Some("East"));
    assert_eq!(east_subtotal.field("s_city"), Some("Sum"));
    assert_eq!(east_subtotal.field(REVENUE_2023), Some("180"));
    // no subtotal was requested for quantity
    assert_eq!(east_subtotal.field(QUANTITY_2023), Some(""));
    assert!(east_subtotal.is_some_total());
    assert_eq!(rows[5].row_type, RowType::Subtotal);
}

#[test]
fn subtotal_styles_alternate_over_attributes_with_subtotals() {
    let definition = ExecutionDefinition::pivot(
        vec![
            attribute("a", "A"),
            attribute("b", "B"),
            attribute("c", "C"),
            attribute("d", "D"),
        ],
        vec![measure("m", "M", None)],
        &["a", "b", "c", "d"],
        &[],
    )
    .with_totals(vec![
        total(TotalType::Sum, "m", "a"),
        total(TotalType::Sum, "m", "b"),
        total(TotalType::Sum, "m", "d"),
    ]);
    let records = vec![
        Record::new()
            .attr("a", "1")
            .attr("b", "2")
            .attr("c", "3")
            .attr("d", "4")
            .measure("m", 1.),
    ];
    let view = InMemoryBackend::new(records)
        .compute(&definition)
        .expect("compute")
        .window([0, 0], [10, 10])
        .expect("window");
    let descriptor = TableDescriptor::for_data_view(&view).expect("descriptor");

    assert_eq!(
        subtotal_styles(&descriptor),
        vec![
            None,
            Some(SubtotalStyle::Even),
            None,
            Some(SubtotalStyle::Odd)
        ]
    );
}

#[test]
fn pinned_rows_hold_grand_totals() {
    let definition = sales_definition().with_totals(vec![
        total(TotalType::Sum, "revenue", "region"),
        total(TotalType::Max, "revenue", "region"),
    ]);
    let view = sales_view(&definition);
    let descriptor = TableDescriptor::for_data_view(&view).expect("descriptor");

    let pinned = create_pinned_total_rows(&view, &descriptor);

    assert_eq!(pinned.len(), 2);
    assert_eq!(pinned[0].row_type, RowType::Total);
    assert_eq!(pinned[0].field("s_region"), Some("Sum"));
    assert_eq!(pinned[0].field(REVENUE_2023), Some("380"));
    assert_eq!(pinned[1].field("s_region"), Some("Max"));
    assert_eq!(pinned[1].field(REVENUE_2023), Some("200"));
    assert_eq!(
        pinned[1].header_item_map.get("s_region"),
        Some(&ResultHeader::total(TotalType::Max))
    );
}

#[test]
fn transposed_rows_name_their_measure() {
    let definition = sales_definition().transposed();
    let view = sales_view(&definition);
    let descriptor = TableDescriptor::for_data_view(&view).expect("descriptor");

    let rows = create_rows(&view, &descriptor);

    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0].field("sm"), Some("Revenue"));
    assert_eq!(rows[1].field("sm"), Some("Quantity"));
    assert_eq!(rows[1].field("c_year=2023|mv"), Some("1"));
    assert_eq!(
        rows[1].header_item_map.get("c_year=2023|mv"),
        Some(&ResultHeader::MeasureHeaderItem { order: 1 })
    );
}

// ========================
// Grouping
// ========================

fn region_city_rows() -> Vec<GridRow> {
    vec![
        element_row(&[("s_region", "East"), ("s_city", "Boston")]),
        element_row(&[("s_region", "East"), ("s_city", "Boston")]),
        element_row(&[("s_region", "East"), ("s_city", "Cambridge")]),
        element_row(&[("s_region", "West"), ("s_city", "Seattle")]),
    ]
}

fn slice_ids() -> Vec<String> {
    vec!["s_region".to_string(), "s_city".to_string()]
}

fn repetitions(provider: &dyn RowGroupingProvider, col_id: &str) -> Vec<bool> {
    (0..4).map(|row| provider.is_repeated_value(col_id, row)).collect()
}

#[test]
fn grouping_cascades_from_major_to_minor_columns() {
    let mut provider = AttributeGroupingProvider::new();
    provider.process_page(&region_city_rows(), 0, &slice_ids());

    assert_eq!(
        repetitions(&provider, "s_region"),
        vec![false, true, true, false]
    );
    assert_eq!(
        repetitions(&provider, "s_city"),
        vec![false, true, false, false]
    );
    let boundaries: Vec<bool> = (0..4).map(|row| provider.is_group_boundary(row)).collect();
    assert_eq!(boundaries, vec![true, false, true, true]);
    assert!(provider.is_column_with_grouping("s_region"));
    assert!(!provider.is_column_with_grouping("s_unknown"));
}

#[test]
fn processing_a_page_twice_is_idempotent() {
    let mut once = AttributeGroupingProvider::new();
    once.process_page(&region_city_rows(), 0, &slice_ids());
    let mut twice = AttributeGroupingProvider::new();
    twice.process_page(&region_city_rows(), 0, &slice_ids());
    twice.process_page(&region_city_rows(), 0, &slice_ids());

    for col_id in slice_ids() {
        assert_eq!(repetitions(&once, &col_id), repetitions(&twice, &col_id));
    }
    for row in 0..4 {
        assert_eq!(once.is_group_boundary(row), twice.is_group_boundary(row));
    }
}

#[test]
fn windows_are_addressed_by_absolute_row() {
    let rows = region_city_rows();
    let mut provider = AttributeGroupingProvider::new();
    provider.process_page(&rows[2..], 2, &slice_ids());
    provider.process_page(&rows[..2], 0, &slice_ids());

    assert_eq!(
        repetitions(&provider, "s_region"),
        vec![false, true, true, false]
    );
}

#[test]
fn rows_not_loaded_yet_never_repeat() {
    let rows = region_city_rows();
    let mut provider = AttributeGroupingProvider::new();
    provider.process_page(&rows[2..3], 2, &slice_ids());

    assert!(!provider.is_repeated_value("s_region", 2));
}

#[test]
fn reset_forgets_everything() {
    let mut provider = AttributeGroupingProvider::new();
    provider.process_page(&region_city_rows(), 0, &slice_ids());
    provider.reset();

    assert!(!provider.is_repeated_value("s_region", 1));
    assert!(!provider.is_group_boundary(0));
}

#[test]
fn disabled_provider_never_groups() {
    let mut provider = create_grouping_provider(false);
    provider.process_page(&region_city_rows(), 0, &slice_ids());

    assert!(!provider.is_repeated_value("s_region", 1));
    assert!(!provider.is_group_boundary(0));
    assert!(!provider.is_column_with_grouping("s_region"));
}

// ========================
// Paged data source
// ========================

async fn sales_source(
    backend: &InMemoryBackend,
    host: &Arc<MemoryGridHost>,
    page_size: usize,
) -> PagedDataSource {
    PagedDataSource::execute(
        Arc::new(backend.clone()),
        host.clone(),
        sales_definition(),
        page_size,
        true,
    )
    .await
    .expect("source")
}

fn city_desc() -> Vec<SortModelItem> {
    vec![SortModelItem::new("s_city", SortDirection::Desc)]
}

#[tokio::test]
async fn changed_sort_re_executes_before_serving() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 100).await;
    let ids_before = source.descriptor().all_leaf_col_ids();
    assert_eq!(backend.executions(), 1);

    let window = source
        .get_rows(RowWindowRequest::new(0, 100, city_desc()))
        .await
        .expect("window");

    assert_eq!(backend.executions(), 2);
    assert!(window.re_executed);
    assert_eq!(window.generation, 1);
    assert_eq!(window.rows[0].field("s_city"), Some("Seattle"));
    assert_eq!(source.descriptor().all_leaf_col_ids(), ids_before);
    assert_eq!(
        source.current_sorts(),
        vec![SortItem::AttributeSortItem {
            attribute_identifier: "city".to_string(),
            direction: SortDirection::Desc,
            aggregation: None,
        }]
    );
    assert_eq!(source.current_sort_model(), city_desc());
}

#[tokio::test]
async fn unchanged_sort_does_not_re_execute() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 2).await;
    let reads = backend.reads();

    source
        .get_rows(RowWindowRequest::new(0, 2, vec![]))
        .await
        .expect("first window");
    // the first window comes from the initial read
    assert_eq!(backend.reads(), reads);

    source
        .get_rows(RowWindowRequest::new(2, 4, vec![]))
        .await
        .expect("second window");
    assert_eq!(backend.reads(), reads + 1);

    source
        .get_rows(RowWindowRequest::new(0, 2, city_desc()))
        .await
        .expect("sorted window");
    source
        .get_rows(RowWindowRequest::new(2, 4, city_desc()))
        .await
        .expect("second sorted window");
    assert_eq!(backend.executions(), 2);
}

#[tokio::test]
async fn failed_window_keeps_loaded_rows() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 2).await;

    let first = source
        .get_rows(RowWindowRequest::new(0, 2, vec![]))
        .await
        .expect("first window");
    host.store_rows(first.start_row, first.rows.clone());

    backend.fail_reads_from_row(Some(2));
    let failed = source.get_rows(RowWindowRequest::new(2, 4, vec![])).await;

    assert!(matches!(
        failed,
        Err(FetchError::Backend(BackendError::Unavailable(_)))
    ));
    assert_eq!(host.displayed_row_count(), 2);
    assert_eq!(host.row_at(0), Some(first.rows[0].clone()));

    backend.fail_reads_from_row(None);
    let retried = source
        .get_rows(RowWindowRequest::new(2, 4, vec![]))
        .await
        .expect("retried window");
    assert_eq!(retried.rows.len(), 2);
}

#[tokio::test]
async fn window_past_the_end_fails() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 100).await;

    let result = source.get_rows(RowWindowRequest::new(10, 20, vec![])).await;

    assert!(matches!(
        result,
        Err(FetchError::OutOfRange {
            start_row: 10,
            row_count: 4
        })
    ));
}

#[tokio::test]
async fn failed_re_execution_keeps_current_result() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 100).await;

    backend.fail_next_executions(1);
    let failed = source
        .get_rows(RowWindowRequest::new(0, 100, city_desc()))
        .await;

    assert!(matches!(failed, Err(FetchError::Backend(_))));
    assert!(source.current_sorts().is_empty());
    assert_eq!(source.generation(), 1);
    source
        .get_rows(RowWindowRequest::new(0, 100, vec![]))
        .await
        .expect("unsorted window");

    source
        .get_rows(RowWindowRequest::new(0, 100, city_desc()))
        .await
        .expect("retry");
    assert_eq!(backend.executions(), 3);
    assert_eq!(source.generation(), 2);
}

#[tokio::test]
async fn older_sort_finishing_last_is_discarded() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 100).await;
    let city_asc = vec![SortModelItem::new("s_city", SortDirection::Asc)];

    backend.delay_next_execution(Duration::from_millis(200));
    let (older, newer) = tokio::join!(
        source.get_rows(RowWindowRequest::new(0, 100, city_desc())),
        source.get_rows(RowWindowRequest::new(0, 100, city_asc.clone())),
    );

    assert!(matches!(
        older,
        Err(FetchError::Superseded {
            generation: 1,
            current: 2
        })
    ));
    let newer = newer.expect("newer window");
    assert_eq!(newer.generation, 2);
    assert_eq!(newer.rows[0].field("s_city"), Some("Boston"));
    assert_eq!(source.current_sort_model(), city_asc);
}

#[tokio::test]
async fn newer_sort_wins_when_older_finishes_first() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 100).await;
    let city_asc = vec![SortModelItem::new("s_city", SortDirection::Asc)];

    backend.delay_next_execution(Duration::from_millis(50));
    backend.delay_next_execution(Duration::from_millis(200));
    let (older, newer) = tokio::join!(
        source.get_rows(RowWindowRequest::new(0, 100, city_desc())),
        source.get_rows(RowWindowRequest::new(0, 100, city_asc.clone())),
    );

    assert!(matches!(
        older,
        Err(FetchError::Superseded {
            generation: 1,
            current: 2
        })
    ));
    assert_eq!(
        newer.expect("newer window").rows[0].field("s_city"),
        Some("Boston")
    );
    assert_eq!(source.current_sort_model(), city_asc);
    assert_eq!(source.generation(), 2);
    assert_eq!(backend.executions(), 3);
}

#[tokio::test]
async fn overlapping_windows_share_one_re_execution() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 2).await;

    backend.delay_next_execution(Duration::from_millis(50));
    let (top, bottom) = tokio::join!(
        source.get_rows(RowWindowRequest::new(0, 2, city_desc())),
        source.get_rows(RowWindowRequest::new(2, 4, city_desc())),
    );

    let top = top.expect("top window");
    let bottom = bottom.expect("bottom window");
    assert_eq!(backend.executions(), 2);
    assert!(top.re_executed && bottom.re_executed);
    assert_eq!((top.generation, bottom.generation), (1, 1));
    assert_eq!(top.rows[0].field("s_city"), Some("Seattle"));
    assert_eq!(top.rows[1].field("s_city"), Some("Portland"));
    assert_eq!(bottom.rows[0].field("s_city"), Some("Cambridge"));
    assert_eq!(bottom.rows[1].field("s_city"), Some("Boston"));
    assert_eq!(source.current_sort_model(), city_desc());

    source
        .get_rows(RowWindowRequest::new(0, 2, city_desc()))
        .await
        .expect("scrolled back");
    assert_eq!(backend.executions(), 2);
}

#[tokio::test]
async fn returning_to_the_current_sort_abandons_the_re_execution() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 100).await;

    backend.delay_next_execution(Duration::from_millis(50));
    let (sorted, unsorted) = tokio::join!(
        source.get_rows(RowWindowRequest::new(0, 100, city_desc())),
        source.get_rows(RowWindowRequest::new(0, 100, vec![])),
    );

    assert!(matches!(sorted, Err(FetchError::Superseded { .. })));
    let unsorted = unsorted.expect("unsorted window");
    assert!(!unsorted.re_executed);
    assert_eq!(unsorted.rows[0].field("s_city"), Some("Boston"));
    assert!(source.current_sorts().is_empty());
}

#[tokio::test]
async fn desired_totals_re_execute_and_pin_rows() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 100).await;
    assert!(host.pinned_bottom_rows().is_empty());

    source.set_desired_totals(vec![total(TotalType::Sum, "revenue", "region")]);
    let window = source
        .get_rows(RowWindowRequest::new(0, 100, vec![]))
        .await
        .expect("window");

    assert!(window.re_executed);
    assert_eq!(backend.executions(), 2);
    assert_eq!(source.pinned_total_rows().len(), 1);
    assert_eq!(host.pinned_bottom_rows(), source.pinned_total_rows());
    assert_eq!(host.row_count(), Some(4));
}

#[tokio::test]
async fn grouping_follows_served_windows() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 100).await;

    source
        .get_rows(RowWindowRequest::new(0, 100, vec![]))
        .await
        .expect("window");

    assert!(source.is_repeated_value("s_region", 1));
    assert!(!source.is_repeated_value("s_region", 2));
    assert!(source.is_group_boundary(2));
    assert!(source.is_column_with_grouping("s_region"));
    assert!(!source.is_column_with_grouping("s_city"));
    assert!(host.refresh_count() > 0);

    // grouping is switched off while rows are sorted by another column
    source
        .get_rows(RowWindowRequest::new(0, 100, city_desc()))
        .await
        .expect("sorted window");
    assert!(!source.with_grouping_provider(|g| g.is_repeated_value("s_region", 1)));
}

#[tokio::test]
async fn listeners_see_every_served_window() {
    let backend = sales_backend();
    let host = Arc::new(MemoryGridHost::new(800.));
    let source = sales_source(&backend, &host, 2).await;
    let loaded = Arc::new(AtomicUsize::new(0));
    let counter = loaded.clone();
    source.on_page_loaded(move |window| {
        counter.fetch_add(window.rows.len(), Ordering::SeqCst);
    });

    source
        .get_rows(RowWindowRequest::new(0, 2, vec![]))
        .await
        .expect("first");
    source
        .get_rows(RowWindowRequest::new(2, 4, vec![]))
        .await
        .expect("second");

    assert_eq!(loaded.load(Ordering::SeqCst), 4);
}
