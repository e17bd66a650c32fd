#![deny(unused_crate_dependencies)]

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use eyre::{Result, WrapErr, anyhow};
use libpivotgrid::{
    backend::{InMemoryBackend, Record},
    config::PivotGridConfig,
    controller::{PivotTableController, ResizingSettings},
    data::{PagedDataSource, RowWindowRequest},
    host::MemoryGridHost,
    logs,
    resizing::ColumnAutoresizeOption,
    structure::SortModelItem,
    try_log_error,
};
use pivotgrid_types::{
    ColumnWidthItem, ExecutionDefinition, SortDirection, parse_column_width_items_lenient,
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON array of records, each with `attributes` and `measures` maps.
    records: Utf8PathBuf,
    /// JSON execution definition laying the attributes and measures out.
    definition: Utf8PathBuf,
    /// Previously exported column width items. Unknown or invalid items are skipped.
    #[clap(long, short)]
    widths: Option<Utf8PathBuf>,
    /// Where to write the exported column width items. The report is printed even if
    /// writing fails.
    #[clap(long)]
    save_widths: Option<Utf8PathBuf>,
    /// Config file used instead of the user and local config files.
    #[clap(long, short)]
    config: Option<Utf8PathBuf>,
    /// Width available to the columns.
    #[clap(long, default_value_t = 1000.)]
    client_width: f32,
    /// Overrides `column_autoresize` from the config: Unset, Viewport or AutoresizeAll.
    #[clap(long, value_parser = parse_autoresize)]
    autoresize: Option<ColumnAutoresizeOption>,
    /// Stretch columns to fill the client width.
    #[clap(long, action)]
    grow_to_fit: bool,
    /// Sorted column as `col_id` or `col_id:desc`. Repeat for secondary sorts.
    #[clap(long = "sort", value_parser = parse_sort)]
    sorts: Vec<SortModelItem>,
}

fn parse_sort(value: &str) -> Result<SortModelItem, String> {
    let (col_id, direction) = match value.rsplit_once(':') {
        Some((col_id, "asc")) => (col_id, SortDirection::Asc),
        Some((col_id, "desc")) => (col_id, SortDirection::Desc),
        Some((_, other)) => return Err(format!("unknown sort direction '{other}'")),
        None => (value, SortDirection::Asc),
    };
    Ok(SortModelItem::new(col_id, direction))
}

fn parse_autoresize(value: &str) -> Result<ColumnAutoresizeOption, String> {
    value
        .parse()
        .map_err(|_| format!("unknown autoresize option '{value}'"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ColumnReport {
    id: String,
    header: Option<String>,
    width: f32,
}

/// What the table looks like once every row is loaded and the columns are sized.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    row_count: usize,
    columns: Vec<ColumnReport>,
    column_widths: Vec<ColumnWidthItem>,
    /// Cell texts of the loaded rows keyed by column id.
    rows: Vec<BTreeMap<String, String>>,
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
    let content = std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("Failed to parse {path}"))
}

fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).wrap_err_with(|| format!("Failed to write {path}"))
}

fn load_config(args: &Args) -> Result<PivotGridConfig> {
    let mut config = match &args.config {
        Some(path) => PivotGridConfig::new_from_file(path.as_std_path())?,
        None => PivotGridConfig::new(false)?,
    };
    if let Some(option) = args.autoresize {
        config.column_autoresize = option;
    }
    config.grow_to_fit |= args.grow_to_fit;
    Ok(config)
}

async fn run(args: &Args) -> Result<Report> {
    let config = load_config(args)?;
    let records: Vec<Record> = read_json(&args.records)?;
    let definition: ExecutionDefinition = read_json(&args.definition)?;
    info!("Loaded {} records", records.len());

    let backend = Arc::new(InMemoryBackend::new(records));
    let host = Arc::new(MemoryGridHost::new(args.client_width));
    let source = Arc::new(
        PagedDataSource::execute(
            backend,
            host.clone(),
            definition,
            config.page_size,
            config.group_rows,
        )
        .await?,
    );

    let sort_model = if args.sorts.is_empty() {
        source.current_sort_model()
    } else {
        args.sorts.clone()
    };
    host.set_sorted_columns(sort_model.iter().map(|item| item.col_id.clone()));

    let page_size = config.page_size.max(1);
    let mut start_row = 0;
    loop {
        let request = RowWindowRequest::new(start_row, start_row + page_size, sort_model.clone());
        let window = source.get_rows(request).await?;
        host.store_rows(window.start_row, window.rows);
        start_row += page_size;
        if start_row >= window.row_count {
            break;
        }
    }

    let descriptor = source.descriptor();
    host.set_columns(descriptor.all_leaf_col_ids());

    let controller = PivotTableController::new(
        host.clone(),
        descriptor.clone(),
        ResizingSettings::from(&config),
    )
    .with_source(source.clone());

    if let Some(path) = &args.widths {
        let value: serde_json::Value = read_json(path)?;
        let items = parse_column_width_items_lenient(&value);
        info!("Applying {} column width items", items.len());
        controller.apply_column_sizes(&items);
    }
    if !controller.autoresize_columns(true).await {
        return Err(anyhow!("Column sizing was skipped"));
    }

    let columns = descriptor
        .all_leaf_col_ids()
        .into_iter()
        .map(|id| {
            Ok(ColumnReport {
                header: descriptor.header_name(&id),
                width: controller.effective_width(&id)?,
                id,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let row_count = source.row_count();
    let rows = (0..row_count)
        .filter_map(|index| host.row_at(index))
        .map(|row| row.fields)
        .collect();

    let column_widths = controller.column_width_items();
    if let Some(path) = &args.save_widths {
        try_log_error!(write_json(path, &column_widths), "Failed to save column widths");
    }

    Ok(Report {
        row_count,
        columns,
        column_widths,
        rows,
    })
}

fn main() -> Result<()> {
    simple_eyre::install()?;
    logs::start_logging()?;

    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(run(&args))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pivotgrid_types::{AttributeDef, ColumnWidth, MeasureDef};

    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let records = vec![
                Record::new()
                    .attr("region", "East")
                    .attr("year", "2023")
                    .measure("revenue", 1200.),
                Record::new()
                    .attr("region", "West")
                    .attr("year", "2023")
                    .measure("revenue", 80.),
                Record::new()
                    .attr("region", "West")
                    .attr("year", "2024")
                    .measure("revenue", 95.5),
            ];
            let definition = ExecutionDefinition::pivot(
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
            );
            fs::write(
                dir.path().join("records.json"),
                serde_json::to_string(&records).unwrap(),
            )
            .unwrap();
            fs::write(
                dir.path().join("definition.json"),
                serde_json::to_string(&definition).unwrap(),
            )
            .unwrap();
            fs::write(
                dir.path().join("config.toml"),
                "column_autoresize = \"autoresizeAll\"\npage_size = 1\n[autosize]\nresize_delay_ms = 0\n",
            )
            .unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }

        fn args(&self, extra: &[&str]) -> Args {
            let mut args = vec![
                "pivotgrid".to_string(),
                self.path("records.json"),
                self.path("definition.json"),
                "--config".to_string(),
                self.path("config.toml"),
            ];
            args.extend(extra.iter().map(|arg| (*arg).to_string()));
            Args::parse_from(args)
        }
    }

    fn width_of(report: &Report, id: &str) -> f32 {
        report
            .columns
            .iter()
            .find(|col| col.id == id)
            .map(|col| col.width)
            .unwrap()
    }

    #[tokio::test]
    async fn every_page_is_loaded_and_measured() {
        let fixture = Fixture::new();

        let report = run(&fixture.args(&[])).await.unwrap();

        assert_eq!(report.row_count, 2);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0]["s_region"], "East");
        let ids: Vec<_> = report.columns.iter().map(|col| col.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["s_region", "c_year=2023|m_revenue", "c_year=2024|m_revenue"]
        );
        assert_eq!(report.columns[0].header.as_deref(), Some("Region"));
        for col in &report.columns {
            assert!((60. ..=500.).contains(&col.width), "{col:?}");
        }
        assert!(report.column_widths.is_empty());
    }

    #[tokio::test]
    async fn exported_widths_are_applied() {
        let fixture = Fixture::new();
        let items = vec![
            ColumnWidthItem::Attribute {
                attribute_identifier: "region".to_string(),
                width: ColumnWidth::pixels(150.),
            },
            ColumnWidthItem::Attribute {
                attribute_identifier: "country".to_string(),
                width: ColumnWidth::pixels(90.),
            },
        ];
        fs::write(
            fixture.dir.path().join("widths.json"),
            serde_json::to_string(&items).unwrap(),
        )
        .unwrap();
        let widths = fixture.path("widths.json");

        let saved = fixture.path("saved.json");

        let report = run(&fixture.args(&["--widths", &widths, "--save-widths", &saved]))
            .await
            .unwrap();

        assert_eq!(width_of(&report, "s_region"), 150.);
        assert_eq!(report.column_widths, items[..1]);
        let saved: Vec<ColumnWidthItem> =
            serde_json::from_str(&fs::read_to_string(&saved).unwrap()).unwrap();
        assert_eq!(saved, items[..1]);
    }

    #[tokio::test]
    async fn failing_to_save_widths_keeps_the_report() {
        let fixture = Fixture::new();

        let report = run(&fixture.args(&["--save-widths", "/nonexistent/widths.json"])).await;

        assert_eq!(report.unwrap().row_count, 2);
    }

    #[tokio::test]
    async fn grow_to_fit_fills_the_client_width() {
        let fixture = Fixture::new();

        let report = run(&fixture.args(&["--grow-to-fit", "--client-width", "900"]))
            .await
            .unwrap();

        let total: f32 = report.columns.iter().map(|col| col.width).sum();
        assert_eq!(total, 900.);
    }

    #[tokio::test]
    async fn sorting_reorders_rows() {
        let fixture = Fixture::new();

        let report = run(&fixture.args(&["--sort", "s_region:desc"])).await.unwrap();

        let regions: Vec<_> = report.rows.iter().map(|row| row["s_region"].as_str()).collect();
        assert_eq!(regions, vec!["West", "East"]);
    }

    #[test]
    fn autoresize_arguments() {
        let fixture = Fixture::new();

        let args = fixture.args(&["--autoresize", "Viewport"]);

        assert_eq!(args.autoresize, Some(ColumnAutoresizeOption::Viewport));
        assert_eq!(
            load_config(&args).unwrap().column_autoresize,
            ColumnAutoresizeOption::Viewport
        );
    }

    #[test]
    fn sort_arguments() {
        assert_eq!(
            parse_sort("s_region"),
            Ok(SortModelItem::new("s_region", SortDirection::Asc))
        );
        assert_eq!(
            parse_sort("c_year=2023|m_revenue:desc"),
            Ok(SortModelItem::new("c_year=2023|m_revenue", SortDirection::Desc))
        );
        assert!(parse_sort("s_region:up").is_err());
    }

    #[test]
    fn missing_files_are_reported() {
        let fixture = Fixture::new();
        let mut args = fixture.args(&[]);
        args.records = Utf8PathBuf::from("/nonexistent/records.json");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        assert!(runtime.block_on(run(&args)).is_err());
    }
}
