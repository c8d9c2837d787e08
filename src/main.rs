// Entry point and high-level CLI flow.
//
// The binary is a thin presentation layer over the library:
// - load every table once into a `DashboardContext`,
// - aggregate at the requested level (optionally narrowed to one parent),
// - print a table, a chart series or map labels, and export on request.
use clap::{Parser, ValueEnum};
use edh_barometer::aggregate::{filter_by_parent, parents, progress_bars};
use edh_barometer::config::BarometerConfig;
use edh_barometer::geojoin::{daily_series, metric_series, Metric};
use edh_barometer::hierarchy::check_rollup;
use edh_barometer::output;
use edh_barometer::types::ChartPoint;
use edh_barometer::util::format_int;
use edh_barometer::{DashboardContext, Granularity, Result};
use log::info;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum View {
    Table,
    Chart,
    Map,
}

#[derive(Parser, Debug)]
#[clap(name = "edh-barometer", about = "Household survey field progress indicators")]
struct CliArgs {
    /// JSON configuration file; defaults apply to every missing field.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the record, reference and boundary files.
    #[clap(long)]
    pub data_dir: Option<PathBuf>,

    /// national, region, province or circle.
    #[clap(long, default_value = "national")]
    pub level: String,

    #[clap(long, value_enum, default_value = "table")]
    pub view: View,

    /// Indicator for chart and map views.
    #[clap(long, default_value = "survey_count")]
    pub metric: String,

    /// Only show units under this region (province level) or province
    /// (circle level).
    #[clap(long)]
    pub parent: Option<String>,

    /// Maximum rows printed in the preview.
    #[clap(long, default_value_t = 25)]
    pub rows: usize,

    #[clap(long)]
    pub csv: Option<String>,

    #[clap(long)]
    pub json: Option<String>,

    /// Verify that every level rolls up into the level above it.
    #[clap(long)]
    pub check: bool,
}

fn load_config(args: &CliArgs) -> Result<BarometerConfig> {
    let mut config = match &args.config {
        Some(path) => BarometerConfig::from_file(path)?,
        None => BarometerConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn run_check(ctx: &DashboardContext) -> Result<bool> {
    let mut consistent = true;
    for child in [Granularity::Circle, Granularity::Province, Granularity::Region] {
        let Some(parent) = child.parent() else { continue };
        let children = ctx.aggregate(child.as_str())?;
        let parents = ctx.aggregate(parent.as_str())?;
        let mismatches = check_rollup(&children, &parents);
        if mismatches.is_empty() {
            println!("{} -> {}: consistent", child, parent);
            continue;
        }
        consistent = false;
        println!("{} -> {}: {} mismatches", child, parent, mismatches.len());
        for m in &mismatches {
            println!(
                "- {} {}: sum of {}s = {}, direct = {}",
                m.parent, m.field, child, m.children_sum, m.direct
            );
        }
    }
    Ok(consistent)
}

fn run(args: CliArgs) -> Result<()> {
    let config = load_config(&args)?;
    let (ctx, report) = DashboardContext::load(&config)?;
    println!(
        "Processing dataset... ({} rows read, {} submissions kept)",
        format_int(report.total_rows as u64),
        format_int(report.loaded_rows as u64)
    );
    if report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse/validation errors.",
            format_int(report.parse_errors as u64)
        );
    }
    println!();

    if args.check {
        if !run_check(&ctx)? {
            println!("\nCheck the mismatches above.");
        }
        return Ok(());
    }

    let level: Granularity = args.level.parse()?;
    let aggregation = ctx.aggregate(level.as_str())?;
    let rows = match &args.parent {
        Some(parent) => {
            let rows = filter_by_parent(&aggregation, parent);
            if rows.is_empty() {
                info!(
                    "no {} under '{}'; known parents: {}",
                    level,
                    parent,
                    parents(&aggregation).join(", ")
                );
            }
            rows
        }
        None => aggregation.rows.clone(),
    };
    let format = ctx.label_format();

    match (args.view, &aggregation.national) {
        (View::Table, Some(summary)) => {
            let table = output::key_figures(summary, format);
            println!("Key figures\n");
            output::preview_table_rows(&table, args.rows);
            if let Some(path) = &args.csv {
                output::write_csv(path, &table)?;
            }
            if let Some(path) = &args.json {
                output::write_json(path, summary)?;
            }
        }
        (View::Table, None) => {
            let table = output::indicator_table(rows.values(), format);
            println!("Indicators by {}\n", level);
            output::preview_table_rows(&table, args.rows);
            if let Some(path) = &args.csv {
                output::write_csv(path, &table)?;
            }
            if let Some(path) = &args.json {
                output::write_json(path, &rows)?;
            }
        }
        (View::Chart, Some(summary)) => {
            let daily = output::chart_points(&daily_series(&summary.daily, &args.metric)?);
            let bars: Vec<ChartPoint> = progress_bars(summary)
                .into_iter()
                .map(|b| ChartPoint {
                    unit: b.indicator,
                    value: b.achieved_pct,
                })
                .collect();
            println!("Progress against targets (%)\n");
            output::preview_table_rows(&bars, args.rows);

            let totals = output::totals_chart(summary);
            println!("Totals\n");
            output::preview_table_rows(&totals, args.rows);

            println!("Daily trend: {}\n", args.metric);
            output::preview_table_rows(&daily, args.rows);
            if let Some(path) = &args.csv {
                output::write_csv(path, &daily)?;
            }
            if let Some(path) = &args.json {
                output::write_json(path, &summary.daily)?;
            }
        }
        (View::Chart, None) => {
            let series = metric_series(&rows, &args.metric)?;
            let points = output::chart_points(&series);
            println!("{} by {}\n", args.metric, level);
            output::preview_table_rows(&points, args.rows);
            if let Some(path) = &args.csv {
                output::write_csv(path, &points)?;
            }
            if let Some(path) = &args.json {
                output::write_json(path, &points)?;
            }
        }
        (View::Map, _) => {
            let metric: Metric = args.metric.parse()?;
            let display =
                ctx.join_for_display(level, &rows, &args.metric, metric.is_percentage())?;
            let labels = output::map_labels(&display);
            println!("Map labels: {} by {}\n", metric.name(), level);
            output::preview_table_rows(&labels, args.rows);
            if let Some(path) = &args.csv {
                output::write_csv(path, &labels)?;
            }
            if let Some(path) = &args.json {
                output::write_json(path, &display)?;
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
