use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use gscdw::date_util::parse_date;
use gscdw::metrics::format::{
    format_count, format_ctr_delta, format_percent_change, format_signed,
    format_signed_count,
};
use gscdw::metrics::{MetricAggregate, MetricChange};
use gscdw::{
    AnalysisReport, AnalysisRequest, ComparisonReport, Dimension, DimensionSeries, GroupBy,
    Metric, MultiPeriodReport, PeriodWindow, CONFIG_DEFAULT_GROUP_BY, CONFIG_DEFAULT_PERIOD,
};

const DEFAULT_PERIOD: &str = "30d";

#[derive(Parser)]
#[command(name = "gscdw", about = "Search Console period comparisons")]
struct Cli {
    /// Database path (default: ~/.gscdw/gscdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a Search Console JSON export
    Import {
        /// Row array or searchanalytics.query response
        file: PathBuf,
        /// Dimension the rows are keyed by: page or query
        #[arg(long, default_value = "page")]
        dimension: String,
    },
    /// Show the date windows a period resolves to
    Windows {
        /// 30d, 90d-yoy, 4x90d, yoy...
        #[arg(long)]
        period: Option<String>,
        /// Last day of the current window (default: yesterday)
        #[arg(long, value_name = "YYYY-MM-DD")]
        reference: Option<String>,
    },
    /// Compare metrics across periods
    Compare {
        #[arg(long)]
        period: Option<String>,
        /// none, url or query
        #[arg(long)]
        group_by: Option<String>,
        /// File with one URL per line to restrict the comparison to
        #[arg(long, value_name = "FILE")]
        urls: Option<PathBuf>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        reference: Option<String>,
        /// Show at most this many dimensions
        #[arg(long)]
        limit: Option<usize>,
        /// Metric that picks the top dimensions for multi-period output
        #[arg(long, default_value = "clicks")]
        metric: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show what is stored
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => gscdw::Database::open_at(path).await?,
        None => gscdw::Database::open().await?,
    };
    let dw = gscdw::GscDW::new(db);

    match cli.command {
        Commands::Import { file, dimension } => {
            let dimension = Dimension::parse(&dimension)?;
            let report = dw
                .import_file(&file, dimension)
                .await
                .with_context(|| format!("importing {}", file.display()))?;
            println!("Imported {} {} rows", report.rows_imported, report.dimension);
            if let (Some(first), Some(last)) = (report.first_date, report.last_date) {
                println!("  Dates: {first} to {last}");
            }
        }
        Commands::Windows { period, reference } => {
            let period = resolve_period(&dw, period).await?;
            let spec = dw.period_spec(&period, parse_reference(reference)?).await?;
            println!("{spec}");
            for (i, window) in spec.windows().iter().enumerate() {
                let role = spec.window_role(i);
                println!("  {role:<9} {window} ({} days)", window.days());
            }
        }
        Commands::Compare {
            period,
            group_by,
            urls,
            reference,
            limit,
            metric,
            json,
        } => {
            let period = resolve_period(&dw, period).await?;
            let spec = dw.period_spec(&period, parse_reference(reference)?).await?;
            let group_by = match group_by {
                Some(g) => GroupBy::parse(&g)?,
                None => match dw.config_get(CONFIG_DEFAULT_GROUP_BY).await? {
                    Some(g) => GroupBy::parse(&g)?,
                    None if urls.is_some() => GroupBy::Url,
                    None => GroupBy::None,
                },
            };

            let mut request = AnalysisRequest::new(spec, group_by);
            if let Some(path) = urls {
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let list = gscdw::parse_url_list(&text);
                if !list.rejected.is_empty() {
                    eprintln!("Skipped {} invalid line(s) in {}", list.rejected.len(), path.display());
                }
                if list.urls.is_empty() {
                    bail!("no valid URLs in {}", path.display());
                }
                request = request.with_dimension_filter(list.urls);
            }

            let metric = Metric::parse(&metric)?;
            let report = limit_report(dw.analyze(&request).await?, limit, metric);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                match &report {
                    AnalysisReport::Comparison(c) => print_comparison(c),
                    AnalysisReport::MultiPeriod(m) => print_multi_period(m),
                }
            }
        }
        Commands::Config { action } => {
            handle_config(&dw, action).await?;
        }
        Commands::Status => {
            print_status(&dw).await?;
        }
    }

    Ok(())
}

async fn resolve_period(dw: &gscdw::GscDW, period: Option<String>) -> anyhow::Result<String> {
    if let Some(p) = period {
        return Ok(p);
    }
    Ok(dw
        .config_get(CONFIG_DEFAULT_PERIOD)
        .await?
        .unwrap_or_else(|| DEFAULT_PERIOD.to_string()))
}

fn parse_reference(reference: Option<String>) -> anyhow::Result<Option<NaiveDate>> {
    Ok(reference.as_deref().map(parse_date).transpose()?)
}

fn limit_report(report: AnalysisReport, limit: Option<usize>, metric: Metric) -> AnalysisReport {
    let Some(n) = limit else {
        return report;
    };
    match report {
        AnalysisReport::Comparison(mut c) => {
            c.results.truncate(n);
            AnalysisReport::Comparison(c)
        }
        AnalysisReport::MultiPeriod(mut m) => {
            m.series = m.top_series(metric, n).into_iter().cloned().collect();
            AnalysisReport::MultiPeriod(m)
        }
    }
}

fn print_comparison(report: &ComparisonReport) {
    println!("Period {} ({:?})", report.period_key, report.mode);
    println!("  Current:  {}", report.current_window);
    println!("  Baseline: {}", report.baseline_window);
    println!();
    print_change(
        report.total.label(),
        &report.total.current,
        &report.total.baseline,
        &MetricChange {
            delta: report.total.delta,
            delta_pct: report.total.delta_pct,
        },
    );
    for result in &report.results {
        if result.dimension_key.is_none() {
            continue;
        }
        println!();
        print_change(
            result.label(),
            &result.current,
            &result.baseline,
            &MetricChange {
                delta: result.delta,
                delta_pct: result.delta_pct,
            },
        );
    }
}

fn print_change(
    label: &str,
    current: &MetricAggregate,
    baseline: &MetricAggregate,
    change: &MetricChange,
) {
    let cur = current.formatted();
    let base = baseline.formatted();
    let pct = &change.delta_pct;
    println!("{label}");
    println!(
        "  {:<12} {:>10} vs {:<10} {:>10} {:>8}",
        "Clicks",
        cur.clicks,
        base.clicks,
        format_signed_count(change.delta.clicks),
        format_percent_change(pct.clicks)
    );
    println!(
        "  {:<12} {:>10} vs {:<10} {:>10} {:>8}",
        "Impressions",
        cur.impressions,
        base.impressions,
        format_signed_count(change.delta.impressions),
        format_percent_change(pct.impressions)
    );
    println!(
        "  {:<12} {:>10} vs {:<10} {:>10} {:>8}",
        "CTR",
        cur.ctr,
        base.ctr,
        change.delta.ctr.map_or_else(|| "N/A".to_string(), format_ctr_delta),
        format_percent_change(pct.ctr)
    );
    println!(
        "  {:<12} {:>10} vs {:<10} {:>10} {:>8}",
        "Position",
        cur.position,
        base.position,
        change.delta.position.map_or_else(|| "N/A".to_string(), format_signed),
        format_percent_change(pct.position)
    );
}

fn print_multi_period(report: &MultiPeriodReport) {
    println!("Period {} ({} windows)", report.period_key, report.windows.len());
    print_series(&report.windows, &report.total);
    for series in report.series.iter().filter(|s| s.dimension_key.is_some()) {
        print_series(&report.windows, series);
    }
}

fn print_series(windows: &[PeriodWindow], series: &DimensionSeries) {
    println!();
    println!("{}", series.label());
    for (i, (window, agg)) in windows.iter().zip(&series.aggregates).enumerate() {
        let f = agg.formatted();
        // The oldest window has nothing to compare against
        let change = series
            .changes
            .get(i)
            .map(|c| format_percent_change(c.delta_pct.clicks))
            .unwrap_or_default();
        println!(
            "  {window}  {:>10} clicks {:>12} impr {:>7} ctr {:>6} pos {:>8}",
            f.clicks, f.impressions, f.ctr, f.position, change
        );
    }
}

async fn handle_config(dw: &gscdw::GscDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dw.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dw.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = dw.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(dw: &gscdw::GscDW) -> anyhow::Result<()> {
    let stats = dw.status().await?;
    let tz = dw.timezone().await?;
    let reference = dw.reference_date().await?;

    println!("Warehouse Status");
    println!("  Timezone:  {tz}");
    println!("  Reference: {reference}");
    for s in stats {
        let range = match (&s.first_date, &s.last_date) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => "no data".to_string(),
        };
        println!(
            "  {:<6} {} rows, {} keys ({range})",
            s.dimension.as_str(),
            format_count(s.rows),
            format_count(s.dimension_keys)
        );
    }
    Ok(())
}
