use chrono::NaiveDate;
use comfy_table::{presets::NOTHING, *};
use epirecon::cases::CaseSeriesSet;
use epirecon::frame;
use epirecon::indicators::IndicatorSelection;
use epirecon::measures::{MeasureTable, PolicyTables};
use epirecon::rates::ContagionComponents;
use epirecon::COL;
use itertools::izip;

fn new_table<'a>(header: impl IntoIterator<Item = &'a str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .into_iter()
                .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into())
}

pub fn display_case_summary(cases: &CaseSeriesSet) -> anyhow::Result<()> {
    let mut table = new_table(["Metric", "Countries", "First date", "Last date", "Days"]);
    for (metric, series) in &cases.0 {
        let range = series.date_range()?;
        table.add_row(vec![
            metric.clone(),
            series.countries().len().to_string(),
            format_date(range.map(|(first, _)| first)),
            format_date(range.map(|(_, last)| last)),
            series.frame.height().to_string(),
        ]);
    }
    println!("\n{}", table);
    Ok(())
}

fn add_policy_rows(table: &mut Table, kind: &str, tables: &[&MeasureTable]) -> anyhow::Result<()> {
    for measure in tables {
        let dates = frame::dates(&measure.frame)?;
        table.add_row(vec![
            kind.to_string(),
            measure.name.clone(),
            measure.countries.len().to_string(),
            format_date(dates.first().copied()),
            format_date(dates.last().copied()),
        ]);
    }
    Ok(())
}

pub fn display_policy_tables(policy: &PolicyTables) -> anyhow::Result<()> {
    let mut table = new_table(["Kind", "Name", "Countries", "First date", "Last date"]);
    add_policy_rows(&mut table, "measure", &policy.measures.values().collect::<Vec<_>>())?;
    add_policy_rows(&mut table, "index", &policy.indices.values().collect::<Vec<_>>())?;
    println!("\n{}", table);
    Ok(())
}

pub fn display_indicators(
    selection: &IndicatorSelection,
    year: &str,
    max_results: Option<usize>,
) -> anyhow::Result<()> {
    println!("Topics: {}", selection.topics.join(", "));
    println!(
        "{} indicators over {} countries",
        selection.indicators.len(),
        selection.countries.len()
    );
    let df_to_show = match max_results {
        Some(max) => selection.table.head(Some(max)),
        None => selection.table.clone(),
    };
    let mut table = new_table(["Country", "Indicator", year]);
    for (country, indicator, value) in izip!(
        df_to_show.column(COL::WDI_COUNTRY_NAME)?.str()?,
        df_to_show.column(COL::INDICATOR_NAME)?.str()?,
        df_to_show.column(year)?.f64()?,
    ) {
        table.add_row(vec![
            country.unwrap_or_default().to_string(),
            indicator.unwrap_or_default().to_string(),
            value.map(|v| v.to_string()).unwrap_or_default(),
        ]);
    }
    println!("\n{}", table);
    Ok(())
}

pub fn display_rates(
    country: &str,
    incidence: f64,
    contagion: Option<(NaiveDate, NaiveDate, ContagionComponents)>,
) {
    let mut table = new_table(["Country", "Rate", "Period", "Value per 100k"]);
    table.add_row(vec![
        country.to_string(),
        "incidence".into(),
        "latest".into(),
        format!("{incidence:.3}"),
    ]);
    if let Some((start, end, components)) = contagion {
        table.add_row(vec![
            country.to_string(),
            "contagion".into(),
            format!("{start} to {end}"),
            format!("{:.3}", components.rate()),
        ]);
    }
    println!("\n{}", table);
}
