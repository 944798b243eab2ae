use crate::domain::model::{TimeSeries, TimeSeriesRow, ZonalStatistic};
use crate::domain::period::Granularity;
use crate::utils::error::{Result, SeriesError};

/// 將統計列輸出為 CSV：識別欄位、統計值、時間標籤
pub fn render_rows(
    id_attribute: &str,
    statistic: ZonalStatistic,
    granularity: Granularity,
    rows: &[TimeSeriesRow],
) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([id_attribute, statistic.column_name(), granularity.column_name()])?;

    for row in rows {
        let value = row.value.map(|v| v.to_string()).unwrap_or_default();
        let period = row.period.to_string();
        writer.write_record([row.region_id.as_str(), value.as_str(), period.as_str()])?;
    }

    writer
        .into_inner()
        .map_err(|e| SeriesError::IoError(e.into_error()))
}

pub fn render_series(series: &TimeSeries) -> Result<Vec<u8>> {
    render_rows(
        &series.id_attribute,
        series.statistic,
        series.granularity,
        &series.rows,
    )
}
