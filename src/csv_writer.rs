use crate::error::Result;
use crate::normalize::WeatherRow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Owns the per-site and combined CSV handles for one run.
///
/// Files are opened in append mode on first use and stay open until the
/// writer is dropped. A header is written only into empty files.
pub struct OutputWriter {
    dir: PathBuf,
    start_year: i32,
    end_year: i32,
    files: HashMap<PathBuf, csv::Writer<File>>,
}

impl OutputWriter {
    pub fn new(dir: &Path, (start_year, end_year): (i32, i32)) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            start_year,
            end_year,
            files: HashMap::new(),
        })
    }

    pub fn site_path(&self, site_code: &str) -> PathBuf {
        self.dir.join(format!(
            "{site_code}_daily_weather_{}-{}.csv",
            self.start_year, self.end_year
        ))
    }

    pub fn combined_path(&self) -> PathBuf {
        self.dir.join(format!(
            "all_sites_daily_weather_{}-{}.csv",
            self.start_year, self.end_year
        ))
    }

    /// Appends `rows` to the site's file and to the combined file.
    ///
    /// Both files are opened before either receives rows, so a file that
    /// cannot be opened leaves the other one untouched.
    pub fn write_site(&mut self, site_code: &str, rows: &[WeatherRow]) -> Result<usize> {
        let site_path = self.site_path(site_code);
        let combined_path = self.combined_path();
        self.ensure_open(&site_path)?;
        self.ensure_open(&combined_path)?;

        self.append(&site_path, rows)?;
        info!(site = site_code, rows = rows.len(), path = %site_path.display(), "Appended site CSV");

        self.append(&combined_path, rows)?;
        debug!(rows = rows.len(), path = %combined_path.display(), "Appended combined CSV");

        Ok(rows.len())
    }

    pub fn finish(mut self) -> Result<()> {
        for wtr in self.files.values_mut() {
            wtr.flush()?;
        }
        Ok(())
    }

    fn ensure_open(&mut self, path: &Path) -> Result<()> {
        if let Entry::Vacant(e) = self.files.entry(path.to_path_buf()) {
            e.insert(open_append(path)?);
        }
        Ok(())
    }

    fn append(&mut self, path: &Path, rows: &[WeatherRow]) -> Result<()> {
        let wtr = match self.files.entry(path.to_path_buf()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(open_append(path)?),
        };

        let result = write_rows(wtr, rows);
        if result.is_err() {
            // Reopen on next use rather than reuse a writer in an unknown state.
            self.files.remove(path);
        }
        result
    }
}

fn write_rows(wtr: &mut csv::Writer<File>, rows: &[WeatherRow]) -> Result<()> {
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn open_append(path: &Path) -> Result<csv::Writer<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let needs_header = file.metadata()?.len() == 0;
    Ok(csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, ParameterTable};
    use crate::test_support::{det_site, year_payload};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_rows() -> Vec<WeatherRow> {
        let mut payload = year_payload(2021);
        payload["properties"]["parameter"]["PRECTOTCORR"]["20210102"] = serde_json::json!(-999.0);
        let table = ParameterTable::from_payload(&payload).unwrap();
        let rows = normalize(&det_site(), 2021, &table).unwrap();
        rows.into_iter().take(3).collect()
    }

    fn read_rows(path: &Path) -> Vec<WeatherRow> {
        csv::Reader::from_path(path)
            .unwrap()
            .deserialize()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    fn header_count(path: &Path) -> usize {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| l.starts_with("site_code,"))
            .count()
    }

    #[test]
    fn file_names_use_the_year_span() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path(), (2018, 2022)).unwrap();
        assert_eq!(
            writer.site_path("DET"),
            dir.path().join("DET_daily_weather_2018-2022.csv")
        );
        assert_eq!(
            writer.combined_path(),
            dir.path().join("all_sites_daily_weather_2018-2022.csv")
        );
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        OutputWriter::new(&nested, (2020, 2020)).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn header_is_written_once_across_batches() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::new(dir.path(), (2021, 2021)).unwrap();
        let rows = sample_rows();

        writer.write_site("DET", &rows[..1]).unwrap();
        writer.write_site("DET", &rows[1..]).unwrap();
        let site_path = writer.site_path("DET");
        writer.finish().unwrap();

        assert_eq!(header_count(&site_path), 1);
        assert_eq!(read_rows(&site_path).len(), 3);
    }

    #[test]
    fn header_row_lists_all_columns() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::new(dir.path(), (2021, 2021)).unwrap();
        writer.write_site("DET", &sample_rows()).unwrap();
        let path = writer.site_path("DET");
        writer.finish().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();
        assert_eq!(header.len(), 22);
        assert_eq!(&header[..8], ["site_code", "points", "latitude", "longitude", "date", "year", "month", "day"]);
        assert_eq!(header[8], "air_temp_c");
        assert_eq!(header[21], "precipitation_max_mm");
    }

    #[test]
    fn rows_round_trip_through_csv() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::new(dir.path(), (2021, 2021)).unwrap();
        let rows = sample_rows();
        writer.write_site("DET", &rows).unwrap();
        let path = writer.site_path("DET");
        writer.finish().unwrap();

        let parsed = read_rows(&path);
        assert_eq!(parsed.len(), rows.len());
        for (a, b) in rows.iter().zip(&parsed) {
            assert_eq!(a.site_code, b.site_code);
            assert_eq!(a.date, b.date);
            assert!((a.latitude - b.latitude).abs() < 1e-9);
            for (x, y) in [
                (a.air_temp_c, b.air_temp_c),
                (a.wind_speed_max_ms, b.wind_speed_max_ms),
                (a.precipitation_mm, b.precipitation_mm),
                (a.dewpoint_temp_max_c, b.dewpoint_temp_max_c),
            ] {
                match (x, y) {
                    (Some(x), Some(y)) => assert!((x - y).abs() < 1e-9),
                    (None, None) => {}
                    other => panic!("null mismatch: {other:?}"),
                }
            }
        }
        assert_eq!(parsed[1].date, NaiveDate::from_ymd_opt(2021, 1, 2).unwrap());
        assert_eq!(parsed[1].precipitation_mm, None);
        assert!(parsed[0].precipitation_mm.is_some());
    }

    #[test]
    fn reopening_appends_without_a_second_header() {
        let dir = TempDir::new().unwrap();
        let rows = sample_rows();

        for _ in 0..2 {
            let mut writer = OutputWriter::new(dir.path(), (2021, 2021)).unwrap();
            writer.write_site("DET", &rows).unwrap();
            writer.finish().unwrap();
        }

        let writer = OutputWriter::new(dir.path(), (2021, 2021)).unwrap();
        for path in [writer.site_path("DET"), writer.combined_path()] {
            assert_eq!(header_count(&path), 1);
            assert_eq!(read_rows(&path).len(), rows.len() * 2);
        }
    }

    #[test]
    fn unopenable_combined_file_leaves_site_file_empty() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::new(dir.path(), (2021, 2021)).unwrap();
        fs::create_dir_all(writer.combined_path()).unwrap();

        let err = writer.write_site("DET", &sample_rows()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);

        let site_path = writer.site_path("DET");
        writer.finish().unwrap();
        let text = fs::read_to_string(&site_path).unwrap_or_default();
        assert!(text.is_empty(), "site file received rows: {text}");
    }

    #[test]
    fn combined_file_collects_every_site() {
        let dir = TempDir::new().unwrap();
        let mut writer = OutputWriter::new(dir.path(), (2021, 2021)).unwrap();
        let rows = sample_rows();
        let mut other = rows.clone();
        for row in &mut other {
            row.site_code = "HJA".to_string();
        }

        writer.write_site("DET", &rows).unwrap();
        writer.write_site("HJA", &other).unwrap();
        let combined = writer.combined_path();
        writer.finish().unwrap();

        let parsed = read_rows(&combined);
        assert_eq!(parsed.len(), 6);
        assert_eq!(parsed.iter().filter(|r| r.site_code == "HJA").count(), 3);
        assert_eq!(header_count(&combined), 1);
    }
}
