use crate::config::{Config, Site};
use crate::csv_writer::OutputWriter;
use crate::error::PowerError;
use crate::normalize::{normalize, ParameterTable};
use crate::power_client::WeatherSource;
use crate::request::FetchRequest;
use std::fmt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Normalizing,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetching => write!(f, "fetching"),
            Stage::Normalizing => write!(f, "normalizing"),
            Stage::Writing => write!(f, "writing"),
        }
    }
}

#[derive(Debug)]
pub struct PairFailure {
    pub site_code: String,
    pub year: i32,
    pub stage: Stage,
    pub error: PowerError,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub rows_written: usize,
    pub failures: Vec<PairFailure>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn log(&self) {
        for f in &self.failures {
            warn!(site = %f.site_code, year = f.year, stage = %f.stage, kind = %f.error.kind(), error = %f.error, "Failed pair");
        }

        let (ok, total, failed) = (self.succeeded, self.attempted, self.failed());
        if failed == 0 {
            info!(rows = self.rows_written, "Run complete: {ok}/{total} successful");
        } else if ok == 0 {
            error!(rows = self.rows_written, "Run complete: {ok}/{total} successful, {failed} failed");
        } else {
            warn!(rows = self.rows_written, "Run complete: {ok}/{total} successful, {failed} failed");
        }
    }
}

/// Visits every (site, year) pair, sites in configuration order and years
/// ascending. A failing pair is recorded and skipped; it never ends the run.
pub fn run<S: WeatherSource>(config: &Config, source: &S, writer: &mut OutputWriter) -> RunSummary {
    let mut summary = RunSummary::default();

    info!(
        sites = config.sites.len(),
        years = config.years.len(),
        "Starting data collection"
    );

    let mut years = config.years.clone();
    years.sort_unstable();
    years.dedup();

    for site in &config.sites {
        info!(site = %site.code, "Processing site");

        for &year in &years {
            summary.attempted += 1;

            match process_pair(config, site, year, source, writer) {
                Ok(rows) => {
                    info!(site = %site.code, year, rows, "Successfully fetched data");
                    summary.succeeded += 1;
                    summary.rows_written += rows;
                }
                Err((stage, err)) => {
                    error!(site = %site.code, year, stage = %stage, error = %err, "Skipping pair");
                    summary.failures.push(PairFailure {
                        site_code: site.code.clone(),
                        year,
                        stage,
                        error: err,
                    });
                }
            }
        }
    }

    summary
}

fn process_pair<S: WeatherSource>(
    config: &Config,
    site: &Site,
    year: i32,
    source: &S,
    writer: &mut OutputWriter,
) -> Result<usize, (Stage, PowerError)> {
    let request = FetchRequest::new(site, year, &config.api.parameters, &config.api.community);

    let payload = source.fetch(&request).map_err(|e| (Stage::Fetching, e))?;

    let table = ParameterTable::from_payload(&payload).map_err(|e| (Stage::Normalizing, e))?;
    debug!(site = %site.code, year, fill_value = table.fill_value(), "Validated payload");
    for code in request.parameters {
        if !table.has_parameter(code) {
            debug!(site = %site.code, year, parameter = %code, "Parameter absent from response");
        }
    }
    let rows = normalize(site, year, &table).map_err(|e| (Stage::Normalizing, e))?;

    if rows.is_empty() {
        warn!(site = %site.code, year, "No data returned");
        return Ok(0);
    }

    writer
        .write_site(&site.code, &rows)
        .map_err(|e| (Stage::Writing, e))
}
