use crate::config::Site;

/// Parameters requested when the configuration does not override them.
/// POWER only publishes daily maxima for some variables; the others leave
/// their `_max` output columns empty.
pub const DEFAULT_PARAMETERS: &[&str] = &[
    "T2M",
    "T2M_MAX",
    "T2MDEW",
    "ALLSKY_SFC_SW_DWN",
    "WS2M",
    "WS2M_MAX",
    "WD2M",
    "CLOUD_AMT_DAY",
    "PRECTOTCORR",
];

/// One API call: a site, a calendar year and the parameter list.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub site: &'a Site,
    pub year: i32,
    pub parameters: &'a [String],
    pub community: &'a str,
}

impl<'a> FetchRequest<'a> {
    pub fn new(site: &'a Site, year: i32, parameters: &'a [String], community: &'a str) -> Self {
        Self {
            site,
            year,
            parameters,
            community,
        }
    }

    pub fn start_date(&self) -> String {
        format!("{:04}0101", self.year)
    }

    pub fn end_date(&self) -> String {
        format!("{:04}1231", self.year)
    }

    /// Query pairs for the daily point endpoint. POWER addresses points by
    /// coordinates only, so the point identifier is not sent.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("parameters", self.parameters.join(",")),
            ("community", self.community.to_string()),
            ("longitude", self.site.longitude.to_string()),
            ("latitude", self.site.latitude.to_string()),
            ("start", self.start_date()),
            ("end", self.end_date()),
            ("format", "json".to_string()),
        ]
    }
}
