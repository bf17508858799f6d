//! Output configuration, row shaping and routing.
//!
//! A [`RowShape`] is the single place that decides which columns a row carries.
//! [`route`] picks the output representation for a run from its [`OutputConfig`].

use std::borrow::Cow;
use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use crate::filter::{CountryCode, CountryFilter};
use crate::record::{EnrichedRecord, UNKNOWN};

/// Optional column groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldGroups {
    pub country: bool,
    pub asn: bool,
}

impl FieldGroups {
    pub const ALL: FieldGroups = FieldGroups {
        country: true,
        asn: true,
    };
}

/// Everything a run needs to know about what to emit. Built once from the
/// command line, read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct OutputConfig {
    pub fields: FieldGroups,
    /// Write a CSV file even when no optional group is selected.
    pub csv: bool,
    pub split: bool,
    pub visualize: bool,
    pub countries: CountryFilter,
}

impl OutputConfig {
    /// True when output is CSV rather than one address per line.
    pub fn is_structured(&self) -> bool {
        self.csv || self.split || self.fields.country || self.fields.asn
    }

    /// True when the enricher has to produce ASN fields.
    pub fn needs_asn(&self) -> bool {
        self.fields.asn || self.visualize
    }
}

/// One output column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Ip,
    CountryCode,
    CountryName,
    City,
    Latitude,
    Longitude,
    Asn,
    AsnDescription,
}

impl Column {
    const COUNTRY: [Column; 5] = [
        Column::CountryCode,
        Column::CountryName,
        Column::City,
        Column::Latitude,
        Column::Longitude,
    ];
    const ASN: [Column; 2] = [Column::Asn, Column::AsnDescription];

    pub fn name(self) -> &'static str {
        match self {
            Column::Ip => "ip",
            Column::CountryCode => "country_code",
            Column::CountryName => "country_name",
            Column::City => "city",
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::Asn => "asn",
            Column::AsnDescription => "asn_description",
        }
    }

    /// Render this column of `record`, substituting sentinels for missing values.
    /// Missing coordinates render as an empty cell.
    pub fn render(self, record: &EnrichedRecord) -> Cow<'_, str> {
        let asn = record.asn.as_ref();
        match self {
            Column::Ip => Cow::Borrowed(&record.ip),
            Column::CountryCode => Cow::Borrowed(record.country_code_or_unknown()),
            Column::CountryName => Cow::Borrowed(record.country_name_or_unknown()),
            Column::City => Cow::Borrowed(record.city_or_unknown()),
            Column::Latitude => coordinate(record.latitude),
            Column::Longitude => coordinate(record.longitude),
            Column::Asn => asn.map_or(Cow::Borrowed(UNKNOWN), |a| {
                Cow::Owned(a.number_or_unknown())
            }),
            Column::AsnDescription => {
                Cow::Borrowed(asn.map_or(UNKNOWN, |a| a.organization_or_unknown()))
            }
        }
    }
}

fn coordinate(value: Option<f64>) -> Cow<'static, str> {
    value.map_or(Cow::Borrowed(""), |v| Cow::Owned(v.to_string()))
}

/// The ordered column list for a set of [`FieldGroups`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowShape {
    columns: Vec<Column>,
}

impl RowShape {
    /// `ip`, then the country group if selected, then the ASN group if selected.
    pub fn new(fields: FieldGroups) -> Self {
        let mut columns = vec![Column::Ip];
        if fields.country {
            columns.extend(Column::COUNTRY);
        }
        if fields.asn {
            columns.extend(Column::ASN);
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Flatten `record` into a row with exactly this shape.
    pub fn row<'r>(&self, record: &'r EnrichedRecord) -> Row<'r> {
        Row {
            cells: self
                .columns
                .iter()
                .map(|&column| (column, column.render(record)))
                .collect(),
        }
    }
}

/// A flattened record.
#[derive(Clone, Debug, PartialEq)]
pub struct Row<'r> {
    cells: Vec<(Column, Cow<'r, str>)>,
}

impl<'r> Row<'r> {
    pub fn field_names(&self) -> Vec<&'static str> {
        self.cells.iter().map(|(c, _)| c.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c.name() == name)
            .map(|(_, v)| v.as_ref())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, v)| v.as_ref())
    }
}

/// Rows sharing one header, destined for one output file.
#[derive(Clone, Debug, PartialEq)]
pub struct RowSet<'r> {
    pub header: Vec<&'static str>,
    pub rows: Vec<Row<'r>>,
}

impl<'r> RowSet<'r> {
    pub fn build<I>(shape: &RowShape, records: I) -> Self
    where
        I: IntoIterator<Item = &'r EnrichedRecord>,
    {
        Self {
            header: shape.header(),
            rows: records.into_iter().map(|r| shape.row(r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The rows for one country in split mode.
#[derive(Clone, Debug, PartialEq)]
pub struct CountryGroup<'r> {
    pub code: CountryCode,
    pub rows: RowSet<'r>,
}

/// What a run emits.
#[derive(Debug)]
pub enum Route<'r> {
    /// Hand every record to the map. No files are written.
    Visualize(&'r [EnrichedRecord]),
    /// One address per line.
    Plain(Vec<&'r str>),
    /// One CSV file.
    Single(RowSet<'r>),
    /// One CSV file per country code.
    Split(Vec<CountryGroup<'r>>),
}

/// Choose the output representation for `records` under `config`.
pub fn route<'r>(records: &'r [EnrichedRecord], config: &OutputConfig) -> Route<'r> {
    if config.visualize {
        return Route::Visualize(records);
    }
    if !config.is_structured() {
        return Route::Plain(records.iter().map(|r| r.ip.as_str()).collect());
    }

    let shape = RowShape::new(config.fields);
    if !config.split {
        return Route::Single(RowSet::build(&shape, records));
    }

    let mut groups: BTreeMap<&str, (CountryCode, Vec<&EnrichedRecord>)> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.country_code_or_unknown())
            .or_insert_with(|| (CountryCode::of(record), Vec::new()))
            .1
            .push(record);
    }

    Route::Split(
        groups
            .into_values()
            .map(|(code, members)| CountryGroup {
                rows: RowSet::build(&shape, members),
                code,
            })
            .collect(),
    )
}

/// `dir/out.csv` + `us` → `dir/out_us.csv`; `out` + `us` → `out_us`.
pub fn split_path(base: &Utf8Path, code: &CountryCode) -> Utf8PathBuf {
    let stem = base.file_stem().unwrap_or("output");
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{code}.{ext}"),
        None => format!("{stem}_{code}"),
    };
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AsnInfo;

    fn record(ip: &str, code: Option<&str>) -> EnrichedRecord {
        let mut r = EnrichedRecord::unresolved(ip);
        r.country_code = code.map(str::to_string);
        r
    }

    fn full_record() -> EnrichedRecord {
        EnrichedRecord {
            ip: "93.184.216.34".to_string(),
            country_code: Some("us".to_string()),
            country_name: Some("United States".to_string()),
            city: Some("Norwell".to_string()),
            latitude: Some(42.1508),
            longitude: Some(-70.8228),
            asn: Some(AsnInfo {
                number: Some(15133),
                organization: Some("EDGECAST".to_string()),
            }),
        }
    }

    #[test]
    fn ip_only_shape() {
        let shape = RowShape::new(FieldGroups::default());
        assert_eq!(shape.header(), vec!["ip"]);
    }

    #[test]
    fn full_shape_column_order() {
        let shape = RowShape::new(FieldGroups::ALL);
        assert_eq!(
            shape.header(),
            vec![
                "ip",
                "country_code",
                "country_name",
                "city",
                "latitude",
                "longitude",
                "asn",
                "asn_description"
            ]
        );
        let record = full_record();
        let row = shape.row(&record);
        assert_eq!(
            row.values().collect::<Vec<_>>(),
            vec![
                "93.184.216.34",
                "us",
                "United States",
                "Norwell",
                "42.1508",
                "-70.8228",
                "15133",
                "EDGECAST"
            ]
        );
    }

    #[test]
    fn asn_without_country() {
        let shape = RowShape::new(FieldGroups {
            country: false,
            asn: true,
        });
        let record = full_record();
        let row = shape.row(&record);
        assert_eq!(row.field_names(), vec!["ip", "asn", "asn_description"]);
        assert_eq!(row.get("city"), None);
    }

    #[test]
    fn unresolved_record_renders_sentinels() {
        let shape = RowShape::new(FieldGroups::ALL);
        let record = EnrichedRecord::unresolved("198.51.100.7");
        let row = shape.row(&record);
        assert_eq!(row.get("country_code"), Some("unknown"));
        assert_eq!(row.get("country_name"), Some("Unknown"));
        assert_eq!(row.get("city"), Some("Unknown"));
        assert_eq!(row.get("latitude"), Some(""));
        assert_eq!(row.get("asn"), Some("Unknown"));
        assert_eq!(row.get("asn_description"), Some("Unknown"));
    }

    #[test]
    fn half_location_renders_the_known_coordinate() {
        let shape = RowShape::new(FieldGroups::ALL);
        let mut record = EnrichedRecord::unresolved("198.51.100.7");
        record.latitude = Some(51.5);
        let row = shape.row(&record);
        assert_eq!(row.get("latitude"), Some("51.5"));
        assert_eq!(row.get("longitude"), Some(""));
    }

    #[test]
    fn plain_route_when_nothing_structured() {
        let records = vec![record("1.1.1.1", Some("au")), record("8.8.8.8", Some("us"))];
        match route(&records, &OutputConfig::default()) {
            Route::Plain(ips) => assert_eq!(ips, vec!["1.1.1.1", "8.8.8.8"]),
            other => panic!("expected plain route, got {other:?}"),
        }
    }

    #[test]
    fn visualize_takes_precedence() {
        let records = vec![record("1.1.1.1", Some("au"))];
        let config = OutputConfig {
            visualize: true,
            split: true,
            ..OutputConfig::default()
        };
        assert!(matches!(route(&records, &config), Route::Visualize(r) if r.len() == 1));
    }

    #[test]
    fn split_partitions_by_country() {
        let records = vec![
            record("1.0.0.1", Some("hk")),
            record("1.0.0.2", Some("sg")),
            record("1.0.0.3", Some("hk")),
            record("1.0.0.4", None),
        ];
        let config = OutputConfig {
            split: true,
            fields: FieldGroups {
                country: true,
                asn: false,
            },
            ..OutputConfig::default()
        };

        let Route::Split(groups) = route(&records, &config) else {
            panic!("expected split route");
        };
        let codes: Vec<String> = groups.iter().map(|g| g.code.to_string()).collect();
        assert_eq!(codes, vec!["hk", "sg", "unknown"]);

        let total: usize = groups.iter().map(|g| g.rows.len()).sum();
        assert_eq!(total, records.len());

        for group in &groups {
            assert_eq!(group.rows.header.len(), 6);
            for row in &group.rows.rows {
                assert_eq!(row.get("country_code"), Some(group.code.as_str()));
            }
        }
    }

    #[test]
    fn split_path_inserts_code_before_extension() {
        let code = CountryCode::Known("us".to_string());
        assert_eq!(
            split_path(Utf8Path::new("out/results.csv"), &code),
            Utf8PathBuf::from("out/results_us.csv")
        );
        assert_eq!(
            split_path(Utf8Path::new("results"), &CountryCode::Unresolved),
            Utf8PathBuf::from("results_unknown")
        );
    }
}
