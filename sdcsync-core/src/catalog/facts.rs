//! Normalized facts read from a catalog record.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::CatalogRecord;
use crate::claims::property;
use crate::tables::LookupTables;

/// Operator of the catalog service.
pub const CATALOG_OPERATOR: &str = "Q420747";

/// Operator of the national gallery's collection services.
pub const GALLERY_OPERATOR: &str = "Q2983474";

/// Public domain mark.
pub const LICENSE_PDM: &str = "PDM";

/// Licenses that are written to the claim store, with their item codes.
pub const SUPPORTED_LICENSES: &[(&str, &str)] = &[
    ("CC0", "Q6938433"),
    ("CC BY 4.0", "Q20007257"),
    ("CC BY-SA 4.0", "Q18199165"),
    (LICENSE_PDM, "Q98592850"),
];

/// Copyrighted, but the holder has waived the rights.
pub const STATUS_RIGHTS_WAIVED: &str = "Q88088423";
/// No known copyright restrictions.
pub const STATUS_NO_KNOWN_RESTRICTIONS: &str = "Q99263261";
pub const STATUS_COPYRIGHTED: &str = "Q50423863";

/// Keywords that introduce a date in subject strings.
const INCEPTION_KEYWORDS: &[&str] = &["kuvausaika", "ajankohta:", "valmistusaika "];

pub fn license_code(license: &str) -> Option<&'static str> {
    SUPPORTED_LICENSES
        .iter()
        .find(|(name, _)| *name == license)
        .map(|(_, code)| *code)
}

/// Copyright status implied by a license. Only the waived-rights result is
/// ever written; see the claim rules.
pub fn derive_copyright_status(license: &str) -> &'static str {
    match license {
        LICENSE_PDM => STATUS_RIGHTS_WAIVED,
        "CC0" => STATUS_NO_KNOWN_RESTRICTIONS,
        _ => STATUS_COPYRIGHTED,
    }
}

/// Operator by the domain of a source URL.
pub fn operator_for_domain(url: &str) -> Option<&'static str> {
    if url.contains("finna.fi") {
        Some(CATALOG_OPERATOR)
    } else if url.contains("fng.fi") || url.contains("kansallisgalleria.fi") {
        Some(GALLERY_OPERATOR)
    } else {
        None
    }
}

/// Date with year, year-month or full-day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialDate {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    pub fn year_month(year: i32, month: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: None,
        }
    }

    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    /// Wikibase time precision: 9 year, 10 month, 11 day.
    pub fn precision(&self) -> u8 {
        match (self.month, self.day) {
            (Some(_), Some(_)) => 11,
            (Some(_), None) => 10,
            _ => 9,
        }
    }

    /// Wikibase time string; unknown parts are zero.
    pub fn to_wikibase_time(&self) -> String {
        format!(
            "+{:04}-{:02}-{:02}T00:00:00Z",
            self.year,
            self.month.unwrap_or(0),
            self.day.unwrap_or(0)
        )
    }
}

impl From<NaiveDate> for PartialDate {
    fn from(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self::ymd(date.year(), date.month(), date.day())
    }
}

/// Parse a catalog time string.
///
/// Accepted: `d.m.yyyy` (one- or two-digit day and month), `yyyy-mm-dd`,
/// six digits as `yyyymm` or `mmyyyy`, and a four-digit year. Trailing
/// comma-separated text and a trailing dot are ignored.
pub fn parse_time_string(value: &str) -> Option<PartialDate> {
    let mut value = value;
    if let Some(index) = value.rfind(',').filter(|i| *i > 0) {
        value = &value[..index];
    }
    if let Some(index) = value.find(',').filter(|i| *i > 0) {
        value = &value[..index];
    }
    let value = value.strip_suffix('.').unwrap_or(value);

    let len = value.chars().count();
    let has_sep = |sep: char| value.find(sep).is_some_and(|i| i > 0);

    if len == 10 && has_sep('.') {
        return NaiveDate::parse_from_str(value, "%d.%m.%Y").ok().map(Into::into);
    }
    if len == 10 && has_sep('-') {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().map(Into::into);
    }
    if (len == 8 || len == 9) && has_sep('.') {
        return NaiveDate::parse_from_str(value, "%d.%m.%Y").ok().map(Into::into);
    }

    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        if len == 6 {
            let plausible = |year: i32, month: u32| (1..=12).contains(&month) && year > 1300 && year < 2050;

            let (year_a, month_a) = (value[..4].parse().ok()?, value[4..].parse().ok()?);
            if plausible(year_a, month_a) {
                return Some(PartialDate::year_month(year_a, month_a));
            }
            let (month_b, year_b) = (value[..2].parse().ok()?, value[2..].parse().ok()?);
            if plausible(year_b, month_b) {
                return Some(PartialDate::year_month(year_b, month_b));
            }
        }
        if len == 4 {
            return value.parse().ok().map(PartialDate::year);
        }
    }

    debug!(value, "Cannot use time string");
    None
}

/// Inception date of the photograph.
///
/// Subject strings are searched for a date keyword first; a keyword match is
/// final even when its date does not parse. A subject that is itself a time
/// string is used next, and the numeric `year` field last.
pub fn inception_from_record(record: &CatalogRecord) -> Option<PartialDate> {
    for subject in record.subjects.iter().flatten().flatten() {
        for keyword in INCEPTION_KEYWORDS {
            let Some(index) = subject.find(keyword) else {
                continue;
            };
            let text = subject[index + keyword.len()..].replace(['\n', '\t'], " ");
            let text = text.trim();
            let text = match text.find(',') {
                Some(comma) if comma > 0 => &text[..comma],
                _ => text,
            };
            let token = text.split_whitespace().last().unwrap_or_default();
            debug!(keyword, token, "Date keyword in subjects");
            return parse_time_string(token);
        }

        if let Some(date) = parse_time_string(subject) {
            return Some(date);
        }
    }

    inception_year(record)
}

fn inception_year(record: &CatalogRecord) -> Option<PartialDate> {
    let year = match record.year.as_ref()? {
        Value::String(year) => year.trim().parse().ok(),
        Value::Number(year) => year.as_i64().and_then(|y| i32::try_from(y).ok()),
        _ => None,
    };
    if year.is_none() {
        debug!(year = ?record.year, "Not a numeric year");
    }
    year.map(PartialDate::year)
}

/// Institution code for the first listed institution (or building).
pub fn publisher_code(record: &CatalogRecord, tables: &LookupTables) -> Option<String> {
    let institution = record
        .institutions
        .as_ref()
        .and_then(|list| list.first())
        .or_else(|| record.buildings.as_ref().and_then(|list| list.first()))?;

    institution
        .values()
        .filter_map(Value::as_str)
        .find_map(|name| tables.institution(name))
        .map(str::to_string)
}

/// Item codes for the record's collections that the table knows, in listed
/// order without duplicates.
pub fn collection_codes(record: &CatalogRecord, tables: &LookupTables) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for label in record.collections.iter().flatten().filter_map(Value::as_str) {
        match tables.collection(label) {
            Some(code) if !codes.iter().any(|c| c == code) => codes.push(code.to_string()),
            Some(_) => {}
            None => debug!(label, "Collection not in lookup table"),
        }
    }
    codes
}

/// One normalized fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fact", content = "value", rename_all = "snake_case")]
pub enum CatalogFact {
    /// Catalog license name, e.g. `CC BY 4.0`.
    License(String),
    CopyrightStatus(String),
    Collection(String),
    Publisher(String),
    Operator(String),
    Inception(PartialDate),
}

impl CatalogFact {
    /// Structured-data property the fact is written to.
    pub fn property(&self) -> &'static str {
        match self {
            Self::License(_) => property::LICENSE,
            Self::CopyrightStatus(_) => property::COPYRIGHT_STATUS,
            Self::Collection(_) => property::COLLECTION,
            Self::Publisher(_) => property::PUBLISHER,
            Self::Operator(_) => property::OPERATOR,
            Self::Inception(_) => property::INCEPTION,
        }
    }
}

/// All facts of one record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CatalogFacts {
    pub license: Option<String>,
    pub copyright_status: Option<String>,
    pub publisher: Option<String>,
    pub operator: Option<String>,
    pub collections: Vec<String>,
    pub inception: Option<PartialDate>,
}

impl CatalogFacts {
    pub fn from_record(record: &CatalogRecord, tables: &LookupTables) -> Self {
        let license = record
            .primary_image()
            .and_then(|image| image.rights.copyright.clone());
        let copyright_status = license
            .as_deref()
            .map(|license| derive_copyright_status(license).to_string());

        Self {
            copyright_status,
            license,
            publisher: publisher_code(record, tables),
            operator: Some(CATALOG_OPERATOR.to_string()),
            collections: collection_codes(record, tables),
            inception: inception_from_record(record),
        }
    }

    /// Take the operator from the domain of the URL the source-of-file
    /// claim describes. Unknown domains keep the catalog operator.
    pub fn with_operator_for(mut self, described_url: &str) -> Self {
        if let Some(operator) = operator_for_domain(described_url) {
            self.operator = Some(operator.to_string());
        }
        self
    }

    pub fn facts(&self) -> Vec<CatalogFact> {
        let mut facts = Vec::new();
        facts.extend(self.license.clone().map(CatalogFact::License));
        facts.extend(self.copyright_status.clone().map(CatalogFact::CopyrightStatus));
        facts.extend(self.publisher.clone().map(CatalogFact::Publisher));
        facts.extend(self.operator.clone().map(CatalogFact::Operator));
        facts.extend(self.collections.iter().cloned().map(CatalogFact::Collection));
        facts.extend(self.inception.map(CatalogFact::Inception));
        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> CatalogRecord {
        serde_json::from_value(value).unwrap()
    }

    fn tables() -> LookupTables {
        LookupTables::from_json(
            r#"{"institutions": {"Museovirasto": "Q3029524"},
                "collections": {"Historian kuvakokoelma": "Q107388072",
                                "Studio Kuvasiskojen kokoelma": "Q118976025"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_license_allow_list() {
        assert_eq!(license_code("CC BY 4.0"), Some("Q20007257"));
        assert_eq!(license_code("PDM"), Some("Q98592850"));
        assert_eq!(license_code("CC0"), Some("Q6938433"));
        assert_eq!(license_code("CC BY-SA 4.0"), Some("Q18199165"));
        assert_eq!(license_code("CC BY-NC 4.0"), None);
        assert_eq!(license_code("InC"), None);
    }

    #[test]
    fn test_copyright_status_derivation() {
        assert_eq!(derive_copyright_status("PDM"), STATUS_RIGHTS_WAIVED);
        assert_eq!(derive_copyright_status("CC0"), STATUS_NO_KNOWN_RESTRICTIONS);
        assert_eq!(derive_copyright_status("CC BY 4.0"), STATUS_COPYRIGHTED);
    }

    #[test]
    fn test_operator_for_domain() {
        assert_eq!(operator_for_domain("https://www.finna.fi/Record/x"), Some("Q420747"));
        assert_eq!(operator_for_domain("http://kokoelmat.fng.fi/app?si=1"), Some("Q2983474"));
        assert_eq!(operator_for_domain("https://www.kansallisgalleria.fi/fi/object/1"), Some("Q2983474"));
        assert_eq!(operator_for_domain("https://flickr.com/x"), None);
    }

    #[test]
    fn test_time_string_formats() {
        assert_eq!(parse_time_string("08.01.2016"), Some(PartialDate::ymd(2016, 1, 8)));
        assert_eq!(parse_time_string("8.1.2016"), Some(PartialDate::ymd(2016, 1, 8)));
        assert_eq!(parse_time_string("18.1.2016"), Some(PartialDate::ymd(2016, 1, 18)));
        assert_eq!(parse_time_string("1930-05-17"), Some(PartialDate::ymd(1930, 5, 17)));
        assert_eq!(parse_time_string("189605"), Some(PartialDate::year_month(1896, 5)));
        assert_eq!(parse_time_string("051896"), Some(PartialDate::year_month(1896, 5)));
        assert_eq!(parse_time_string("1930"), Some(PartialDate::year(1930)));
        assert_eq!(parse_time_string("1930."), Some(PartialDate::year(1930)));
        assert_eq!(parse_time_string("1930, Helsinki"), Some(PartialDate::year(1930)));
    }

    #[test]
    fn test_time_string_rejects() {
        assert_eq!(parse_time_string(""), None);
        assert_eq!(parse_time_string("1930-1939"), None);
        assert_eq!(parse_time_string("31.02.1930"), None);
        assert_eq!(parse_time_string("999999"), None);
        assert_eq!(parse_time_string("noin 1930"), None);
    }

    #[test]
    fn test_precision_and_wikibase_time() {
        assert_eq!(PartialDate::year(1930).precision(), 9);
        assert_eq!(PartialDate::year_month(1930, 5).precision(), 10);
        assert_eq!(PartialDate::ymd(1930, 5, 17).precision(), 11);
        assert_eq!(PartialDate::year(1930).to_wikibase_time(), "+1930-00-00T00:00:00Z");
        assert_eq!(
            PartialDate::ymd(1930, 5, 7).to_wikibase_time(),
            "+1930-05-07T00:00:00Z"
        );
    }

    #[test]
    fn test_inception_keyword() {
        let rec = record(json!({
            "subjects": [["Helsinki"], ["kuvausaika 08.01.2016"]]
        }));
        assert_eq!(inception_from_record(&rec), Some(PartialDate::ymd(2016, 1, 8)));

        let rec = record(json!({
            "subjects": [["ajankohta: kesä\t1930, Helsinki"]]
        }));
        assert_eq!(inception_from_record(&rec), Some(PartialDate::year(1930)));

        let rec = record(json!({
            "subjects": [["valmistusaika 1.2.1952 Kuopio"]], "year": "1952"
        }));
        // The last token is a place, so the keyword gives no date
        assert_eq!(inception_from_record(&rec), None);
    }

    #[test]
    fn test_inception_plain_subject_and_year_fallback() {
        let rec = record(json!({ "subjects": [["Kauppatori", "1930"]] }));
        assert_eq!(inception_from_record(&rec), Some(PartialDate::year(1930)));

        let rec = record(json!({ "subjects": [["Kauppatori"]], "year": "1931" }));
        assert_eq!(inception_from_record(&rec), Some(PartialDate::year(1931)));

        let rec = record(json!({ "year": 1932 }));
        assert_eq!(inception_from_record(&rec), Some(PartialDate::year(1932)));

        let rec = record(json!({ "year": "1930-1939" }));
        assert_eq!(inception_from_record(&rec), None);
    }

    #[test]
    fn test_publisher_from_institution_or_building() {
        let rec = record(json!({
            "institutions": [{"value": "0/Museovirasto/", "translated": "Museovirasto"}]
        }));
        assert_eq!(publisher_code(&rec, &tables()).as_deref(), Some("Q3029524"));

        let rec = record(json!({
            "buildings": [{"value": "0/Museovirasto/", "translated": "Museovirasto"}]
        }));
        assert_eq!(publisher_code(&rec, &tables()).as_deref(), Some("Q3029524"));

        let rec = record(json!({ "institutions": [{"translated": "Unknown"}] }));
        assert_eq!(publisher_code(&rec, &tables()), None);
    }

    #[test]
    fn test_collection_codes() {
        let rec = record(json!({
            "collections": ["Historian kuvakokoelma", "Unknown", "Historian kuvakokoelma",
                            "Studio Kuvasiskojen kokoelma"]
        }));
        assert_eq!(collection_codes(&rec, &tables()), ["Q107388072", "Q118976025"]);
    }

    #[test]
    fn test_facts_from_record() {
        let rec = record(json!({
            "id": "museovirasto.ABC",
            "imagesExtended": [{"rights": {"copyright": "PDM"}, "urls": {}}],
            "institutions": [{"translated": "Museovirasto"}],
            "collections": ["Historian kuvakokoelma"],
            "year": "1930"
        }));
        let facts = CatalogFacts::from_record(&rec, &tables());
        assert_eq!(facts.license.as_deref(), Some("PDM"));
        assert_eq!(facts.copyright_status.as_deref(), Some(STATUS_RIGHTS_WAIVED));
        assert_eq!(facts.operator.as_deref(), Some(CATALOG_OPERATOR));

        let properties: Vec<_> = facts.facts().iter().map(CatalogFact::property).collect();
        assert_eq!(properties, ["P275", "P6216", "P123", "P137", "P195", "P571"]);
    }

    #[test]
    fn test_operator_follows_described_url() {
        let rec = record(json!({"id": "x.1"}));
        let facts = CatalogFacts::from_record(&rec, &tables());

        let gallery = facts
            .clone()
            .with_operator_for("https://www.kansallisgalleria.fi/fi/object/624337");
        assert_eq!(gallery.operator.as_deref(), Some(GALLERY_OPERATOR));

        let finna = facts.clone().with_operator_for("https://www.finna.fi/Record/x.1");
        assert_eq!(finna.operator.as_deref(), Some(CATALOG_OPERATOR));

        let unknown = facts.with_operator_for("https://records.example/x.1");
        assert_eq!(unknown.operator.as_deref(), Some(CATALOG_OPERATOR));
    }
}
