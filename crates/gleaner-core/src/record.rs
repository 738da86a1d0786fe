use crate::error::AppError;
use crate::extract::extract_between;

/// A pair of literal markers delimiting one field in a page.
///
/// Markers are taken literally (never as patterns) and HTML-entity-decoded
/// before matching; see [`extract_between`] for the exact slicing rules.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExtractionRule {
    /// Literal text immediately preceding the wanted value.
    pub start: String,
    /// Literal text immediately following the wanted value.
    pub end: String,
    /// Remove markup tags from the extracted value.
    #[serde(default)]
    pub strip_markup: bool,
}

impl ExtractionRule {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            strip_markup: false,
        }
    }

    pub fn with_strip_markup(mut self) -> Self {
        self.strip_markup = true;
        self
    }

    /// Apply this rule to a page body. A miss yields the empty string.
    pub fn apply(&self, text: &str) -> String {
        extract_between(&self.start, &self.end, text, self.strip_markup)
    }
}

/// A named extraction rule; the name becomes the record field name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldRule {
    pub name: String,
    #[serde(flatten)]
    pub rule: ExtractionRule,
}

impl FieldRule {
    pub fn new(name: impl Into<String>, rule: ExtractionRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }
}

/// On-disk rule file: an ordered list of named field rules.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuleSet {
    pub fields: Vec<FieldRule>,
}

/// One harvested target: the target name plus its extracted fields in rule
/// order. Field values are empty strings when the fetch or the extraction
/// missed; a record is never dropped from the output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TargetRecord {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl TargetRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Record for a target whose fetch failed: every field present, empty.
    pub fn empty(name: &str, rules: &[FieldRule]) -> Self {
        Self {
            name: name.to_string(),
            fields: rules
                .iter()
                .map(|r| (r.name.clone(), String::new()))
                .collect(),
        }
    }

    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Look up a field value by name.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

/// URL template with a `{name}` placeholder.
///
/// Target names are slugged (spaces become dashes) before substitution, so
/// "San Leandro" renders into `.../San-Leandro-...`.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, name: &str) -> String {
        self.template.replace("{name}", &Self::slug(name))
    }

    pub fn slug(name: &str) -> String {
        name.replace(' ', "-")
    }
}

/// Write records as CSV, one row per target: the name followed by every
/// field value in rule order. Every value is quoted, so embedded commas and
/// quotes survive a round-trip.
pub fn write_csv<W: std::io::Write>(records: &[TargetRecord], writer: W) -> Result<(), AppError> {
    let mut out = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    for record in records {
        let mut row = Vec::with_capacity(1 + record.fields.len());
        row.push(record.name.as_str());
        for (_, value) in &record.fields {
            row.push(value.as_str());
        }
        out.write_record(&row)?;
    }
    out.flush()?;
    Ok(())
}

/// [`write_csv`] into an owned string.
pub fn csv_string(records: &[TargetRecord]) -> Result<String, AppError> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
