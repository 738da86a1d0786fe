use crate::delay::DelayRange;
use crate::record::{FieldRule, TargetRecord, UrlTemplate};
use crate::traits::Fetcher;

/// Drives one harvest across an ordered list of target names.
///
/// For each target: render the URL, fetch the page, apply every field rule,
/// append the record, then pause for a randomized interval before the next
/// target. A failed fetch never aborts the run — the target still gets a
/// record with every field empty, so output position N always corresponds
/// to input target N.
///
/// Generic over the transport via [`Fetcher`], so tests run without HTTP.
pub struct ScrapeRunner<F: Fetcher> {
    fetcher: F,
    rules: Vec<FieldRule>,
    delay: DelayRange,
}

impl<F: Fetcher> ScrapeRunner<F> {
    pub fn new(fetcher: F, rules: Vec<FieldRule>, delay: DelayRange) -> Self {
        Self {
            fetcher,
            rules,
            delay,
        }
    }

    /// Harvest every target in order. Infallible by design: transport and
    /// extraction misses degrade to empty fields, never to a lost record.
    pub async fn run(&self, targets: &[String], template: &UrlTemplate) -> Vec<TargetRecord> {
        let mut records = Vec::with_capacity(targets.len());

        for (i, name) in targets.iter().enumerate() {
            let url = template.render(name);
            tracing::info!(target = %name, %url, "Fetching");

            let record = match self.fetcher.fetch(&url).await {
                Ok(body) => {
                    tracing::info!(target = %name, bytes = body.len(), "Fetched");
                    let mut record = TargetRecord::new(name.clone());
                    for field in &self.rules {
                        let value = field.rule.apply(&body);
                        if value.is_empty() {
                            tracing::debug!(
                                target = %name,
                                field = %field.name,
                                "Markers not found, field left empty"
                            );
                        }
                        record.push_field(field.name.clone(), value);
                    }
                    record
                }
                Err(err) => {
                    tracing::warn!(
                        target = %name,
                        %url,
                        error = %err,
                        "Fetch failed, recording empty fields"
                    );
                    TargetRecord::empty(name, &self.rules)
                }
            };
            records.push(record);

            // Politeness pause between targets; nothing to wait for after
            // the last one.
            if i + 1 < targets.len() {
                let pause = self.delay.sample();
                tracing::debug!(sleep_ms = %pause.as_millis(), "Pausing before next target");
                tokio::time::sleep(pause).await;
            }
        }

        records
    }
}

/// One line of the post-run review listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewLine {
    pub name: String,
    /// Value of the record's first field, if any rules were configured.
    pub value: Option<String>,
    pub url: String,
}

/// Re-walk collected records to reconstruct their display URLs from the
/// stored names. Purely in-memory: no request is made, which makes this a
/// cheap sanity check that names round-trip through the URL template.
pub fn review(records: &[TargetRecord], template: &UrlTemplate) -> Vec<ReviewLine> {
    records
        .iter()
        .map(|record| ReviewLine {
            name: record.name.clone(),
            value: record.fields.first().map(|(_, value)| value.clone()),
            url: template.render(&record.name),
        })
        .collect()
}
