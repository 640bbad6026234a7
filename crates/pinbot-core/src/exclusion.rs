//! Aggregation over the negative-area feeds and the hard-block list.
//!
//! Every feed is queried independently and bounded by a timeout. A feed that
//! errors or times out is skipped for that query: the fold over outcomes ignores
//! failures and unions successes. Failures are counted per feed so operators can
//! see which partner table is misbehaving.

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{task::JoinSet, time::timeout};

use crate::{
    classify::normalize_area_name,
    domain::{ExclusionEntry, MatchMode, PostalCode},
    ports::{ExclusionSource, HardBlockList},
};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(2);

/// Area-level exclusions collected for one code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    /// Normalized (trimmed, lowercased) area names.
    pub areas: BTreeSet<String>,
    /// Some feed blocks every area under the code.
    pub whole_code: bool,
}

impl ExclusionSet {
    pub fn contains(&self, normalized_area: &str) -> bool {
        self.areas.contains(normalized_area)
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty() && !self.whole_code
    }

    fn absorb(&mut self, code: &PostalCode, mode: MatchMode, entries: Vec<ExclusionEntry>) {
        for entry in entries {
            if entry.postal_code.trim() != code.as_str() {
                continue;
            }
            match mode {
                MatchMode::CodeOnly => self.whole_code = true,
                MatchMode::CodeAndArea => {
                    let area = entry
                        .area_name
                        .as_deref()
                        .map(normalize_area_name)
                        .unwrap_or_default();
                    if area.is_empty() {
                        self.whole_code = true;
                    } else {
                        self.areas.insert(area);
                    }
                }
            }
        }
    }
}

/// Result of asking a single feed about a code.
#[derive(Debug)]
pub enum SourceOutcome<T> {
    Ok(T),
    Failed(String),
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Exclusion(MatchMode),
    HardBlock,
}

/// Point-in-time health counters for one feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub id: String,
    pub kind: SourceKind,
    pub queries: u64,
    pub failures: u64,
    pub timeouts: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queries: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
}

impl Counters {
    fn record<T>(&self, outcome: &SourceOutcome<T>) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        match outcome {
            SourceOutcome::Ok(_) => {}
            SourceOutcome::Failed(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
            SourceOutcome::TimedOut => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn snapshot(&self, id: &str, kind: SourceKind) -> SourceStats {
        SourceStats {
            id: id.to_string(),
            kind,
            queries: self.queries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

struct RegisteredSource {
    source: Arc<dyn ExclusionSource>,
    counters: Counters,
}

struct RegisteredHardBlock {
    list: Arc<dyn HardBlockList>,
    counters: Counters,
}

pub struct ExclusionAggregator {
    sources: Vec<RegisteredSource>,
    hard_block: Option<RegisteredHardBlock>,
    source_timeout: Duration,
}

impl Default for ExclusionAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_TIMEOUT)
    }
}

impl ExclusionAggregator {
    pub fn new(source_timeout: Duration) -> Self {
        Self {
            sources: Vec::new(),
            hard_block: None,
            source_timeout,
        }
    }

    /// Append a negative-area feed. Feeds are folded in registration order.
    pub fn with_source(mut self, source: Arc<dyn ExclusionSource>) -> Self {
        self.sources.push(RegisteredSource {
            source,
            counters: Counters::default(),
        });
        self
    }

    pub fn with_hard_block(mut self, list: Arc<dyn HardBlockList>) -> Self {
        self.hard_block = Some(RegisteredHardBlock {
            list,
            counters: Counters::default(),
        });
        self
    }

    /// Union of the area exclusions reported by every feed that answered.
    pub async fn find_exclusions(&self, code: &PostalCode) -> ExclusionSet {
        let mut tasks = JoinSet::new();
        for (idx, reg) in self.sources.iter().enumerate() {
            let source = reg.source.clone();
            let code = code.clone();
            let limit = self.source_timeout;
            tasks.spawn(async move {
                let outcome = query_source(source.as_ref(), &code, limit).await;
                (idx, outcome)
            });
        }

        let mut outcomes: Vec<Option<SourceOutcome<Vec<ExclusionEntry>>>> =
            (0..self.sources.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
                Err(e) => tracing::warn!(error = %e, "exclusion source task did not complete"),
            }
        }

        // Fold in configured order so the result never depends on completion order.
        let mut set = ExclusionSet::default();
        for (reg, outcome) in self.sources.iter().zip(outcomes) {
            let outcome =
                outcome.unwrap_or_else(|| SourceOutcome::Failed("query task aborted".to_string()));
            reg.counters.record(&outcome);
            let source_id = reg.source.id();
            match outcome {
                SourceOutcome::Ok(entries) => {
                    set.absorb(code, reg.source.match_mode(), entries);
                }
                SourceOutcome::Failed(reason) => {
                    tracing::warn!(
                        source = source_id,
                        code = %code,
                        %reason,
                        "exclusion source failed; skipping"
                    );
                }
                SourceOutcome::TimedOut => {
                    tracing::warn!(
                        source = source_id,
                        code = %code,
                        timeout_ms = self.source_timeout.as_millis() as u64,
                        "exclusion source timed out; skipping"
                    );
                }
            }
        }
        set
    }

    /// Whether the code is on the unconditional block list.
    ///
    /// An unavailable list counts as "not blocked" for this query.
    pub async fn is_hard_blocked(&self, code: &PostalCode) -> bool {
        let Some(reg) = &self.hard_block else {
            return false;
        };

        let outcome = match timeout(self.source_timeout, reg.list.is_hard_blocked(code)).await {
            Ok(Ok(blocked)) => SourceOutcome::Ok(blocked),
            Ok(Err(e)) => SourceOutcome::Failed(e.to_string()),
            Err(_) => SourceOutcome::TimedOut,
        };
        reg.counters.record(&outcome);

        match outcome {
            SourceOutcome::Ok(blocked) => blocked,
            SourceOutcome::Failed(reason) => {
                tracing::warn!(
                    source = reg.list.id(),
                    code = %code,
                    %reason,
                    "hard-block list failed; treating as not blocked"
                );
                false
            }
            SourceOutcome::TimedOut => {
                tracing::warn!(
                    source = reg.list.id(),
                    code = %code,
                    "hard-block list timed out; treating as not blocked"
                );
                false
            }
        }
    }

    /// Health counters for every configured feed, hard-block list last.
    pub fn stats(&self) -> Vec<SourceStats> {
        let mut out: Vec<SourceStats> = self
            .sources
            .iter()
            .map(|reg| {
                reg.counters
                    .snapshot(reg.source.id(), SourceKind::Exclusion(reg.source.match_mode()))
            })
            .collect();
        if let Some(reg) = &self.hard_block {
            out.push(reg.counters.snapshot(reg.list.id(), SourceKind::HardBlock));
        }
        out
    }
}

async fn query_source(
    source: &dyn ExclusionSource,
    code: &PostalCode,
    limit: Duration,
) -> SourceOutcome<Vec<ExclusionEntry>> {
    match timeout(limit, source.query(code)).await {
        Ok(Ok(entries)) => SourceOutcome::Ok(entries),
        Ok(Err(e)) => SourceOutcome::Failed(e.to_string()),
        Err(_) => SourceOutcome::TimedOut,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{errors::Error, Result};
    use async_trait::async_trait;

    pub(crate) enum Behavior {
        Entries(Vec<(&'static str, Option<&'static str>)>),
        Fail,
        Hang,
    }

    pub(crate) struct FakeSource {
        pub id: &'static str,
        pub mode: MatchMode,
        pub behavior: Behavior,
    }

    #[async_trait]
    impl ExclusionSource for FakeSource {
        fn id(&self) -> &str {
            self.id
        }

        fn match_mode(&self) -> MatchMode {
            self.mode
        }

        async fn query(&self, code: &PostalCode) -> Result<Vec<ExclusionEntry>> {
            match &self.behavior {
                Behavior::Entries(rows) => Ok(rows
                    .iter()
                    .filter(|(pin, _)| *pin == code.as_str())
                    .map(|(pin, area)| ExclusionEntry {
                        source_id: self.id.to_string(),
                        postal_code: pin.to_string(),
                        area_name: area.map(str::to_string),
                    })
                    .collect()),
                Behavior::Fail => Err(Error::Source {
                    source_id: self.id.to_string(),
                    reason: "no such table".to_string(),
                }),
                Behavior::Hang => {
                    std::future::pending::<()>().await;
                    Ok(Vec::new())
                }
            }
        }
    }

    pub(crate) struct FakeHardBlock {
        pub codes: Vec<&'static str>,
        pub fail: bool,
    }

    #[async_trait]
    impl HardBlockList for FakeHardBlock {
        fn id(&self) -> &str {
            "cannot_process"
        }

        async fn is_hard_blocked(&self, code: &PostalCode) -> Result<bool> {
            if self.fail {
                return Err(Error::External("connection reset".to_string()));
            }
            Ok(self.codes.contains(&code.as_str()))
        }
    }

    fn area_source(
        id: &'static str,
        rows: Vec<(&'static str, Option<&'static str>)>,
    ) -> Arc<dyn ExclusionSource> {
        Arc::new(FakeSource {
            id,
            mode: MatchMode::CodeAndArea,
            behavior: Behavior::Entries(rows),
        })
    }

    fn code(s: &str) -> PostalCode {
        PostalCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn unions_normalized_areas_across_sources() {
        let agg = ExclusionAggregator::default()
            .with_source(area_source("neg_a", vec![("400001", Some(" Andheri "))]))
            .with_source(area_source(
                "neg_b",
                vec![("400001", Some("COLABA")), ("400002", Some("Elsewhere"))],
            ));

        let set = agg.find_exclusions(&code("400001")).await;
        assert_eq!(
            set.areas.iter().cloned().collect::<Vec<_>>(),
            vec!["andheri".to_string(), "colaba".to_string()]
        );
        assert!(!set.whole_code);
    }

    #[tokio::test]
    async fn failing_source_is_skipped_and_counted() {
        let agg = ExclusionAggregator::default()
            .with_source(Arc::new(FakeSource {
                id: "broken",
                mode: MatchMode::CodeAndArea,
                behavior: Behavior::Fail,
            }))
            .with_source(area_source("neg_b", vec![("400001", Some("Andheri"))]));

        let set = agg.find_exclusions(&code("400001")).await;
        assert!(set.contains("andheri"));

        let stats = agg.stats();
        assert_eq!(stats[0].id, "broken");
        assert_eq!(stats[0].queries, 1);
        assert_eq!(stats[0].failures, 1);
        assert_eq!(stats[1].failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_source_times_out_without_stalling_others() {
        let agg = ExclusionAggregator::new(Duration::from_millis(50))
            .with_source(Arc::new(FakeSource {
                id: "slow",
                mode: MatchMode::CodeAndArea,
                behavior: Behavior::Hang,
            }))
            .with_source(area_source("neg_b", vec![("400001", Some("Andheri"))]));

        let set = agg.find_exclusions(&code("400001")).await;
        assert!(set.contains("andheri"));
        assert_eq!(agg.stats()[0].timeouts, 1);
    }

    #[tokio::test]
    async fn blank_area_and_code_only_sources_block_whole_code() {
        let blank = ExclusionAggregator::default()
            .with_source(area_source("neg_a", vec![("400001", Some("   "))]));
        assert!(blank.find_exclusions(&code("400001")).await.whole_code);

        let missing = ExclusionAggregator::default()
            .with_source(area_source("neg_a", vec![("400001", None)]));
        assert!(missing.find_exclusions(&code("400001")).await.whole_code);

        let code_only = ExclusionAggregator::default().with_source(Arc::new(FakeSource {
            id: "pins",
            mode: MatchMode::CodeOnly,
            behavior: Behavior::Entries(vec![("400001", Some("ignored"))]),
        }));
        let set = code_only.find_exclusions(&code("400001")).await;
        assert!(set.whole_code);
        assert!(set.areas.is_empty());
        assert!(code_only.find_exclusions(&code("400002")).await.is_empty());
    }

    #[tokio::test]
    async fn hard_block_is_independent_and_failure_means_not_blocked() {
        let agg = ExclusionAggregator::default().with_hard_block(Arc::new(FakeHardBlock {
            codes: vec!["560001"],
            fail: false,
        }));
        assert!(agg.is_hard_blocked(&code("560001")).await);
        assert!(!agg.is_hard_blocked(&code("560002")).await);
        assert!(agg.find_exclusions(&code("560001")).await.is_empty());

        let broken = ExclusionAggregator::default().with_hard_block(Arc::new(FakeHardBlock {
            codes: vec!["560001"],
            fail: true,
        }));
        assert!(!broken.is_hard_blocked(&code("560001")).await);
        let stats = broken.stats();
        assert_eq!(stats[0].kind, SourceKind::HardBlock);
        assert_eq!(stats[0].failures, 1);
    }

    #[tokio::test]
    async fn no_hard_block_list_means_not_blocked() {
        let agg = ExclusionAggregator::default();
        assert!(!agg.is_hard_blocked(&code("560001")).await);
        assert!(agg.stats().is_empty());
    }
}
