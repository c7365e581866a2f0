//! Index generations: construction into staging, the combined reader over
//! one generation, and the live handle that switches between them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::config::{IndexConfig, QueryConfig};
use crate::error::Result;
use crate::forward::{self, ForwardIndexConverter, ForwardIndexReader};
use crate::journal::JournalReader;
use crate::progress::ProgressSink;
use crate::query::execution::{ExecutionStats, IndexQueryExecution, SearchResultSet};
use crate::query::filter::QueryFilterRangeRetain;
use crate::query::index_query::{IndexQuery, IndexQueryBuilder, QueryPriority};
use crate::query::params::{ParamMatchingQueryFilter, QueryParams};
use crate::query::terms::{SearchSubquery, SearchTerms};
use crate::ranking::DomainRankings;
use crate::reverse::{DocIdRewriter, IndexTier, ReverseIndexConstructor, ReverseIndexReader};
use crate::util::hash::TermInterner;

/// Names of every file that makes up one generation.
pub fn index_files() -> Vec<String> {
    let mut files: Vec<String> = forward::FILES.iter().map(|f| f.to_string()).collect();
    for tier in IndexTier::ALL {
        files.push(tier.docs_file());
        files.push(tier.words_file());
    }
    files
}

fn clear_generation(dir: &Path) -> Result<()> {
    for name in index_files() {
        let path = dir.join(name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Build the forward index and both reverse tiers from the journal into the
/// staging directory. Returns `false` if the journal is empty.
///
/// On failure the staging directory is cleared, so a later switch cannot
/// publish a partial generation.
pub fn construct_index(
    config: &IndexConfig,
    rankings: &dyn DomainRankings,
    progress: &dyn ProgressSink,
) -> Result<bool> {
    let journal = JournalReader::open_dir(&config.journal_dir)?;
    let staging = config.staging_dir();
    if staging.exists() {
        clear_generation(&staging)?;
    }

    let built = (|| -> Result<bool> {
        if !ForwardIndexConverter::new(&journal, &staging, rankings, progress).convert()? {
            return Ok(false);
        }
        for tier in IndexTier::ALL {
            ReverseIndexConstructor::new(
                &journal,
                tier,
                &staging,
                DocIdRewriter::Ranked(rankings),
                progress,
            )
            .with_block_size(config.reverse.block_size)
            .construct()?;
        }
        Ok(true)
    })();

    match built {
        Ok(true) => {
            info!("index generation staged in {}", staging.display());
            Ok(true)
        }
        Ok(false) => Ok(false),
        Err(e) => {
            warn!("index construction failed, clearing {}: {e}", staging.display());
            if let Err(clear) = clear_generation(&staging) {
                warn!("failed to clear {}: {clear}", staging.display());
            }
            Err(e)
        }
    }
}

/// Forward index plus both reverse tiers of one generation.
pub struct CombinedIndexReader {
    dir: PathBuf,
    forward: Arc<ForwardIndexReader>,
    full: ReverseIndexReader,
    prio: ReverseIndexReader,
    interner: TermInterner,
}

impl CombinedIndexReader {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(CombinedIndexReader {
            dir: dir.to_path_buf(),
            forward: Arc::new(ForwardIndexReader::open(dir)?),
            full: ReverseIndexReader::open(dir, IndexTier::Full)?,
            prio: ReverseIndexReader::open(dir, IndexTier::Priority)?,
            interner: TermInterner::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_loaded(&self) -> bool {
        self.forward.is_loaded() && self.full.is_loaded()
    }

    pub fn forward(&self) -> &Arc<ForwardIndexReader> {
        &self.forward
    }

    pub fn reverse(&self, tier: IndexTier) -> &ReverseIndexReader {
        match tier {
            IndexTier::Full => &self.full,
            IndexTier::Priority => &self.prio,
        }
    }

    pub fn num_documents(&self, term_id: u64) -> usize {
        self.full.num_documents(term_id)
    }

    /// Resolve subquery term strings against this generation.
    pub fn resolve(&self, subqueries: &[SearchSubquery]) -> Vec<SearchTerms> {
        subqueries
            .iter()
            .map(|sq| SearchTerms::resolve(sq, &self.interner))
            .collect()
    }

    /// Turn resolved subqueries into runnable queries.
    ///
    /// Include terms are ordered rarest first and the rarest drives the
    /// query. While there are few subqueries, each also gets a `Best` query
    /// driven from the priority tier. The first subquery's full-tier query
    /// is `Good`; the others are `Fallback`.
    pub fn create_queries(
        &self,
        terms: &[SearchTerms],
        params: &QueryParams,
        config: &QueryConfig,
    ) -> Vec<IndexQuery> {
        let active = terms.iter().filter(|t| !t.is_empty()).count();
        let use_priority = active <= config.max_priority_subqueries;

        let mut queries = Vec::new();
        let mut first = true;

        for (i, subquery) in terms.iter().enumerate() {
            if subquery.is_empty() {
                debug!("subquery {i} has no include terms, skipping");
                continue;
            }

            let mut include = subquery.include.clone();
            include.sort_by_key(|&term| self.full.num_documents(term));
            if self.full.num_documents(include[0]) == 0 {
                debug!("subquery {i} has an include term with no documents, skipping");
                first = false;
                continue;
            }

            if use_priority {
                let driver = include
                    .iter()
                    .copied()
                    .map(|term| (self.prio.num_documents(term), term))
                    .filter(|&(count, _)| count > 0)
                    .min()
                    .map(|(_, term)| term);

                if let Some(driver) = driver {
                    let mut builder =
                        IndexQueryBuilder::new(self, IndexTier::Priority, driver, QueryPriority::Best)
                            .subquery(i);
                    for &term in include.iter().filter(|&&t| t != driver) {
                        builder.also(term);
                    }
                    self.add_constraints(&mut builder, subquery, params);
                    queries.push(builder.build());
                }
            }

            let priority = if first {
                QueryPriority::Good
            } else {
                QueryPriority::Fallback
            };
            first = false;

            let mut builder =
                IndexQueryBuilder::new(self, IndexTier::Full, include[0], priority).subquery(i);
            for &term in &include[1..] {
                builder.also(term);
            }
            self.add_constraints(&mut builder, subquery, params);
            queries.push(builder.build());
        }

        for query in &queries {
            debug!("query: {}", query.describe());
        }
        queries
    }

    fn add_constraints(
        &self,
        builder: &mut IndexQueryBuilder<'_>,
        terms: &SearchTerms,
        params: &QueryParams,
    ) {
        for group in &terms.include_any {
            builder.also_any(group);
        }
        for &term in &terms.exclude {
            builder.not(term);
        }
        if !params.domains.is_empty() {
            let ranges = params
                .domains
                .iter()
                .map(|&domain| self.forward.rank_encoded_domain_range(domain))
                .collect();
            builder.add_inclusion_filter(Box::new(QueryFilterRangeRetain::new(ranges)));
        }
        if !params.is_unrestricted() {
            builder.add_inclusion_filter(Box::new(ParamMatchingQueryFilter::new(
                self.forward.clone(),
                params.clone(),
            )));
        }
    }
}

/// The live index: the current generation plus the means to replace it.
///
/// Searches capture the current generation's `Arc` up front, so a switch
/// never affects a search already running.
pub struct SearchIndex {
    config: IndexConfig,
    current: RwLock<Option<Arc<CombinedIndexReader>>>,
    switch_lock: Mutex<()>,
    stats: ExecutionStats,
}

impl SearchIndex {
    /// Open the live generation in `config.index_dir`, if there is one.
    pub fn open(config: IndexConfig) -> Result<Self> {
        config.validate()?;

        let live = config.index_dir.join(forward::DOC_IDS_FILE);
        let current = if live.exists() {
            Some(Arc::new(CombinedIndexReader::open(&config.index_dir)?))
        } else {
            warn!(
                "no index generation in {}, searches return nothing until a switch",
                config.index_dir.display()
            );
            None
        };

        Ok(SearchIndex {
            config,
            current: RwLock::new(current),
            switch_lock: Mutex::new(()),
            stats: ExecutionStats::default(),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// The current generation.
    pub fn current(&self) -> Option<Arc<CombinedIndexReader>> {
        self.current.read().clone()
    }

    /// Build a new generation into the staging directory.
    pub fn construct(&self, rankings: &dyn DomainRankings, progress: &dyn ProgressSink) -> Result<bool> {
        construct_index(&self.config, rankings, progress)
    }

    /// Publish the staged generation and repoint the live handle to it.
    ///
    /// Returns `false` if nothing is staged.
    pub fn switch_index(&self) -> Result<bool> {
        let _switching = self.switch_lock.lock();

        let staging = self.config.staging_dir();
        if !staging.join(forward::DOC_IDS_FILE).exists() {
            warn!("no staged index generation in {}", staging.display());
            return Ok(false);
        }

        let live = &self.config.index_dir;
        fs::create_dir_all(live)?;
        for name in index_files() {
            let staged = staging.join(&name);
            if staged.exists() {
                fs::rename(&staged, live.join(&name))?;
            }
        }

        let reader = Arc::new(CombinedIndexReader::open(live)?);
        *self.current.write() = Some(reader);
        info!("switched to new index generation in {}", live.display());
        Ok(true)
    }

    /// Run one search against the current generation.
    pub fn search(&self, subqueries: &[SearchSubquery], params: QueryParams) -> Result<SearchResultSet> {
        let Some(index) = self.current() else {
            warn!("search against an index with no generation loaded");
            return Ok(SearchResultSet::default());
        };

        let terms = index.resolve(subqueries);
        IndexQueryExecution::new(index, &self.config.query, terms, params)
            .with_stats(&self.stats)
            .run()
    }
}
