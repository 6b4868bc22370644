use super::*;

/// How many heights back a job stays answerable. Miners that submit against a
/// header from a slightly older template are tolerated up to this depth.
pub(crate) const STALE_JOB_DEPTH: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JobDetails {
    pub(crate) height: u64,
    pub(crate) difficulty: U256,
}

/// Immutable snapshot of the currently mineable work. The `headers` lookup is
/// the sole authority on job validity: a submission whose header hash is not
/// in it is stale, full stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockTemplate {
    pub(crate) header: String,
    pub(crate) seed: String,
    pub(crate) height: u64,
    pub(crate) difficulty: U256,
    pub(crate) headers: HashMap<String, JobDetails>,
}

impl BlockTemplate {
    /// Builds the next template from freshly fetched work, carrying forward
    /// recent-past header hashes from the template it replaces.
    pub(crate) fn next(work: Work, previous: Option<&BlockTemplate>) -> Result<Self> {
        ensure!(
            !work.header.is_empty(),
            "block template at height {} has an empty header",
            work.height
        );

        ensure!(
            !work.difficulty.is_zero(),
            "block template at height {} has zero difficulty",
            work.height
        );

        let mut headers = HashMap::new();

        if let Some(previous) = previous {
            for (hash, details) in &previous.headers {
                if details.height + STALE_JOB_DEPTH > work.height {
                    headers.insert(hash.clone(), *details);
                }
            }
        }

        headers.insert(
            work.header.clone(),
            JobDetails {
                height: work.height,
                difficulty: work.difficulty,
            },
        );

        Ok(Self {
            header: work.header,
            seed: work.seed,
            height: work.height,
            difficulty: work.difficulty,
            headers,
        })
    }

    pub(crate) fn job(&self, header_hash: &str) -> Option<&JobDetails> {
        self.headers.get(header_hash)
    }
}

/// Holder of the active template. Replaced wholesale on update so readers see
/// either the old or the new complete template, never a partial one.
#[derive(Default)]
pub(crate) struct TemplateStore {
    current: RwLock<Option<Arc<BlockTemplate>>>,
}

impl TemplateStore {
    pub(crate) fn current(&self) -> Option<Arc<BlockTemplate>> {
        self.current.read().clone()
    }

    pub(crate) fn publish(&self, template: Arc<BlockTemplate>) {
        *self.current.write() = Some(template);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn work(header: &str, height: u64, difficulty: u64) -> Work {
        Work {
            header: header.into(),
            seed: "0xseed".into(),
            height,
            difficulty: U256::from(difficulty),
        }
    }

    #[test]
    fn next_rejects_zero_difficulty() {
        assert!(BlockTemplate::next(work("0xaa", 100, 0), None).is_err());
    }

    #[test]
    fn next_rejects_empty_header() {
        assert!(BlockTemplate::next(work("", 100, 1000), None).is_err());
    }

    #[test]
    fn fresh_template_knows_only_its_own_header() {
        let template = BlockTemplate::next(work("0xaa", 100, 1000), None).unwrap();

        assert_eq!(template.headers.len(), 1);
        assert_eq!(
            template.job("0xaa"),
            Some(&JobDetails {
                height: 100,
                difficulty: U256::from(1000),
            })
        );
        assert_eq!(template.job("0xbb"), None);
    }

    #[test]
    fn recent_headers_carry_forward() {
        let first = BlockTemplate::next(work("0xaa", 100, 1000), None).unwrap();
        let second = BlockTemplate::next(work("0xbb", 101, 1100), Some(&first)).unwrap();

        assert!(second.job("0xaa").is_some(), "one height back is tolerated");
        assert!(second.job("0xbb").is_some());
    }

    #[test]
    fn stale_headers_age_out() {
        let mut template = BlockTemplate::next(work("0xaa", 100, 1000), None).unwrap();

        for height in 101..=(100 + STALE_JOB_DEPTH) {
            let header = format!("0x{height:x}");
            template = BlockTemplate::next(work(&header, height, 1000), Some(&template)).unwrap();
        }

        assert_eq!(
            template.job("0xaa"),
            None,
            "header {} heights back must be gone",
            STALE_JOB_DEPTH
        );
    }

    #[test]
    fn store_replaces_wholesale() {
        let store = TemplateStore::default();
        assert!(store.current().is_none());

        let first = Arc::new(BlockTemplate::next(work("0xaa", 100, 1000), None).unwrap());
        store.publish(first.clone());
        assert_eq!(store.current().unwrap().header, "0xaa");

        let second =
            Arc::new(BlockTemplate::next(work("0xbb", 101, 1000), Some(&first)).unwrap());
        store.publish(second);
        assert_eq!(store.current().unwrap().header, "0xbb");
    }
}
