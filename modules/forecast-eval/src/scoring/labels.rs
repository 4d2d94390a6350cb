use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::EvalResult;
use crate::io::load_json;
use crate::types::LabelRecord;

/// Labeled samples keyed by `qid`, built once per run.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    by_qid: HashMap<String, LabelRecord>,
}

impl LabelIndex {
    pub fn load(path: &Path) -> EvalResult<Self> {
        let records: Vec<LabelRecord> = load_json(path)?;
        let index = Self::from_records(records);
        info!(path = %path.display(), labels = index.len(), "Loaded labels");
        Ok(index)
    }

    /// A repeated `qid` keeps the last record.
    pub fn from_records(records: Vec<LabelRecord>) -> Self {
        let mut by_qid = HashMap::with_capacity(records.len());
        for record in records {
            if let Some(previous) = by_qid.insert(record.qid.clone(), record) {
                warn!(qid = %previous.qid, "Duplicate label qid, keeping the later record");
            }
        }
        Self { by_qid }
    }

    pub fn get(&self, qid: &str) -> Option<&LabelRecord> {
        self.by_qid.get(qid)
    }

    pub fn len(&self) -> usize {
        self.by_qid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_qid.is_empty()
    }
}
