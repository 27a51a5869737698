use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::ProblemKeywordEntity;

/// Relative display size of a keyword within the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SizeTier {
    /// At least 80% of the top count.
    Xl,
    /// At least 50%.
    Lg,
    /// At least 30%.
    Md,
    /// Everything else.
    Sm,
}

impl SizeTier {
    /// Tier for `count` relative to the most frequent keyword.
    pub fn for_ratio(count: u64, max_count: u64) -> SizeTier {
        let ratio = count as f64 / max_count.max(1) as f64;
        if ratio >= 0.8 {
            SizeTier::Xl
        } else if ratio >= 0.5 {
            SizeTier::Lg
        } else if ratio >= 0.3 {
            SizeTier::Md
        } else {
            SizeTier::Sm
        }
    }
}

/// One bucket of the keyword cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct KeywordCount {
    /// Normalized bucket key.
    pub keyword: String,
    pub count: u64,
    pub size: SizeTier,
}

/// Top keywords plus the number of raw submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct KeywordCloud {
    /// Most frequent first.
    pub keywords: Vec<KeywordCount>,
    /// Raw submissions, including those cut by the limit.
    pub total: u64,
}

/// Bucket key of a raw keyword.
pub fn normalize(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Count normalized keywords and keep the `limit` most frequent ones.
///
/// Ties keep the order in which buckets first appear in `rows`.
pub fn keyword_cloud(rows: &[ProblemKeywordEntity], limit: usize) -> KeywordCloud {
    let mut buckets: IndexMap<String, u64> = IndexMap::new();
    for row in rows {
        let key = normalize(&row.keyword);
        if key.is_empty() {
            continue;
        }
        *buckets.entry(key).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u64)> = buckets.into_iter().collect();
    // stable: equal counts stay in first-appearance order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);

    let max_count = ranked.first().map(|(_, count)| *count).unwrap_or(1);
    let keywords = ranked
        .into_iter()
        .map(|(keyword, count)| KeywordCount {
            keyword,
            count,
            size: SizeTier::for_ratio(count, max_count),
        })
        .collect();

    KeywordCloud {
        keywords,
        total: rows.len() as u64,
    }
}
