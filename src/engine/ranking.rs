//! 점수 순위 계산

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub nickname: String,
    pub score: u32,
    /// 동점일 때 쓰는 보조 카운터 (매치/수집/타격 횟수)
    pub hits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub nickname: String,
    pub score: u32,
    pub hits: u32,
    pub rank: usize,
}

/// 점수 내림차순, 보조 카운터 내림차순, 닉네임 오름차순으로 정렬 후 1부터 순위 부여
pub fn rank<I>(entries: I) -> Vec<Standing>
where
    I: IntoIterator<Item = ScoreEntry>,
{
    let mut entries: Vec<ScoreEntry> = entries.into_iter().collect();
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.hits.cmp(&a.hits))
            .then_with(|| a.nickname.cmp(&b.nickname))
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| Standing {
            nickname: e.nickname,
            score: e.score,
            hits: e.hits,
            rank: i + 1,
        })
        .collect()
}
