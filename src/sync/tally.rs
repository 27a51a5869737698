use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{ConditionVoteEntity, ConflictVoteEntity, Emoji};

/// Count and rounded share of one mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct MoodCount {
    pub emoji: Emoji,
    pub count: u64,
    /// Share of all votes, rounded to a whole percent.
    pub percentage: u8,
}

/// Mood distribution in the fixed emoji order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MoodTally {
    /// One entry per emoji, zero counts included.
    pub counts: Vec<MoodCount>,
    /// Number of votes cast.
    pub total: u64,
}

/// Yes/no split of the conflict poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct ConflictTally {
    /// Participants who had a conflict.
    pub yes: u64,
    pub no: u64,
    pub total: u64,
    /// Rounded share of `yes`; the `no` share is its complement.
    pub yes_percentage: u8,
}

/// `round(count / total * 100)`, 0 when nobody voted.
pub fn percentage(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u8
}

/// Count votes per emoji in [`Emoji::ALL`] order.
pub fn tally_moods(votes: &[ConditionVoteEntity]) -> MoodTally {
    let total = votes.len() as u64;
    let counts = Emoji::ALL
        .iter()
        .map(|emoji| {
            let count = votes.iter().filter(|vote| vote.emoji == *emoji).count() as u64;
            MoodCount {
                emoji: *emoji,
                count,
                percentage: percentage(count, total),
            }
        })
        .collect();
    MoodTally { counts, total }
}

/// Split conflict answers into yes and no.
pub fn tally_conflicts(votes: &[ConflictVoteEntity]) -> ConflictTally {
    let yes = votes.iter().filter(|vote| vote.has_conflict).count() as u64;
    let total = votes.len() as u64;
    ConflictTally {
        yes,
        no: total - yes,
        total,
        yes_percentage: percentage(yes, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mood(emoji: Emoji) -> ConditionVoteEntity {
        ConditionVoteEntity {
            id: None,
            session_id: "s1".into(),
            emoji,
            voter_id: None,
            created_at: None,
        }
    }

    fn count_of(tally: &MoodTally, emoji: Emoji) -> (u64, u8) {
        tally
            .counts
            .iter()
            .find(|entry| entry.emoji == emoji)
            .map(|entry| (entry.count, entry.percentage))
            .unwrap()
    }

    #[test]
    fn two_votes_split_evenly() {
        let tally = tally_moods(&[mood(Emoji::Sleepy), mood(Emoji::Fire)]);
        assert_eq!(tally.total, 2);
        assert_eq!(count_of(&tally, Emoji::Sleepy), (1, 50));
        assert_eq!(count_of(&tally, Emoji::Fire), (1, 50));
        assert_eq!(count_of(&tally, Emoji::Dizzy), (0, 0));
    }

    #[test]
    fn three_votes_round_to_thirds() {
        let tally = tally_moods(&[mood(Emoji::Sleepy), mood(Emoji::Fire), mood(Emoji::Strong)]);
        assert_eq!(tally.total, 3);
        for emoji in [Emoji::Sleepy, Emoji::Fire, Emoji::Strong] {
            assert_eq!(count_of(&tally, emoji), (1, 33));
        }
    }

    #[test]
    fn counts_follow_fixed_order_and_sum_to_total() {
        let votes: Vec<_> = [
            Emoji::Strong,
            Emoji::Strong,
            Emoji::Dizzy,
            Emoji::Fire,
            Emoji::Strong,
            Emoji::Sleepy,
            Emoji::Dizzy,
        ]
        .into_iter()
        .map(mood)
        .collect();
        let tally = tally_moods(&votes);

        let order: Vec<_> = tally.counts.iter().map(|entry| entry.emoji).collect();
        assert_eq!(order, Emoji::ALL.to_vec());
        assert_eq!(
            tally.counts.iter().map(|entry| entry.count).sum::<u64>(),
            tally.total
        );
        let percent_sum: i64 = tally.counts.iter().map(|e| e.percentage as i64).sum();
        assert!((percent_sum - 100).abs() <= 3);
    }

    #[test]
    fn empty_tallies_report_zero() {
        let moods = tally_moods(&[]);
        assert_eq!(moods.total, 0);
        assert!(moods.counts.iter().all(|entry| entry.percentage == 0));

        assert_eq!(tally_conflicts(&[]), ConflictTally::default());
    }

    #[test]
    fn conflict_split_reports_yes_share() {
        let votes: Vec<_> = [true, true, false]
            .into_iter()
            .map(|has_conflict| ConflictVoteEntity {
                id: None,
                session_id: "s1".into(),
                has_conflict,
                created_at: None,
            })
            .collect();
        let tally = tally_conflicts(&votes);
        assert_eq!((tally.yes, tally.no, tally.total), (2, 1, 3));
        assert_eq!(tally.yes_percentage, 67);
    }
}
