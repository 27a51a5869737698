use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fixed sequence of stages the facilitator walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Mood check.
    Condition,
    /// Reflection countdown.
    Reset,
    /// Messages to one's past self.
    FirstMe,
    /// Team conflict poll and team messages.
    Conflict,
    /// Problem keyword cloud.
    Why,
    /// Anticipated proud moments.
    Proud,
    /// Cheer counter.
    Cheer,
}

/// Live components a view polls while a step is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Mood,
    Timer,
    FirstMeBoard,
    Conflict,
    Keywords,
    ProudBoard,
    Cheers,
}

impl Step {
    /// Every step in presentation order.
    pub const ALL: [Step; 7] = [
        Step::Condition,
        Step::Reset,
        Step::FirstMe,
        Step::Conflict,
        Step::Why,
        Step::Proud,
        Step::Cheer,
    ];

    /// Number of steps.
    pub const COUNT: usize = Self::ALL.len();

    /// Position in [`Step::ALL`].
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|candidate| *candidate == self)
            .unwrap_or_default()
    }

    /// Step at `index`, clamped into range.
    pub fn clamped(index: i64) -> Step {
        let last = (Self::COUNT - 1) as i64;
        Self::ALL[index.clamp(0, last) as usize]
    }

    /// Step mirrored from a stored `current_step`; absent means the first step.
    pub fn from_stored(current_step: Option<i64>) -> Step {
        Self::clamped(current_step.unwrap_or(0))
    }

    pub fn next(self) -> Step {
        Self::clamped(self.index() as i64 + 1)
    }

    pub fn prev(self) -> Step {
        Self::clamped(self.index() as i64 - 1)
    }

    pub fn is_first(self) -> bool {
        self.index() == 0
    }

    pub fn is_last(self) -> bool {
        self.index() == Self::COUNT - 1
    }

    /// Heading shown on the display.
    pub fn title(self) -> &'static str {
        match self {
            Step::Condition => "컨디션 체크",
            Step::Reset => "리셋 타임",
            Step::FirstMe => "처음의 나에게",
            Step::Conflict => "협업 이야기",
            Step::Why => "다시, 왜?",
            Step::Proud => "뿌듯할 순간",
            Step::Cheer => "화이팅!",
        }
    }

    /// Quote shown under the heading.
    pub fn quote(self) -> &'static str {
        match self {
            Step::Condition => "지금 여러분은 이미 상위 10%입니다",
            Step::Reset => "처음의 나에게 한마디",
            Step::FirstMe => "그때의 나한테 부끄럽지 않으려면?",
            Step::Conflict => "협업은 고통이 아니라 성장의 가속기",
            Step::Why => "결국 모든 것은 문제 해결로 연결됩니다",
            Step::Proud => "지금은 버티는 게 아니라 쌓이는 중입니다",
            Step::Cheer => "오늘의 막막함이, 내일의 포트폴리오가 됩니다",
        }
    }

    /// Components whose data is polled while this step is shown.
    pub fn components(self) -> &'static [Component] {
        match self {
            Step::Condition => &[Component::Mood],
            Step::Reset => &[Component::Timer],
            Step::FirstMe => &[Component::FirstMeBoard],
            Step::Conflict => &[Component::Conflict],
            Step::Why => &[Component::Keywords],
            Step::Proud => &[Component::ProudBoard],
            Step::Cheer => &[Component::Cheers],
        }
    }
}

/// Step as pushed to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StepView {
    /// Position in the sequence, starting at 0.
    pub index: usize,
    pub step: Step,
    pub title: String,
    pub quote: String,
    pub total: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl From<Step> for StepView {
    fn from(step: Step) -> Self {
        Self {
            index: step.index(),
            step,
            title: step.title().to_string(),
            quote: step.quote().to_string(),
            total: Step::COUNT,
            is_first: step.is_first(),
            is_last: step.is_last(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_indices_are_clamped() {
        assert_eq!(Step::clamped(-4), Step::Condition);
        assert_eq!(Step::clamped(3), Step::Conflict);
        assert_eq!(Step::clamped(42), Step::Cheer);
        assert_eq!(Step::from_stored(None), Step::Condition);
    }

    #[test]
    fn next_and_prev_stay_within_range() {
        assert_eq!(Step::Condition.prev(), Step::Condition);
        assert_eq!(Step::Condition.next(), Step::Reset);
        assert_eq!(Step::Cheer.next(), Step::Cheer);
        assert_eq!(Step::Cheer.prev(), Step::Proud);
    }

    #[test]
    fn index_round_trips_through_clamp() {
        for step in Step::ALL {
            assert_eq!(Step::clamped(step.index() as i64), step);
        }
        assert!(Step::Condition.is_first());
        assert!(Step::Cheer.is_last());
    }
}
