//! Risk quiz scoring.

use finboard::quiz::{QuizError, RiskProfile, questions, score};

#[test]
fn questions_have_four_options_each() {
    let qs = questions();
    assert_eq!(qs.len(), 8);
    for (i, q) in qs.iter().enumerate() {
        assert_eq!(q.id, i);
        assert!(!q.prompt.is_empty());
        assert!(q.options.iter().all(|o| !o.is_empty()));
    }
}

#[test]
fn lowest_answers_are_conservative() {
    let result = score(&[0; 8]).unwrap();
    assert_eq!(result.score, 8);
    assert_eq!(result.max_score, 32);
    assert_eq!(result.profile, RiskProfile::Conservative);
    assert_eq!(result.allocation.crypto, 0);
}

#[test]
fn highest_answers_are_aggressive() {
    let result = score(&[3; 8]).unwrap();
    assert_eq!(result.score, 32);
    assert_eq!(result.profile, RiskProfile::Aggressive);
}

#[test]
fn middle_answers_are_moderate() {
    // 4 x 2 + 4 x 3 = 20
    let result = score(&[1, 2, 1, 2, 1, 2, 1, 2]).unwrap();
    assert_eq!(result.score, 20);
    assert_eq!(result.profile, RiskProfile::Moderate);
    let a = result.allocation;
    assert_eq!(a.stocks + a.bonds + a.cash + a.crypto, 100);
}

#[test]
fn wrong_answer_count_is_rejected() {
    assert_eq!(
        score(&[0; 7]).unwrap_err(),
        QuizError::WrongAnswerCount {
            expected: 8,
            got: 7
        }
    );
}

#[test]
fn out_of_range_option_is_rejected() {
    assert_eq!(
        score(&[0, 0, 4, 0, 0, 0, 0, 0]).unwrap_err(),
        QuizError::OptionOutOfRange {
            question: 2,
            answer: 4
        }
    );
}

#[test]
fn risk_profile_string_round_trip() {
    for p in [
        RiskProfile::Conservative,
        RiskProfile::ModeratelyConservative,
        RiskProfile::Moderate,
        RiskProfile::Growth,
        RiskProfile::Aggressive,
    ] {
        assert_eq!(RiskProfile::parse(p.as_str()), Some(p));
    }
    assert_eq!(RiskProfile::parse("yolo"), None);
}
