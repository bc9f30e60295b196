use crate::api::models::QuizAnswer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_PASS_PERCENTAGE: u32 = 70;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    #[serde(alias = "_id")]
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(alias = "_id")]
    pub id: String,
    pub questions: Vec<QuizQuestion>,
    #[serde(default = "default_pass")]
    pub pass_percentage: u32,
}

fn default_pass() -> u32 {
    DEFAULT_PASS_PERCENTAGE
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizScore {
    pub correct: u32,
    pub total: u32,
    /// Rounded down.
    pub percentage: u32,
    pub passed: bool,
}

impl Quiz {
    /// Grades locally. Unanswered questions count as wrong and answers to
    /// unknown questions are ignored; the last answer per question wins.
    pub fn score(&self, answers: &[QuizAnswer]) -> QuizScore {
        let chosen: HashMap<&str, usize> = answers
            .iter()
            .map(|a| (a.question_id.as_str(), a.option_index))
            .collect();
        let total = self.questions.len() as u32;
        let correct = self
            .questions
            .iter()
            .filter(|q| chosen.get(q.id.as_str()) == Some(&q.correct_option))
            .count() as u32;
        let percentage = if total == 0 { 0 } else { correct * 100 / total };
        QuizScore {
            correct,
            total,
            percentage,
            passed: total > 0 && percentage >= self.pass_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(n: usize) -> Quiz {
        Quiz {
            id: "q".into(),
            questions: (0..n)
                .map(|i| QuizQuestion {
                    id: format!("q{i}"),
                    prompt: format!("Question {i}"),
                    options: vec!["a".into(), "b".into(), "c".into()],
                    correct_option: i % 3,
                })
                .collect(),
            pass_percentage: DEFAULT_PASS_PERCENTAGE,
        }
    }

    fn answer(q: usize, option: usize) -> QuizAnswer {
        QuizAnswer {
            question_id: format!("q{q}"),
            option_index: option,
        }
    }

    #[test]
    fn test_score_rounds_down() {
        let quiz = quiz(3);
        let score = quiz.score(&[answer(0, 0), answer(1, 1), answer(2, 0)]);
        assert_eq!(score.correct, 2);
        assert_eq!(score.percentage, 66);
        assert!(!score.passed);
    }

    #[test]
    fn test_unanswered_and_unknown() {
        let quiz = quiz(4);
        let score = quiz.score(&[answer(0, 0), answer(1, 1), answer(2, 2), answer(9, 0)]);
        assert_eq!(score.total, 4);
        assert_eq!(score.correct, 3);
        assert_eq!(score.percentage, 75);
        assert!(score.passed);
    }

    #[test]
    fn test_last_answer_wins() {
        let quiz = quiz(1);
        assert!(quiz.score(&[answer(0, 1), answer(0, 0)]).passed);
    }

    #[test]
    fn test_empty_quiz_never_passes() {
        let score = quiz(0).score(&[]);
        assert_eq!(score.percentage, 0);
        assert!(!score.passed);
    }
}
