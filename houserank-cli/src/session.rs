/// One insertion session: ask comparisons until the resolver has a rank.
///
/// The comparison log lives only for the duration of `run_session`. Every
/// question is chosen by folding the whole log again, so nothing here needs
/// to track the search state.
use std::io::{BufRead, Write};

use anyhow::{anyhow, Context, Result};
use houserank_core::{final_rank, max_comparisons, next_comparison_subject, Comparison, RankedItem};
use tracing::debug;

use crate::prompt::{build_question, parse_answer, Verdict, ANSWER_HINT};
use crate::store::House;

/// Source of comparison answers.
pub trait Judge {
    /// Compare `new_house` against `subject`. `step` is 1-based, `budget` the worst case.
    fn judge(&mut self, new_house: &House, subject: &RankedItem<House>, step: usize, budget: usize) -> Result<Verdict>;
}

/// Asks on a text stream, re-asking until the answer is understood.
/// End of input counts as [`Verdict::Abort`].
pub struct PromptJudge<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptJudge<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptJudge { input, output }
    }
}

impl<R: BufRead, W: Write> Judge for PromptJudge<R, W> {
    fn judge(&mut self, new_house: &House, subject: &RankedItem<House>, step: usize, budget: usize) -> Result<Verdict> {
        let subject_rank = subject.rank.unwrap_or_default();
        let question = build_question(new_house, &subject.payload, subject_rank, step, budget);

        loop {
            write!(self.output, "{question}")?;
            self.output.flush()?;

            let mut line = String::new();
            let read = self.input.read_line(&mut line).context("failed to read answer")?;
            if read == 0 {
                writeln!(self.output)?;
                return Ok(Verdict::Abort);
            }

            match parse_answer(&line) {
                Some(verdict) => return Ok(verdict),
                None => writeln!(self.output, "{ANSWER_HINT}")?,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Rank to commit; `None` when the user aborted.
    pub final_rank: Option<usize>,
    pub comparisons: Vec<Comparison>,
    /// True when the user asked to place the house before the range collapsed.
    pub finalized_early: bool,
}

/// Run comparisons for `new_house` against `ranked` (ascending rank order).
pub fn run_session<J: Judge + ?Sized>(ranked: &[RankedItem<House>], new_house: &House, judge: &mut J) -> Result<SessionOutcome> {
    let budget = max_comparisons(ranked.len());
    let mut comparisons: Vec<Comparison> = Vec::new();
    let mut finalized_early = false;

    while let Some(subject) = next_comparison_subject(ranked, &comparisons) {
        let verdict = judge.judge(new_house, subject, comparisons.len() + 1, budget)?;
        let new_item_is_better = match verdict {
            Verdict::NewIsBetter => true,
            Verdict::SubjectIsBetter => false,
            Verdict::Finalize => {
                finalized_early = true;
                break;
            }
            Verdict::Abort => {
                debug!(house_id = %new_house.id, asked = comparisons.len(), "session aborted");
                return Ok(SessionOutcome {
                    final_rank: None,
                    comparisons,
                    finalized_early: false,
                });
            }
        };

        let comparison = Comparison::against(subject, new_item_is_better)
            .ok_or_else(|| anyhow!("ranked house {} has no rank", subject.id))?;
        debug!(
            subject = %comparison.subject_id,
            subject_rank = comparison.subject_rank,
            new_item_is_better,
            "comparison recorded"
        );
        comparisons.push(comparison);
    }

    let rank = final_rank(ranked, &comparisons);
    debug!(house_id = %new_house.id, rank, asked = comparisons.len(), budget, "session resolved");

    Ok(SessionOutcome {
        final_rank: Some(rank),
        comparisons,
        finalized_early,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Cursor;

    fn house(title: &str) -> House {
        House {
            id: title.to_lowercase(),
            title: title.to_string(),
            description: None,
            image_url: None,
            listing_url: None,
            collection_name: "Default Collection".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ranked(titles: &[&str]) -> Vec<RankedItem<House>> {
        RankedItem::from_ordered(titles.iter().map(|t| {
            let h = house(t);
            (h.id.clone(), h)
        }))
    }

    /// Answers from a fixed script, recording which houses were shown.
    struct ScriptedJudge {
        answers: Vec<Verdict>,
        shown: Vec<String>,
    }

    impl Judge for ScriptedJudge {
        fn judge(&mut self, _new: &House, subject: &RankedItem<House>, _step: usize, _budget: usize) -> Result<Verdict> {
            self.shown.push(subject.payload.title.clone());
            Ok(self.answers.remove(0))
        }
    }

    fn scripted(answers: &[Verdict]) -> ScriptedJudge {
        ScriptedJudge {
            answers: answers.to_vec(),
            shown: Vec::new(),
        }
    }

    #[test]
    fn test_session_follows_binary_search() {
        let list = ranked(&["Worst", "Bad", "OK", "Good", "Best"]);
        let mut judge = scripted(&[Verdict::NewIsBetter, Verdict::SubjectIsBetter]);

        let outcome = run_session(&list, &house("New"), &mut judge).unwrap();

        assert_eq!(judge.shown, vec!["OK", "Bad"]);
        assert_eq!(outcome.final_rank, Some(2));
        assert_eq!(outcome.comparisons.len(), 2);
        assert!(!outcome.finalized_early);
    }

    #[test]
    fn test_session_on_empty_ranking_asks_nothing() {
        let mut judge = scripted(&[]);
        let outcome = run_session(&[], &house("First"), &mut judge).unwrap();
        assert_eq!(outcome.final_rank, Some(0));
        assert!(judge.shown.is_empty());
    }

    #[test]
    fn test_finalize_early_takes_lower_bound() {
        let list = ranked(&["A", "B", "C", "D", "E", "F", "G"]);
        let mut judge = scripted(&[Verdict::SubjectIsBetter, Verdict::Finalize]);

        let outcome = run_session(&list, &house("New"), &mut judge).unwrap();

        assert_eq!(outcome.final_rank, Some(4));
        assert!(outcome.finalized_early);
    }

    #[test]
    fn test_abort_yields_no_rank() {
        let list = ranked(&["A", "B"]);
        let mut judge = scripted(&[Verdict::Abort]);
        let outcome = run_session(&list, &house("New"), &mut judge).unwrap();
        assert_eq!(outcome.final_rank, None);
    }

    #[test]
    fn test_prompt_judge_reasks_on_noise() {
        let list = ranked(&["A", "B", "C"]);
        let input = Cursor::new("huh\n2\n1\n");
        let mut output = Vec::new();

        let outcome = {
            let mut judge = PromptJudge::new(input, &mut output);
            run_session(&list, &house("New"), &mut judge).unwrap()
        };

        // Worse than B (rank 1), better than C (rank 2).
        assert_eq!(outcome.final_rank, Some(2));
        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains(ANSWER_HINT));
        assert!(transcript.contains("2) #2 B"));
        assert!(transcript.contains("2) #3 C"));
    }

    #[test]
    fn test_prompt_judge_end_of_input_aborts() {
        let list = ranked(&["A"]);
        let mut judge = PromptJudge::new(Cursor::new(""), Vec::new());
        let outcome = run_session(&list, &house("New"), &mut judge).unwrap();
        assert_eq!(outcome.final_rank, None);
    }
}
