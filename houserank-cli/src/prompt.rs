/// Question text and answer parsing for interactive comparisons.
use crate::store::House;

/// What the user answered to one comparison question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The house being ranked is preferred over the ranked one.
    NewIsBetter,
    /// The already-ranked house is preferred.
    SubjectIsBetter,
    /// Stop asking and place the house at the best rank still possible.
    Finalize,
    /// Stop asking and leave the house unranked.
    Abort,
}

pub const ANSWER_HINT: &str = "Answer 1 or 2 (s = place it now, q = quit without ranking).";

/// Build the question shown for one comparison.
///
/// `step` is 1-based; `budget` is the worst-case number of questions.
pub fn build_question(new_house: &House, subject: &House, subject_rank: usize, step: usize, budget: usize) -> String {
    let mut question = format!(
        "\n[{step}/{budget}] Which house do you prefer?\n\
         \x20 1) {}\n",
        describe(new_house),
    );
    question.push_str(&format!("  2) #{} {}\n", subject_rank + 1, describe(subject)));
    question.push_str("Answer [1/2/s/q]: ");
    question
}

fn describe(house: &House) -> String {
    match &house.listing_url {
        Some(url) => format!("{} <{url}>", house.title),
        None => house.title.clone(),
    }
}

/// Parse one line of user input. `None` means the answer was not understood.
pub fn parse_answer(line: &str) -> Option<Verdict> {
    match line.trim().to_lowercase().as_str() {
        "1" | "y" | "yes" | "new" => Some(Verdict::NewIsBetter),
        "2" | "n" | "no" | "old" => Some(Verdict::SubjectIsBetter),
        "s" | "stop" | "done" => Some(Verdict::Finalize),
        "q" | "quit" | "abort" => Some(Verdict::Abort),
        _ => None,
    }
}
