//! Words
//!
//! Everyone races to find the same secret five-letter word. Guesses are made
//! simultaneously, one per round. Your own letters and marks are yours; the
//! table only ever sees the marks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::definition::{
    GameDefinition, PlayerStateContext, ProspectiveContext, PublicTurnContext, ReduceContext,
    RoundChangeContext, SetupContext, StatusContext, ValidateContext,
};
use crate::engine::errors::{ContractViolation, ValidationError, ValidationResult};
use crate::engine::types::{GameStatus, Member, PlayerId, SystemMessage};

/// Length of every secret and guess.
pub const WORD_LENGTH: usize = 5;

/// Secrets are drawn from this list.
pub const SECRETS: &[&str] = &[
    "acorn", "amber", "apple", "badge", "baker", "beach", "berry", "blaze", "bloom", "brave",
    "bread", "brick", "cabin", "candy", "cedar", "chalk", "charm", "chess", "cider", "cliff",
    "cloud", "coral", "crane", "crisp", "crown", "daisy", "delta", "drift", "eagle", "ember",
    "fable", "feast", "fjord", "flint", "frost", "glade", "grape", "grove", "haven", "hazel",
    "honey", "ivory", "jewel", "knoll", "lemon", "lilac", "maple", "marsh", "mango", "medal",
    "mirth", "noble", "oasis", "olive", "orbit", "pearl", "pilot", "plume", "prism", "quilt",
    "raven", "ridge", "river", "robin", "saint", "shore", "slate", "spice", "stone", "swift",
    "thyme", "tiger", "torch", "trail", "tulip", "vapor", "vivid", "waltz", "wheat", "zesty",
];

// =============================================================================
// TYPES
// =============================================================================

/// Rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Words {
    /// Guesses allowed per member
    pub max_guesses: usize,
}

impl Default for Words {
    fn default() -> Self {
        Self { max_guesses: 6 }
    }
}

/// Feedback for one letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// Right letter, right place
    Correct,
    /// In the word elsewhere
    Present,
    /// Not in the word (or all copies accounted for)
    Absent,
}

/// A submitted guess.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guess {
    /// Letters guessed
    pub word: String,
}

impl Guess {
    /// Guess from any string.
    pub fn new(word: impl Into<String>) -> Self {
        Self { word: word.into() }
    }
}

/// A scored guess.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessRecord {
    /// Lowercased letters
    pub word: String,
    /// One mark per letter
    pub marks: Vec<Mark>,
}

impl GuessRecord {
    fn solved(&self) -> bool {
        self.marks.iter().all(|m| *m == Mark::Correct)
    }
}

/// Authoritative state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordsState {
    /// The word to find
    pub secret: String,
    /// Scored guesses per member, oldest first
    pub guesses: BTreeMap<PlayerId, Vec<GuessRecord>>,
}

/// Marks without letters, as the table sees them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicGuess {
    /// One mark per letter
    pub marks: Vec<Mark>,
}

/// One member's view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordsView {
    /// Own scored guesses
    pub guesses: Vec<GuessRecord>,
    /// Everyone else's marks
    pub opponents: BTreeMap<PlayerId, Vec<Vec<Mark>>>,
    /// Guesses left
    pub remaining: usize,
    /// Own guess for the open round, submitted or drafted
    pub pending_guess: Option<String>,
    /// Revealed once the game is over
    pub secret: Option<String>,
}

// =============================================================================
// RULES
// =============================================================================

/// Score `guess` against `secret`. Repeated letters are marked present only
/// as many times as they remain unmatched in the secret.
pub fn score(secret: &str, guess: &str) -> Vec<Mark> {
    let secret: Vec<char> = secret.chars().collect();
    let guess: Vec<char> = guess.chars().collect();
    let mut marks = vec![Mark::Absent; guess.len()];
    let mut unmatched: BTreeMap<char, usize> = BTreeMap::new();

    for (i, letter) in guess.iter().enumerate() {
        match secret.get(i) {
            Some(s) if s == letter => marks[i] = Mark::Correct,
            Some(s) => *unmatched.entry(*s).or_insert(0) += 1,
            None => {}
        }
    }
    for s in secret.iter().skip(guess.len()) {
        *unmatched.entry(*s).or_insert(0) += 1;
    }

    for (i, letter) in guess.iter().enumerate() {
        if marks[i] == Mark::Correct {
            continue;
        }
        if let Some(count) = unmatched.get_mut(letter).filter(|c| **c > 0) {
            *count -= 1;
            marks[i] = Mark::Present;
        }
    }
    marks
}

impl Words {
    fn is_over(&self, state: &WordsState, members: &[Member]) -> bool {
        let anyone_solved = state
            .guesses
            .values()
            .any(|records| records.last().is_some_and(GuessRecord::solved));
        let everyone_out = members.iter().all(|m| {
            state
                .guesses
                .get(&m.id)
                .map_or(0, Vec::len)
                >= self.max_guesses
        });
        anyone_solved || everyone_out
    }
}

impl GameDefinition for Words {
    type GlobalState = WordsState;
    type PlayerState = WordsView;
    type TurnData = Guess;
    type PublicTurnData = PublicGuess;

    const NAME: &'static str = "words";
    const MIN_PLAYERS: usize = 1;
    const MAX_PLAYERS: usize = 8;

    fn active_players(&self, state: &WordsState, members: &[Member]) -> Vec<PlayerId> {
        if self.is_over(state, members) {
            return Vec::new();
        }
        members
            .iter()
            .filter(|m| state.guesses.get(&m.id).map_or(0, Vec::len) < self.max_guesses)
            .map(|m| m.id.clone())
            .collect()
    }

    fn validate_partial_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        let word = &ctx.data.word;
        if !word.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::new("LETTERS_ONLY", "use letters a to z only"));
        }
        if word.chars().count() > WORD_LENGTH {
            return Err(ValidationError::new(
                "TOO_LONG",
                format!("guesses have {WORD_LENGTH} letters"),
            ));
        }
        Ok(())
    }

    fn validate_turn(&self, ctx: &ValidateContext<'_, Self>) -> ValidationResult {
        self.validate_partial_turn(ctx)?;
        let word = ctx.data.word.to_ascii_lowercase();
        if word.chars().count() != WORD_LENGTH {
            return Err(ValidationError::new(
                "TOO_SHORT",
                format!("guesses have {WORD_LENGTH} letters"),
            ));
        }
        if ctx.player_state.remaining == 0 {
            return Err(ValidationError::new("NO_GUESSES_LEFT", "you are out of guesses"));
        }
        if ctx.player_state.guesses.iter().any(|g| g.word == word) {
            return Err(ValidationError::new(
                "REPEATED_GUESS",
                format!("you already tried {word}"),
            ));
        }
        Ok(())
    }

    fn initial_global_state(&self, ctx: SetupContext<'_>) -> Result<WordsState, ContractViolation> {
        let secret = ctx
            .rng
            .item(SECRETS)
            .ok_or_else(|| ContractViolation::new("secret list is empty"))?;
        Ok(WordsState {
            secret: (*secret).to_string(),
            guesses: ctx
                .members
                .iter()
                .map(|m| (m.id.clone(), Vec::new()))
                .collect(),
        })
    }

    fn player_state(&self, ctx: &PlayerStateContext<'_, Self>) -> WordsView {
        let state = ctx.state;
        let guesses = state.guesses.get(ctx.player_id).cloned().unwrap_or_default();
        let opponents = state
            .guesses
            .iter()
            .filter(|(id, _)| *id != ctx.player_id)
            .map(|(id, records)| (id.clone(), records.iter().map(|r| r.marks.clone()).collect()))
            .collect();

        WordsView {
            remaining: self.max_guesses.saturating_sub(guesses.len()),
            guesses,
            opponents,
            pending_guess: ctx
                .open_round
                .and_then(|round| round.turn_of(ctx.player_id))
                .map(|turn| turn.data.word.to_ascii_lowercase()),
            secret: self
                .is_over(state, ctx.members)
                .then(|| state.secret.clone()),
        }
    }

    fn prospective_player_state(&self, ctx: &ProspectiveContext<'_, Self>) -> WordsView {
        // Marks need the secret, so a draft only shows its letters
        let mut view = ctx.player_state.clone();
        view.pending_guess = Some(ctx.data.word.to_ascii_lowercase());
        view
    }

    fn apply_round(&self, ctx: ReduceContext<'_, Self>) -> Result<WordsState, ContractViolation> {
        let mut next = ctx.state.clone();
        for turn in &ctx.round.turns {
            let word = turn.data.word.to_ascii_lowercase();
            if word.chars().count() != WORD_LENGTH {
                return Err(ContractViolation::new(format!(
                    "guess {word:?} from {} has the wrong length",
                    turn.player_id
                )));
            }
            let records = next.guesses.entry(turn.player_id.clone()).or_default();
            if records.len() >= self.max_guesses {
                return Err(ContractViolation::new(format!(
                    "{} guessed past the limit",
                    turn.player_id
                )));
            }
            records.push(GuessRecord {
                marks: score(&next.secret, &word),
                word,
            });
        }
        Ok(next)
    }

    fn public_turn(&self, ctx: &PublicTurnContext<'_, Self>) -> PublicGuess {
        PublicGuess {
            marks: score(&ctx.state.secret, &ctx.turn.data.word.to_ascii_lowercase()),
        }
    }

    fn status(&self, ctx: &StatusContext<'_, Self>) -> GameStatus {
        if !self.is_over(ctx.state, ctx.members) {
            return GameStatus::Active;
        }
        GameStatus::complete(
            ctx.state
                .guesses
                .iter()
                .filter(|(_, records)| records.last().is_some_and(GuessRecord::solved))
                .map(|(id, _)| id.clone())
                .collect(),
        )
    }

    fn round_change_messages(&self, ctx: &RoundChangeContext<'_, Self>) -> Vec<SystemMessage> {
        ctx.round
            .turns
            .iter()
            .filter(|turn| {
                ctx.next
                    .guesses
                    .get(&turn.player_id)
                    .and_then(|records| records.last())
                    .is_some_and(GuessRecord::solved)
            })
            .map(|turn| {
                SystemMessage::about(turn.player_id.clone(), format!("{} found the word", turn.player_id))
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{Round, Turn};
    use crate::engine::Engine;

    fn members() -> Vec<Member> {
        vec![
            Member::new("ann", "Ann", "#a00"),
            Member::new("ben", "Ben", "#0a0"),
        ]
    }

    fn rigged(secret: &str) -> (Engine<Words>, WordsState) {
        let engine = Engine::new(Words::default());
        let mut state = engine.initialize_session(&members(), "w").unwrap();
        state.secret = secret.to_string();
        (engine, state)
    }

    #[test]
    fn test_score_duplicates() {
        use Mark::*;
        assert_eq!(score("crane", "crane"), vec![Correct; 5]);
        assert_eq!(score("crane", "nanny"), vec![Absent, Present, Absent, Correct, Absent]);
        assert_eq!(score("eagle", "geese"), vec![Present, Present, Absent, Absent, Correct]);
    }

    #[test]
    fn test_secret_list_lengths() {
        assert!(SECRETS.iter().all(|w| w.len() == WORD_LENGTH));
    }

    #[test]
    fn test_secret_is_seeded() {
        let engine = Engine::new(Words::default());
        let a = engine.initialize_session(&members(), "same").unwrap();
        let b = engine.initialize_session(&members(), "same").unwrap();
        assert_eq!(a.secret, b.secret);
        assert!(SECRETS.contains(&a.secret.as_str()));
    }

    #[test]
    fn test_public_turn_hides_letters() {
        let (engine, state) = rigged("crane");
        let turn = Turn::new("ann", 0, Guess::new("Trace"));

        let public = engine.public_turn(&turn, &state, &members());
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("trace"));
        assert_eq!(public.marks.len(), WORD_LENGTH);
    }

    #[test]
    fn test_opponents_see_marks_only() {
        let (engine, state) = rigged("crane");
        let members = members();
        let round = Round::from_turns(
            0,
            vec![Turn::new("ann", 0, Guess::new("brine")), Turn::new("ben", 0, Guess::new("slate"))],
        );
        let next = engine.commit_round(&state, &round, "w", &members).unwrap();

        let view = engine.player_view(&next, &PlayerId::from("ben"), 1, None, &members);
        assert_eq!(view.guesses[0].word, "slate");
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("brine"));
        assert!(!json.contains("crane"));
        assert_eq!(view.remaining, 5);
    }

    #[test]
    fn test_partial_and_full_validation() {
        let (engine, state) = rigged("crane");
        let members = members();
        let ann = PlayerId::from("ann");
        let view = engine.player_view(&state, &ann, 0, None, &members);

        let typing = Turn::new("ann", 0, Guess::new("cra"));
        assert!(engine.validate_partial(&view, &typing, 0, &members).is_ok());
        assert_eq!(engine.validate(&view, &typing, 0, &members).unwrap_err().code, "TOO_SHORT");

        let digits = Turn::new("ann", 0, Guess::new("cr4ne"));
        assert_eq!(
            engine.validate_partial(&view, &digits, 0, &members).unwrap_err().code,
            "LETTERS_ONLY"
        );

        let long = Turn::new("ann", 0, Guess::new("cranes"));
        assert_eq!(engine.validate_partial(&view, &long, 0, &members).unwrap_err().code, "TOO_LONG");
    }

    #[test]
    fn test_simultaneous_solvers_share_the_win() {
        let (engine, state) = rigged("crane");
        let members = members();
        let round = Round::from_turns(
            0,
            vec![Turn::new("ann", 0, Guess::new("crane")), Turn::new("ben", 0, Guess::new("CRANE"))],
        );
        let next = engine.commit_round(&state, &round, "w", &members).unwrap();

        assert_eq!(
            engine.status(&next, &[round.clone()], &members),
            GameStatus::complete(vec!["ann".into(), "ben".into()])
        );
        assert!(engine.game().active_players(&next, &members).is_empty());
        assert_eq!(engine.round_change_messages(&state, &next, &round, &members).len(), 2);

        let view = engine.player_view(&next, &PlayerId::from("ann"), 1, None, &members);
        assert_eq!(view.secret.as_deref(), Some("crane"));
    }

    #[test]
    fn test_exhausted_without_solving_is_a_draw() {
        let engine = Engine::new(Words { max_guesses: 1 });
        let members = members();
        let mut state = engine.initialize_session(&members, "w").unwrap();
        state.secret = "crane".into();
        let round = Round::from_turns(
            0,
            vec![Turn::new("ann", 0, Guess::new("slate")), Turn::new("ben", 0, Guess::new("pilot"))],
        );
        let next = engine.commit_round(&state, &round, "w", &members).unwrap();
        assert_eq!(engine.status(&next, &[round], &members), GameStatus::complete(vec![]));
    }
}
