use crate::models::game::{
    GameConfig, GameError, GameMode, Operation, Operator, Question, MAX_LEVEL, MIN_LEVEL,
};
use rand::Rng;
use std::ops::RangeInclusive;

/// Chance that an operand gets its sign flipped when negatives are enabled.
const NEGATIVE_PROBABILITY: f64 = 0.3;
/// Chance of a zero operand/answer on multiplication and division level 1.
const ZERO_OPERAND_PROBABILITY: f64 = 0.1;

/// Produces one question for the given configuration and difficulty level.
///
/// The random source is injected so callers can seed it; the session service
/// passes the thread RNG, tests pass a seeded `StdRng`. Mixed games re-roll the
/// underlying operation on every call and reuse the shared level.
pub fn generate<R: Rng + ?Sized>(
    config: &GameConfig,
    level: u8,
    rng: &mut R,
) -> Result<Question, GameError> {
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        return Err(GameError::InvalidLevel(level));
    }

    let operation = resolve_operation(config.operation, rng);
    let question = match config.mode {
        GameMode::Mini => mini_question(operation, config.allow_negatives, rng),
        GameMode::Level => level_question(operation, level, config.allow_negatives, rng),
    };

    Ok(question)
}

fn resolve_operation<R: Rng + ?Sized>(operation: Operation, rng: &mut R) -> Operation {
    match operation {
        Operation::Mixed => Operation::BASE[rng.random_range(0..Operation::BASE.len())],
        other => other,
    }
}

fn maybe_negate<R: Rng + ?Sized>(value: i32, allow_negatives: bool, rng: &mut R) -> i32 {
    if allow_negatives && rng.random_bool(NEGATIVE_PROBABILITY) {
        -value
    } else {
        value
    }
}

/// Uniform pick in `low..=high`; collapses to `low` when the band is empty.
fn pick_between<R: Rng + ?Sized>(low: i32, high: i32, rng: &mut R) -> i32 {
    if high <= low {
        low
    } else {
        rng.random_range(low..=high)
    }
}

fn mini_question<R: Rng + ?Sized>(operation: Operation, negatives: bool, rng: &mut R) -> Question {
    match operation {
        Operation::Addition => {
            let a = maybe_negate(rng.random_range(1..=50), negatives, rng);
            let b = maybe_negate(rng.random_range(1..=50), negatives, rng);
            Question::new(a, b, Operator::Add)
        }
        Operation::Subtraction => {
            let mut a = rng.random_range(1..=100);
            let mut b = rng.random_range(1..=100);
            if a < b {
                std::mem::swap(&mut a, &mut b);
            }
            // Sign flips land on the already ordered magnitudes.
            let a = maybe_negate(a, negatives, rng);
            let b = maybe_negate(b, negatives, rng);
            Question::new(a, b, Operator::Subtract)
        }
        Operation::Division => {
            let answer = maybe_negate(rng.random_range(1..=10), negatives, rng);
            let divisor = maybe_negate(rng.random_range(1..=10), negatives, rng);
            Question::division(answer, divisor)
        }
        Operation::Multiplication | Operation::Mixed => {
            let a = maybe_negate(rng.random_range(1..=10), negatives, rng);
            let b = maybe_negate(rng.random_range(1..=10), negatives, rng);
            Question::new(a, b, Operator::Multiply)
        }
    }
}

fn level_question<R: Rng + ?Sized>(
    operation: Operation,
    level: u8,
    negatives: bool,
    rng: &mut R,
) -> Question {
    match operation {
        Operation::Addition => addition_level(level, negatives, rng),
        Operation::Subtraction => subtraction_level(level, negatives, rng),
        Operation::Division => division_level(level, rng),
        Operation::Multiplication | Operation::Mixed => multiplication_level(level, rng),
    }
}

/// Sum band and lower bound of the first addend for each addition tier.
pub(crate) fn addition_tier(level: u8) -> (RangeInclusive<i32>, i32) {
    match level {
        1 => (1..=10, 1),
        2 => (11..=20, 6),
        3 => (21..=50, 21),
        4 => (51..=100, 11),
        5 => (201..=1000, 101),
        6 => (2001..=10000, 1001),
        7 => (10001..=20000, 1001),
        _ => (20001..=100000, 10001),
    }
}

/// Difference band and minuend offset band for each subtraction tier.
pub(crate) fn subtraction_tier(level: u8) -> (RangeInclusive<i32>, RangeInclusive<i32>) {
    match level {
        1 => (1..=10, 1..=10),
        2 => (11..=20, 1..=20),
        3 => (21..=50, 1..=50),
        4 => (51..=100, 11..=60),
        5 => (201..=1000, 101..=600),
        6 => (2001..=10000, 1001..=6000),
        7 => (10001..=20000, 1001..=6000),
        _ => (20001..=100000, 10001..=60000),
    }
}

fn addition_level<R: Rng + ?Sized>(level: u8, negatives: bool, rng: &mut R) -> Question {
    let (answers, floor) = addition_tier(level);
    let answer = rng.random_range(answers);
    // Level 1 lets the first addend reach the sum itself (second addend 0).
    let ceiling = if level == 1 { answer } else { answer - 1 };
    let a = pick_between(floor, ceiling, rng);
    let b = answer - a;

    let a = maybe_negate(a, negatives, rng);
    let b = maybe_negate(b, negatives, rng);
    Question::new(a, b, Operator::Add)
}

fn subtraction_level<R: Rng + ?Sized>(level: u8, negatives: bool, rng: &mut R) -> Question {
    let (answers, offsets) = subtraction_tier(level);
    let answer = rng.random_range(answers);
    let a = answer + rng.random_range(offsets);
    let b = a - answer;

    // Only the first three tiers take negative operands.
    let negatives = negatives && level <= 3;
    let a = maybe_negate(a, negatives, rng);
    let b = maybe_negate(b, negatives, rng);
    Question::new(a, b, Operator::Subtract)
}

fn factor_pairs(
    factors: RangeInclusive<i32>,
    multipliers: RangeInclusive<i32>,
    accept: impl Fn(i32) -> bool,
) -> Vec<(i32, i32)> {
    let mut pairs = Vec::new();
    for i in factors {
        for j in multipliers.clone() {
            if accept(i * j) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

fn pick_pair<R: Rng + ?Sized>(pairs: &[(i32, i32)], rng: &mut R) -> (i32, i32) {
    match pairs.len() {
        0 => (1, 1),
        len => pairs[rng.random_range(0..len)],
    }
}

fn multiplication_level<R: Rng + ?Sized>(level: u8, rng: &mut R) -> Question {
    let (a, b) = match level {
        1 => {
            if rng.random_bool(ZERO_OPERAND_PROBABILITY) {
                (0, rng.random_range(1..=10))
            } else {
                let product = rng.random_range(1..=10);
                let divisors: Vec<i32> = (1..=product).filter(|d| product % d == 0).collect();
                let factor = match divisors.len() {
                    0 => 1,
                    len => divisors[rng.random_range(0..len)],
                };
                (factor, product / factor)
            }
        }
        2 => pick_pair(&factor_pairs(1..=10, 1..=10, |p| p > 10 && p <= 50), rng),
        3 => pick_pair(&factor_pairs(1..=10, 1..=10, |p| p > 50 && p <= 100), rng),
        4 => pick_pair(&factor_pairs(11..=20, 4..=9, |p| p < 100), rng),
        5 => (rng.random_range(10..=20), rng.random_range(10..=20)),
        6 => {
            if rng.random_bool(0.5) {
                (rng.random_range(21..=50), rng.random_range(10..=40))
            } else {
                (rng.random_range(10..=40), rng.random_range(21..=50))
            }
        }
        7 => (rng.random_range(21..=99), rng.random_range(21..=99)),
        _ => (rng.random_range(51..=99), rng.random_range(51..=99)),
    };

    Question::new(a, b, Operator::Multiply)
}

fn division_level<R: Rng + ?Sized>(level: u8, rng: &mut R) -> Question {
    let (answer, divisor) = match level {
        1 => {
            let answer = if rng.random_bool(ZERO_OPERAND_PROBABILITY) {
                0
            } else {
                rng.random_range(1..=10)
            };
            (answer, rng.random_range(1..=10))
        }
        2 => (rng.random_range(11..=50), rng.random_range(1..=10)),
        3 => (rng.random_range(51..=100), rng.random_range(1..=10)),
        4 => (rng.random_range(1..=50), rng.random_range(4..=9)),
        5 => (rng.random_range(10..=20), rng.random_range(10..=20)),
        6 => {
            if rng.random_bool(0.5) {
                (rng.random_range(21..=50), rng.random_range(10..=40))
            } else {
                (rng.random_range(10..=40), rng.random_range(21..=50))
            }
        }
        7 => (rng.random_range(21..=99), rng.random_range(21..=99)),
        _ => (rng.random_range(51..=99), rng.random_range(51..=99)),
    };

    Question::division(answer, divisor)
}
