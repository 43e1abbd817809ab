//! Transcript comparison

use std::fmt;

/// Outcome of one test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Where an actual transcript first departs from the expected one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Lines differ at `index` (0 is the greeting)
    Line {
        index: usize,
        expected: String,
        actual: String,
    },
    /// All shared lines agree but the lengths differ
    Length { expected: usize, actual: usize },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Line {
                index,
                expected,
                actual,
            } => write!(
                f,
                "line {} differs: expected '{}', got '{}'",
                index + 1,
                expected,
                actual
            ),
            Mismatch::Length { expected, actual } => {
                write!(f, "expected {} lines, got {}", expected, actual)
            }
        }
    }
}

/// First difference between two transcripts, if any
pub fn first_mismatch<E, A>(expected: &[E], actual: &[A]) -> Option<Mismatch>
where
    E: AsRef<str>,
    A: AsRef<str>,
{
    let differing = expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e.as_ref() != a.as_ref());

    if let Some(index) = differing {
        return Some(Mismatch::Line {
            index,
            expected: expected[index].as_ref().to_string(),
            actual: actual[index].as_ref().to_string(),
        });
    }

    if expected.len() != actual.len() {
        return Some(Mismatch::Length {
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    None
}

/// Strict ordered comparison: same length, same lines, same order
///
/// Returns the verdict together with the first difference, if any.
pub fn compare<E, A>(expected: &[E], actual: &[A]) -> (Verdict, Option<Mismatch>)
where
    E: AsRef<str>,
    A: AsRef<str>,
{
    let mismatch = first_mismatch(expected, actual);
    let verdict = if mismatch.is_none() {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    (verdict, mismatch)
}
