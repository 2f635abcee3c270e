//! Lazy (model, attempt) schedule for the completion wrapper.
//!
//! Iteration policy lives here; calling, classifying and sleeping live in
//! [`super::client`].

/// One planned call: which model, and which attempt on that model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt<'a> {
    pub model: &'a str,
    /// Zero-indexed attempt number on `model`.
    pub number: u32,
    /// Whether this is the final attempt budgeted for `model`.
    pub is_last_for_model: bool,
}

/// Finite sequence of attempts: every candidate in preference order, each
/// tried up to `max_attempts_per_model` times.
///
/// [`AttemptSchedule::abandon_model`] skips the rest of the current model's
/// budget after a terminal failure.
#[derive(Debug, Clone)]
pub struct AttemptSchedule<'a> {
    candidates: &'a [String],
    max_attempts_per_model: u32,
    model_index: usize,
    next_attempt: u32,
}

impl<'a> AttemptSchedule<'a> {
    pub fn new(candidates: &'a [String], max_attempts_per_model: u32) -> Self {
        Self {
            candidates,
            max_attempts_per_model,
            model_index: 0,
            next_attempt: 0,
        }
    }

    /// Move on to the next candidate model.
    pub fn abandon_model(&mut self) {
        if self.model_index < self.candidates.len() {
            self.model_index += 1;
            self.next_attempt = 0;
        }
    }

    /// Upper bound on the number of calls this schedule can yield.
    pub fn max_calls(&self) -> usize {
        self.candidates.len() * self.max_attempts_per_model as usize
    }
}

impl<'a> Iterator for AttemptSchedule<'a> {
    type Item = Attempt<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.max_attempts_per_model == 0 {
            return None;
        }
        if self.next_attempt >= self.max_attempts_per_model {
            self.abandon_model();
        }
        let candidates = self.candidates;
        let model = candidates.get(self.model_index)?;
        let number = self.next_attempt;
        self.next_attempt += 1;
        Some(Attempt {
            model: model.as_str(),
            number,
            is_last_for_model: number + 1 == self.max_attempts_per_model,
        })
    }
}
