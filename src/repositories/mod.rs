pub(crate) mod candidates;
pub(crate) mod exams;
pub(crate) mod health;
pub(crate) mod results;
