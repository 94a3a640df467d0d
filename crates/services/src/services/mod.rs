pub mod directory;
pub mod overdue;
pub mod reassignment;
pub mod recurrence;
pub mod series;
pub mod tasks;
