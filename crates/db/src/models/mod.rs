pub mod caregiver;
pub mod resident;
pub mod task;
